//! Modal flows — small linear stage machines for the station dialogs.
//!
//! Every modal walks its own fixed stage sequence.  Cancelling or finishing
//! a flow returns it to the first stage and clears whatever was selected or
//! typed along the way.

/// What a new station is seeded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationKind {
    Song,
    Artist,
    Genre,
    Search,
}

impl CreationKind {
    pub fn label(self) -> &'static str {
        match self {
            CreationKind::Song => "song",
            CreationKind::Artist => "artist",
            CreationKind::Genre => "genre",
            CreationKind::Search => "search",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modal {
    CreateStation,
    AddMusic,
    Rename,
    Delete,
    Seeds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SelectSource,
    SelectStation,
    Search,
    EditName,
    ReviewSeeds,
    Confirm,
}

impl Modal {
    pub const ALL: [Modal; 5] = [
        Modal::CreateStation,
        Modal::AddMusic,
        Modal::Rename,
        Modal::Delete,
        Modal::Seeds,
    ];

    pub fn stages(self) -> &'static [Stage] {
        match self {
            Modal::CreateStation => &[Stage::SelectSource, Stage::Search, Stage::Confirm],
            Modal::AddMusic => &[Stage::SelectStation, Stage::Search, Stage::Confirm],
            Modal::Rename => &[Stage::SelectStation, Stage::EditName, Stage::Confirm],
            Modal::Delete => &[Stage::SelectStation, Stage::Confirm],
            Modal::Seeds => &[Stage::SelectStation, Stage::ReviewSeeds, Stage::Confirm],
        }
    }

    fn index(self) -> usize {
        match self {
            Modal::CreateStation => 0,
            Modal::AddMusic => 1,
            Modal::Rename => 2,
            Modal::Delete => 3,
            Modal::Seeds => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Flow {
    modal: Modal,
    position: usize,
    /// Station the modal acts on.
    pub station: Option<String>,
    /// Picked item: music id, genre id or seed id.
    pub selection: Option<String>,
    /// Search query or new station name.
    pub text: String,
    /// Creation source (create-station modal only).
    pub source: Option<CreationKind>,
}

impl Flow {
    pub fn new(modal: Modal) -> Self {
        Self {
            modal,
            position: 0,
            station: None,
            selection: None,
            text: String::new(),
            source: None,
        }
    }

    pub fn modal(&self) -> Modal {
        self.modal
    }

    pub fn stage(&self) -> Stage {
        self.modal.stages()[self.position]
    }

    pub fn at(&self, stage: Stage) -> bool {
        self.stage() == stage
    }

    /// At the first stage with nothing selected.
    pub fn is_idle(&self) -> bool {
        self.position == 0
            && self.station.is_none()
            && self.selection.is_none()
            && self.text.is_empty()
            && self.source.is_none()
    }

    /// Move to the next stage.  Returns `false` when already at the last one.
    pub fn advance(&mut self) -> bool {
        if self.position + 1 < self.modal.stages().len() {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Jump forward to `stage`, skipping intermediate ones.
    pub fn skip_to(&mut self, stage: Stage) -> bool {
        match self.modal.stages().iter().position(|s| *s == stage) {
            Some(pos) if pos >= self.position => {
                self.position = pos;
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.modal);
    }
}

/// One flow per modal.
#[derive(Debug, Clone)]
pub struct ModalFlows {
    flows: [Flow; 5],
}

impl Default for ModalFlows {
    fn default() -> Self {
        Self {
            flows: Modal::ALL.map(Flow::new),
        }
    }
}

impl ModalFlows {
    pub fn get(&self, modal: Modal) -> &Flow {
        &self.flows[modal.index()]
    }

    pub fn get_mut(&mut self, modal: Modal) -> &mut Flow {
        &mut self.flows[modal.index()]
    }

    /// Modals that are past their first stage or hold a selection.
    pub fn active(&self) -> impl Iterator<Item = &Flow> {
        self.flows.iter().filter(|f| !f.is_idle())
    }
}
