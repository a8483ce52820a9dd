//! State reconciliation engine — the single owner of canonical UI state.
//!
//! Inbound events are merged into [`UiState`] by [`Engine::apply`], which is
//! registered with the [`Registry`] for every event kind.  User intents are
//! methods that optionally update local state first (speculatively) and then
//! send a command through an [`Outbound`].  The next authoritative snapshot
//! or delta always overrides a speculative value.
//!
//! # Station-creation correlation
//!
//! The server answers a create-station command with nothing but a fresh
//! `stations` list.  While a creation is pending, each `stations` update is
//! diffed against the list it replaces; exactly one new id resolves the flow
//! and raises a "play it now?" prompt.  Zero or several new ids leave the flow
//! pending with no prompt, since nothing in the protocol says which one is
//! ours.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Local};
use patio_proto::gain::{self, DEFAULT_MAX_GAIN_DB};
use patio_proto::protocol::{
    CreateSource, EventKind, GenreCategory, InboundEvent, OutboundCommand, PlayerAction,
    Progress, ProcessSnapshot, SearchResults, Song, Station, StationInfo, TrackStart,
    UpcomingSong,
};
use tracing::{debug, info, warn};

use crate::flows::{CreationKind, Flow, Modal, ModalFlows, Stage};
use crate::intent::IntentState;
use crate::registry::{Outbound, Registry};
use crate::toast::ToastQueue;
use crate::transport::Connector;

pub const NOT_PLAYING_TITLE: &str = "Not Playing";
pub const NOT_PLAYING_ARTIST: &str = "-";

/// A create-station command waiting for its station to show up.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCreation {
    pub kind: CreationKind,
    pub requested_at: DateTime<Local>,
}

/// What the user asked a new station to be built from.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateRequest {
    FromSong,
    FromArtist,
    FromGenre { genre_id: String },
    FromSearch { music_id: String },
}

impl CreateRequest {
    pub fn kind(&self) -> CreationKind {
        match self {
            CreateRequest::FromSong => CreationKind::Song,
            CreateRequest::FromArtist => CreationKind::Artist,
            CreateRequest::FromGenre { .. } => CreationKind::Genre,
            CreateRequest::FromSearch { .. } => CreationKind::Search,
        }
    }
}

/// Canonical UI state.  UI code reads a snapshot; only the engine writes.
#[derive(Debug, Clone)]
pub struct UiState {
    pub connected: bool,

    // ── Now playing ────────────────────────────────────────────────────────
    pub song: Song,
    pub playing: IntentState<bool>,
    pub elapsed: f64,
    pub total: f64,

    // ── Output gain ────────────────────────────────────────────────────────
    pub gain_db: f64,
    pub max_gain: f64,

    // ── Stations ───────────────────────────────────────────────────────────
    pub stations: Vec<Station>,
    pub station_id: Option<String>,
    pub station_name: Option<String>,

    // ── Browse ─────────────────────────────────────────────────────────────
    pub genres: Vec<GenreCategory>,
    pub genres_loading: bool,
    pub search_query: Option<String>,
    pub search_results: SearchResults,
    pub search_loading: bool,
    pub station_info: Option<StationInfo>,

    // ── Derived flows ──────────────────────────────────────────────────────
    pub pending_creation: Option<PendingCreation>,
    /// Station we inferred was just created; the UI asks whether to play it.
    pub new_station_prompt: Option<Station>,
    pub flows: ModalFlows,
}

impl UiState {
    fn new(max_gain: f64) -> Self {
        Self {
            connected: false,
            song: not_playing_song(),
            playing: IntentState::new(false),
            elapsed: 0.0,
            total: 0.0,
            gain_db: 0.0,
            max_gain,
            stations: Vec::new(),
            station_id: None,
            station_name: None,
            genres: Vec::new(),
            genres_loading: false,
            search_query: None,
            search_results: SearchResults::default(),
            search_loading: false,
            station_info: None,
            pending_creation: None,
            new_station_prompt: None,
            flows: ModalFlows::default(),
        }
    }

    pub fn is_playing(&self) -> bool {
        *self.playing.value()
    }

    /// Gain as a slider percentage.
    pub fn gain_percent(&self) -> f64 {
        gain::db_to_slider(self.gain_db, self.max_gain)
    }

    pub fn station(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    pub fn quick_mix_station(&self) -> Option<&Station> {
        self.stations.iter().find(|s| s.is_quick_mix)
    }
}

fn not_playing_song() -> Song {
    Song {
        title: NOT_PLAYING_TITLE.to_string(),
        artist: NOT_PLAYING_ARTIST.to_string(),
        ..Song::default()
    }
}

pub struct Engine {
    state: UiState,
    toasts: ToastQueue,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_GAIN_DB, Duration::from_secs(4))
    }
}

impl Engine {
    pub fn new(max_gain: f64, toast_ttl: Duration) -> Self {
        Self {
            state: UiState::new(max_gain),
            toasts: ToastQueue::new(toast_ttl),
        }
    }

    /// Hook the engine up to every inbound event and to connection changes.
    pub fn register<K: Connector>(&mut self, registry: &mut Registry<Engine, K>) {
        for kind in EventKind::ALL {
            registry.on(kind, Engine::apply);
        }
        registry.on_connection(self, Engine::set_connected);
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn snapshot(&self) -> UiState {
        self.state.clone()
    }

    pub fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    pub fn toasts_mut(&mut self) -> &mut ToastQueue {
        &mut self.toasts
    }

    pub fn flow(&self, modal: Modal) -> &Flow {
        self.state.flows.get(modal)
    }

    // ── Inbound ───────────────────────────────────────────────────────────

    pub fn set_connected(&mut self, connected: bool) {
        let was = self.state.connected;
        self.state.connected = connected;
        if was && !connected {
            self.toasts.warning("Disconnected from player");
        }
    }

    /// Merge one inbound event into the canonical state.
    pub fn apply(&mut self, event: &InboundEvent) {
        match event {
            InboundEvent::Start(start) => self.on_start(start),
            InboundEvent::Stop => self.on_stop(),
            InboundEvent::Progress(progress) => self.on_progress(*progress),
            InboundEvent::Stations(list) => self.on_stations(list),
            InboundEvent::Process(snapshot) => self.on_process(snapshot),
            InboundEvent::Genres(genres) => {
                self.state.genres = genres.clone();
                self.state.genres_loading = false;
            }
            InboundEvent::SearchResults(results) => {
                self.state.search_results = results.clone();
                self.state.search_loading = false;
            }
            InboundEvent::SongExplanation(text) => self.toasts.info(text.clone()),
            InboundEvent::UpcomingResult(songs) => self.on_upcoming(songs),
            InboundEvent::StationInfo(info) => self.on_station_info(info),
        }
    }

    fn apply_song(&mut self, song: &Song) {
        self.state.song = song.clone();
        self.state.total = song.duration;
    }

    fn apply_station(&mut self, id: Option<&String>, name: Option<&String>) {
        if let Some(id) = id {
            self.state.station_id = Some(id.clone());
        }
        if let Some(name) = name {
            self.state.station_name = Some(name.clone());
        }
    }

    fn on_start(&mut self, start: &TrackStart) {
        debug!("Engine: start {} - {}", start.song.artist, start.song.title);
        self.apply_song(&start.song);
        self.state.elapsed = 0.0;
        self.state.playing.confirm(true);
        self.apply_station(start.station_id.as_ref(), start.station.as_ref());
    }

    /// Song fields stay visible until the next `start`.
    fn on_stop(&mut self) {
        self.state.playing.confirm(false);
        self.state.elapsed = 0.0;
        self.state.total = 0.0;
    }

    fn on_progress(&mut self, progress: Progress) {
        self.state.elapsed = progress.elapsed;
        self.state.total = progress.duration;
    }

    fn on_process(&mut self, snap: &ProcessSnapshot) {
        match &snap.song {
            Some(song) => {
                self.apply_song(song);
                self.state.elapsed = snap.elapsed.unwrap_or(0.0);
                self.state.playing.confirm(snap.playing.unwrap_or(true));
            }
            None => {
                self.state.song = not_playing_song();
                self.state.playing.confirm(false);
                self.state.elapsed = 0.0;
                self.state.total = 0.0;
            }
        }
        self.apply_station(snap.station_id.as_ref(), snap.station.as_ref());
        if let Some(max_gain) = snap.max_gain {
            self.state.max_gain = max_gain;
        }
        if let Some(volume) = snap.volume {
            self.state.gain_db = volume;
        }
        info!(
            "Engine: snapshot applied (playing={}, station={:?})",
            self.state.is_playing(),
            self.state.station_name
        );
    }

    fn on_stations(&mut self, list: &[Station]) {
        let previous: HashSet<String> = self.state.stations.iter().map(|s| s.id.clone()).collect();
        self.state.stations = list.to_vec();

        if list.iter().filter(|s| s.is_quick_mix).count() > 1 {
            warn!("Engine: station list has more than one quick mix station");
        }

        let Some(pending) = &self.state.pending_creation else {
            return;
        };
        let mut added = list.iter().filter(|s| !previous.contains(&s.id));
        match (added.next(), added.next()) {
            (Some(station), None) => {
                info!(
                    "Engine: {} station created: {} ({})",
                    pending.kind.label(),
                    station.name,
                    station.id
                );
                self.toasts
                    .success(format!("Created station \"{}\"", station.name));
                self.state.new_station_prompt = Some(station.clone());
                self.state.pending_creation = None;
            }
            (None, _) => debug!("Engine: stations updated, no new station yet"),
            (Some(_), Some(_)) => {
                debug!("Engine: several new stations, cannot tell which was created")
            }
        }
    }

    fn on_upcoming(&mut self, songs: &[UpcomingSong]) {
        if songs.is_empty() {
            self.toasts.info("No upcoming songs");
            return;
        }
        let lines: Vec<String> = songs
            .iter()
            .map(|s| format!("{} – {}", s.artist, s.title))
            .collect();
        self.toasts.info(format!("Upcoming:\n{}", lines.join("\n")));
    }

    fn on_station_info(&mut self, info: &StationInfo) {
        let flow = self.state.flows.get(Modal::Seeds);
        let wanted = flow.station.as_ref();
        if let (Some(wanted), Some(got)) = (wanted, info.station_id.as_ref()) {
            if wanted != got {
                debug!("Engine: ignoring seeds for station {}", got);
                return;
            }
        }
        self.state.station_info = Some(info.clone());
    }

    // ── Playback intents ─────────────────────────────────────────────────

    /// Flip the local flag at once; the server's next report settles it.
    pub fn toggle_playback(&mut self, out: &mut dyn Outbound) -> bool {
        let next = !self.state.is_playing();
        self.state.playing.speculate(next);
        out.send_command(&OutboundCommand::Action(PlayerAction::TogglePlayback))
    }

    pub fn skip(&mut self, out: &mut dyn Outbound) -> bool {
        out.send_command(&OutboundCommand::Action(PlayerAction::Skip))
    }

    pub fn love(&mut self, out: &mut dyn Outbound) -> bool {
        self.state.song.rating = 1;
        out.send_command(&OutboundCommand::Action(PlayerAction::Love))
    }

    pub fn ban(&mut self, out: &mut dyn Outbound) -> bool {
        out.send_command(&OutboundCommand::Action(PlayerAction::Ban))
    }

    pub fn snooze(&mut self, out: &mut dyn Outbound) -> bool {
        out.send_command(&OutboundCommand::Action(PlayerAction::Tired))
    }

    pub fn explain(&mut self, out: &mut dyn Outbound) -> bool {
        out.send_command(&OutboundCommand::Action(PlayerAction::Explain))
    }

    pub fn request_upcoming(&mut self, out: &mut dyn Outbound) -> bool {
        out.send_command(&OutboundCommand::Action(PlayerAction::Upcoming))
    }

    /// Set output gain from a slider percentage.  Only the percentage is sent.
    pub fn set_gain(&mut self, percent: f64, out: &mut dyn Outbound) -> bool {
        let percent = percent.clamp(0.0, 100.0);
        self.state.gain_db = gain::slider_to_db(percent, self.state.max_gain);
        out.send_command(&OutboundCommand::SetGain { percent })
    }

    // ── Station intents ──────────────────────────────────────────────────

    pub fn change_station(&mut self, station_id: &str, out: &mut dyn Outbound) -> bool {
        out.send_command(&OutboundCommand::ChangeStation {
            station_id: station_id.to_string(),
        })
    }

    pub fn delete_station(&mut self, station_id: &str, out: &mut dyn Outbound) -> bool {
        out.send_command(&OutboundCommand::DeleteStation {
            station_id: station_id.to_string(),
        })
    }

    pub fn rename_station(&mut self, station_id: &str, name: &str, out: &mut dyn Outbound) -> bool {
        out.send_command(&OutboundCommand::RenameStation {
            station_id: station_id.to_string(),
            name: name.to_string(),
        })
    }

    /// Replace the quick-mix membership set.
    pub fn set_quick_mix(&mut self, station_ids: &[String], out: &mut dyn Outbound) -> bool {
        let members: HashSet<&str> = station_ids.iter().map(String::as_str).collect();
        for station in self.state.stations.iter_mut().filter(|s| !s.is_quick_mix) {
            station.is_quick_mixed = members.contains(station.id.as_str());
        }
        out.send_command(&OutboundCommand::SetQuickMix {
            station_ids: station_ids.to_vec(),
        })
    }

    pub fn request_genres(&mut self, out: &mut dyn Outbound) -> bool {
        self.state.genres_loading = true;
        out.send_command(&OutboundCommand::GetGenres)
    }

    /// Submit a search.  The last result to arrive wins.
    pub fn search(&mut self, query: &str, out: &mut dyn Outbound) -> bool {
        let query = query.trim().to_string();
        self.state.search_query = Some(query.clone());
        self.state.search_loading = true;
        out.send_command(&OutboundCommand::Search { query })
    }

    /// Send a create-station command and start correlating.  Replaces any
    /// unresolved creation.
    pub fn create_station(&mut self, request: CreateRequest, out: &mut dyn Outbound) -> bool {
        let source = match &request {
            CreateRequest::FromSong | CreateRequest::FromArtist => {
                let track_token = self.state.song.track_token.clone();
                if track_token.is_empty() {
                    self.toasts.warning("Nothing is playing");
                    return false;
                }
                if request == CreateRequest::FromSong {
                    CreateSource::Song { track_token }
                } else {
                    CreateSource::Artist { track_token }
                }
            }
            CreateRequest::FromSearch { music_id } => CreateSource::Music {
                music_id: music_id.clone(),
            },
            CreateRequest::FromGenre { genre_id } => {
                return self.send_creation(
                    request.kind(),
                    OutboundCommand::AddGenre {
                        genre_id: genre_id.clone(),
                    },
                    out,
                );
            }
        };
        self.send_creation(request.kind(), OutboundCommand::CreateFrom(source), out)
    }

    fn send_creation(
        &mut self,
        kind: CreationKind,
        command: OutboundCommand,
        out: &mut dyn Outbound,
    ) -> bool {
        if let Some(old) = self.state.pending_creation.take() {
            debug!("Engine: replacing unresolved {} creation", old.kind.label());
        }
        self.state.pending_creation = Some(PendingCreation {
            kind,
            requested_at: Local::now(),
        });
        self.state.new_station_prompt = None;
        out.send_command(&command)
    }

    pub fn cancel_creation(&mut self) {
        self.state.pending_creation = None;
    }

    /// "Play the new station now?" — yes.
    pub fn accept_new_station(&mut self, out: &mut dyn Outbound) -> bool {
        match self.state.new_station_prompt.take() {
            Some(station) => self.change_station(&station.id, out),
            None => false,
        }
    }

    /// "Play the new station now?" — no.
    pub fn dismiss_new_station(&mut self) {
        self.state.new_station_prompt = None;
    }

    // ── Modal flows ──────────────────────────────────────────────────────

    /// Return a modal to its first stage, clearing selection and search state.
    pub fn cancel(&mut self, modal: Modal) {
        self.state.flows.get_mut(modal).reset();
        match modal {
            Modal::CreateStation | Modal::AddMusic => self.clear_search(),
            Modal::Seeds => self.state.station_info = None,
            Modal::Rename | Modal::Delete => {}
        }
    }

    fn clear_search(&mut self) {
        self.state.search_query = None;
        self.state.search_results = SearchResults::default();
        self.state.search_loading = false;
    }

    fn finish(&mut self, modal: Modal) {
        self.cancel(modal);
    }

    /// Create-station modal, first stage: pick the source.
    pub fn choose_source(&mut self, kind: CreationKind, out: &mut dyn Outbound) -> bool {
        let flow = self.state.flows.get_mut(Modal::CreateStation);
        if !flow.at(Stage::SelectSource) {
            debug!("Engine: create modal not at source selection");
            return false;
        }
        flow.source = Some(kind);
        match kind {
            CreationKind::Song | CreationKind::Artist => flow.skip_to(Stage::Confirm),
            CreationKind::Search => flow.advance(),
            CreationKind::Genre => {
                flow.advance();
                self.request_genres(out);
                true
            }
        }
    }

    /// Pick the station a modal acts on (add music, rename, delete, seeds).
    pub fn choose_station(&mut self, modal: Modal, station_id: &str, out: &mut dyn Outbound) -> bool {
        let flow = self.state.flows.get_mut(modal);
        if !flow.at(Stage::SelectStation) {
            debug!("Engine: {:?} modal not at station selection", modal);
            return false;
        }
        flow.station = Some(station_id.to_string());
        if let Some(station) = self.state.station(station_id) {
            if modal == Modal::Rename {
                let name = station.name.clone();
                self.state.flows.get_mut(modal).text = name;
            }
        }
        self.state.flows.get_mut(modal).advance();
        if modal == Modal::Seeds {
            self.state.station_info = None;
            out.send_command(&OutboundCommand::GetStationInfo {
                station_id: station_id.to_string(),
            });
        }
        true
    }

    /// Search from within a modal at its search stage.
    pub fn modal_search(&mut self, modal: Modal, query: &str, out: &mut dyn Outbound) -> bool {
        let flow = self.state.flows.get_mut(modal);
        if !flow.at(Stage::Search) {
            return false;
        }
        flow.text = query.to_string();
        if modal == Modal::CreateStation && flow.source == Some(CreationKind::Genre) {
            // Genre browsing filters locally.
            return true;
        }
        self.search(query, out)
    }

    /// Pick a search result, genre or seed; moves to confirmation.
    pub fn choose_item(&mut self, modal: Modal, item_id: &str) -> bool {
        let flow = self.state.flows.get_mut(modal);
        if !(flow.at(Stage::Search) || flow.at(Stage::ReviewSeeds)) {
            return false;
        }
        flow.selection = Some(item_id.to_string());
        flow.advance()
    }

    /// Rename modal: set the new name; moves to confirmation.
    pub fn set_name(&mut self, name: &str) -> bool {
        let flow = self.state.flows.get_mut(Modal::Rename);
        if !flow.at(Stage::EditName) || name.trim().is_empty() {
            return false;
        }
        flow.text = name.trim().to_string();
        flow.advance()
    }

    /// Confirm a modal at its last stage, send its command and reset it.
    pub fn confirm(&mut self, modal: Modal, out: &mut dyn Outbound) -> bool {
        let flow = self.state.flows.get(modal).clone();
        if !flow.at(Stage::Confirm) {
            debug!("Engine: {:?} modal not at confirmation", modal);
            return false;
        }
        let sent = match modal {
            Modal::CreateStation => {
                let request = match (flow.source, flow.selection) {
                    (Some(CreationKind::Song), _) => Some(CreateRequest::FromSong),
                    (Some(CreationKind::Artist), _) => Some(CreateRequest::FromArtist),
                    (Some(CreationKind::Genre), Some(genre_id)) => {
                        Some(CreateRequest::FromGenre { genre_id })
                    }
                    (Some(CreationKind::Search), Some(music_id)) => {
                        Some(CreateRequest::FromSearch { music_id })
                    }
                    _ => None,
                };
                match request {
                    Some(request) => self.create_station(request, out),
                    None => false,
                }
            }
            Modal::AddMusic => match (flow.station, flow.selection) {
                (Some(station_id), Some(music_id)) => out.send_command(&OutboundCommand::AddMusic {
                    station_id,
                    music_id,
                }),
                _ => false,
            },
            Modal::Rename => match flow.station {
                Some(station_id) => self.rename_station(&station_id, &flow.text, out),
                None => false,
            },
            Modal::Delete => match flow.station {
                Some(station_id) => self.delete_station(&station_id, out),
                None => false,
            },
            Modal::Seeds => match flow.selection {
                Some(seed_id) => out.send_command(&OutboundCommand::DeleteSeed { seed_id }),
                None => false,
            },
        };
        self.finish(modal);
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toast::Severity;
    use patio_proto::protocol::{ArtistMatch, Seed};

    /// Records commands; `connected` controls whether sends "succeed".
    struct Recorder {
        connected: bool,
        sent: Vec<OutboundCommand>,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                connected: true,
                sent: Vec::new(),
            }
        }
    }

    impl Outbound for Recorder {
        fn send_command(&mut self, command: &OutboundCommand) -> bool {
            if self.connected {
                self.sent.push(command.clone());
            }
            self.connected
        }
    }

    fn station(id: &str, name: &str) -> Station {
        Station {
            id: id.to_string(),
            name: name.to_string(),
            ..Station::default()
        }
    }

    fn stations(ids: &[&str]) -> InboundEvent {
        InboundEvent::Stations(ids.iter().map(|id| station(id, &format!("S{id}"))).collect())
    }

    fn start(title: &str, token: &str) -> InboundEvent {
        InboundEvent::Start(TrackStart {
            song: Song {
                title: title.to_string(),
                artist: "Artist".to_string(),
                cover_art: "http://art/1.jpg".to_string(),
                duration: 180.0,
                track_token: token.to_string(),
                ..Song::default()
            },
            station_id: Some("2".to_string()),
            station: Some("S2".to_string()),
        })
    }

    #[test]
    fn test_initial_state_is_not_playing() {
        let engine = Engine::default();
        let s = engine.state();
        assert_eq!(s.song.title, NOT_PLAYING_TITLE);
        assert!(!s.is_playing());
        assert!(!s.connected);
        assert_eq!(s.gain_percent(), 50.0);
    }

    #[test]
    fn test_start_overwrites_song_and_station() {
        let mut engine = Engine::default();
        engine.apply(&start("X", "t1"));
        let s = engine.state();
        assert_eq!(s.song.title, "X");
        assert_eq!(s.song.cover_art, "http://art/1.jpg");
        assert!(s.is_playing());
        assert_eq!(s.total, 180.0);
        assert_eq!(s.station_id.as_deref(), Some("2"));
        assert_eq!(s.station_name.as_deref(), Some("S2"));
    }

    #[test]
    fn test_stop_keeps_song_visible() {
        let mut engine = Engine::default();
        engine.apply(&start("X", "t1"));
        engine.apply(&InboundEvent::Progress(Progress {
            elapsed: 90.0,
            duration: 180.0,
        }));
        engine.apply(&InboundEvent::Stop);
        let s = engine.state();
        assert_eq!(s.song.title, "X");
        assert_eq!(s.song.artist, "Artist");
        assert_eq!(s.song.cover_art, "http://art/1.jpg");
        assert!(!s.is_playing());
        assert_eq!((s.elapsed, s.total), (0.0, 0.0));
    }

    #[test]
    fn test_progress_only_touches_position() {
        let mut engine = Engine::default();
        engine.apply(&start("X", "t1"));
        engine.apply(&InboundEvent::Progress(Progress {
            elapsed: 12.0,
            duration: 200.0,
        }));
        let s = engine.state();
        assert_eq!((s.elapsed, s.total), (12.0, 200.0));
        assert_eq!(s.song.title, "X");
        assert!(s.is_playing());
    }

    #[test]
    fn test_process_without_song_resets_to_placeholder() {
        let mut engine = Engine::default();
        engine.apply(&start("X", "t1"));
        engine.apply(&InboundEvent::Process(ProcessSnapshot {
            song: None,
            volume: Some(-20.0),
            ..ProcessSnapshot::default()
        }));
        let s = engine.state();
        assert_eq!(s.song.title, NOT_PLAYING_TITLE);
        assert_eq!(s.song.artist, NOT_PLAYING_ARTIST);
        assert_eq!(s.song.cover_art, "");
        assert_eq!(s.song.rating, 0);
        assert!(!s.is_playing());
        assert_eq!((s.elapsed, s.total), (0.0, 0.0));
        assert_eq!(s.gain_db, -20.0);
        assert_eq!(s.gain_percent(), 25.0);
        // Station fields absent from the snapshot are left alone.
        assert_eq!(s.station_id.as_deref(), Some("2"));
    }

    #[test]
    fn test_process_with_song_applies_everything() {
        let mut engine = Engine::default();
        engine.apply(&InboundEvent::Process(ProcessSnapshot {
            song: Some(Song {
                title: "Y".into(),
                duration: 240.0,
                rating: 1,
                ..Song::default()
            }),
            playing: Some(false),
            elapsed: Some(30.0),
            station: Some("Jazz".into()),
            station_id: Some("7".into()),
            volume: Some(3.0),
            max_gain: Some(6.0),
        }));
        let s = engine.state();
        assert_eq!(s.song.title, "Y");
        assert_eq!(s.song.rating, 1);
        assert!(!s.is_playing());
        assert_eq!((s.elapsed, s.total), (30.0, 240.0));
        assert_eq!(s.station_id.as_deref(), Some("7"));
        assert_eq!(s.station_name.as_deref(), Some("Jazz"));
        assert_eq!(s.max_gain, 6.0);
        assert_eq!(s.gain_percent(), 75.0);
    }

    #[test]
    fn test_toggle_is_speculative_until_authoritative_update() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        engine.apply(&start("X", "t1"));
        assert!(engine.toggle_playback(&mut out));
        assert!(!engine.state().is_playing());
        assert!(engine.state().playing.is_speculative());
        assert_eq!(
            out.sent,
            [OutboundCommand::Action(PlayerAction::TogglePlayback)]
        );

        // Server reports a new track: still playing.  Authoritative wins.
        engine.apply(&start("Z", "t2"));
        assert!(engine.state().is_playing());
        assert!(!engine.state().playing.is_speculative());
    }

    #[test]
    fn test_toggle_flips_even_when_disconnected() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        out.connected = false;
        assert!(!engine.toggle_playback(&mut out));
        assert!(engine.state().is_playing());
        assert!(out.sent.is_empty());
    }

    #[test]
    fn test_set_gain_sends_percent_and_derives_db() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        engine.set_gain(100.0, &mut out);
        assert_eq!(engine.state().gain_db, 10.0);
        engine.set_gain(0.0, &mut out);
        assert_eq!(engine.state().gain_db, -40.0);
        assert_eq!(
            out.sent,
            [
                OutboundCommand::SetGain { percent: 100.0 },
                OutboundCommand::SetGain { percent: 0.0 }
            ]
        );
    }

    #[test]
    fn test_stations_replace_in_server_order() {
        let mut engine = Engine::default();
        engine.apply(&stations(&["3", "1", "2"]));
        let ids: Vec<_> = engine.state().stations.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["3", "1", "2"]);
        engine.apply(&stations(&["1"]));
        assert_eq!(engine.state().stations.len(), 1);
    }

    #[test]
    fn test_creation_resolves_single_new_station() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        engine.apply(&stations(&["1", "2"]));
        engine.apply(&start("X", "tok"));

        assert!(engine.create_station(CreateRequest::FromSong, &mut out));
        assert_eq!(
            out.sent,
            [OutboundCommand::CreateFrom(CreateSource::Song {
                track_token: "tok".into()
            })]
        );
        assert!(engine.state().pending_creation.is_some());

        engine.apply(&stations(&["1", "2", "3"]));
        let s = engine.state();
        assert!(s.pending_creation.is_none());
        assert_eq!(s.new_station_prompt.as_ref().map(|st| st.id.as_str()), Some("3"));
        let toasts: Vec<_> = engine.toasts().visible().map(|t| t.severity).collect();
        assert_eq!(toasts, [Severity::Success]);

        assert!(engine.accept_new_station(&mut out));
        assert_eq!(
            out.sent.last(),
            Some(&OutboundCommand::ChangeStation {
                station_id: "3".into()
            })
        );
        assert!(engine.state().new_station_prompt.is_none());
    }

    #[test]
    fn test_creation_with_two_new_ids_stays_unresolved() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        engine.apply(&stations(&["1", "2"]));
        engine.apply(&start("X", "tok"));
        engine.create_station(CreateRequest::FromSong, &mut out);

        engine.apply(&stations(&["1", "2", "3", "4"]));
        let s = engine.state();
        assert!(s.pending_creation.is_some());
        assert!(s.new_station_prompt.is_none());
    }

    #[test]
    fn test_creation_with_no_new_ids_waits() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        engine.apply(&stations(&["1", "2"]));
        engine.create_station(
            CreateRequest::FromGenre {
                genre_id: "g9".into(),
            },
            &mut out,
        );
        assert_eq!(
            out.sent,
            [OutboundCommand::AddGenre {
                genre_id: "g9".into()
            }]
        );
        engine.apply(&stations(&["2", "1"]));
        assert!(engine.state().pending_creation.is_some());
        engine.apply(&stations(&["2", "1", "5"]));
        assert_eq!(
            engine.state().new_station_prompt.as_ref().map(|s| s.id.as_str()),
            Some("5")
        );
    }

    #[test]
    fn test_stations_without_pending_flow_never_prompt() {
        let mut engine = Engine::default();
        engine.apply(&stations(&["1"]));
        engine.apply(&stations(&["1", "2"]));
        assert!(engine.state().new_station_prompt.is_none());
    }

    #[test]
    fn test_new_creation_replaces_pending_one() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        engine.apply(&start("X", "tok"));
        engine.create_station(CreateRequest::FromSong, &mut out);
        engine.create_station(
            CreateRequest::FromSearch {
                music_id: "m1".into(),
            },
            &mut out,
        );
        assert_eq!(
            engine.state().pending_creation.as_ref().map(|p| p.kind),
            Some(CreationKind::Search)
        );
        engine.cancel_creation();
        assert!(engine.state().pending_creation.is_none());
    }

    #[test]
    fn test_create_from_song_needs_a_track() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        assert!(!engine.create_station(CreateRequest::FromArtist, &mut out));
        assert!(out.sent.is_empty());
        assert!(engine.state().pending_creation.is_none());
        assert_eq!(engine.toasts().len(), 1);
    }

    #[test]
    fn test_explanation_and_upcoming_only_toast() {
        let mut engine = Engine::default();
        engine.apply(&InboundEvent::SongExplanation("features swing".into()));
        engine.apply(&InboundEvent::UpcomingResult(vec![]));
        engine.apply(&InboundEvent::UpcomingResult(vec![UpcomingSong {
            title: "T".into(),
            artist: "A".into(),
        }]));
        let msgs: Vec<_> = engine.toasts_mut().drain().into_iter().map(|t| t.message).collect();
        assert_eq!(msgs, ["features swing", "No upcoming songs", "Upcoming:\nA – T"]);
        assert_eq!(engine.state().song.title, NOT_PLAYING_TITLE);
    }

    #[test]
    fn test_genres_and_search_clear_loading() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        engine.request_genres(&mut out);
        engine.search("miles", &mut out);
        assert!(engine.state().genres_loading && engine.state().search_loading);

        engine.apply(&InboundEvent::Genres(vec![GenreCategory {
            name: "Jazz".into(),
            genres: vec![],
        }]));
        engine.apply(&InboundEvent::SearchResults(SearchResults {
            artists: vec![ArtistMatch {
                id: "a1".into(),
                name: "Miles Davis".into(),
            }],
            songs: vec![],
        }));
        let s = engine.state();
        assert!(!s.genres_loading && !s.search_loading);
        assert_eq!(s.genres[0].name, "Jazz");
        assert_eq!(s.search_results.artists[0].id, "a1");
        assert_eq!(
            out.sent,
            [
                OutboundCommand::GetGenres,
                OutboundCommand::Search {
                    query: "miles".into()
                }
            ]
        );
    }

    #[test]
    fn test_last_search_result_wins() {
        let mut engine = Engine::default();
        let first = SearchResults {
            artists: vec![ArtistMatch {
                id: "a1".into(),
                name: "One".into(),
            }],
            songs: vec![],
        };
        engine.apply(&InboundEvent::SearchResults(first));
        engine.apply(&InboundEvent::SearchResults(SearchResults::default()));
        assert!(engine.state().search_results.is_empty());
    }

    #[test]
    fn test_quick_mix_updates_membership() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        let mut list = vec![station("q", "QuickMix"), station("1", "A"), station("2", "B")];
        list[0].is_quick_mix = true;
        list[1].is_quick_mixed = true;
        engine.apply(&InboundEvent::Stations(list));

        engine.set_quick_mix(&["2".to_string()], &mut out);
        let s = engine.state();
        assert!(!s.station("1").unwrap().is_quick_mixed);
        assert!(s.station("2").unwrap().is_quick_mixed);
        assert_eq!(s.quick_mix_station().map(|st| st.id.as_str()), Some("q"));
    }

    #[test]
    fn test_snapshot_does_not_follow_later_updates() {
        let mut engine = Engine::default();
        engine.apply(&start("A", "t1"));
        let before = engine.snapshot();
        engine.apply(&start("B", "t2"));
        assert_eq!(before.song.title, "A");
        assert_eq!(engine.state().song.title, "B");
    }

    #[test]
    fn test_disconnect_warns_once() {
        let mut engine = Engine::default();
        engine.set_connected(false);
        assert!(engine.toasts().is_empty());
        engine.set_connected(true);
        engine.set_connected(false);
        assert_eq!(engine.toasts().len(), 1);
        assert!(!engine.state().connected);
    }

    #[test]
    fn test_create_modal_from_search() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        engine.apply(&stations(&["1"]));

        assert!(engine.choose_source(CreationKind::Search, &mut out));
        assert_eq!(engine.flow(Modal::CreateStation).stage(), Stage::Search);
        assert!(engine.modal_search(Modal::CreateStation, "coltrane", &mut out));
        assert!(engine.choose_item(Modal::CreateStation, "m42"));
        assert_eq!(engine.flow(Modal::CreateStation).stage(), Stage::Confirm);
        assert!(engine.confirm(Modal::CreateStation, &mut out));

        assert_eq!(
            out.sent.last(),
            Some(&OutboundCommand::CreateFrom(CreateSource::Music {
                music_id: "m42".into()
            }))
        );
        assert!(engine.flow(Modal::CreateStation).is_idle());
        assert!(engine.state().search_query.is_none());
        assert!(engine.state().pending_creation.is_some());
    }

    #[test]
    fn test_create_modal_from_genre_requests_genres() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        engine.choose_source(CreationKind::Genre, &mut out);
        assert_eq!(out.sent, [OutboundCommand::GetGenres]);
        assert!(engine.modal_search(Modal::CreateStation, "bebop", &mut out));
        assert_eq!(out.sent.len(), 1);
        engine.choose_item(Modal::CreateStation, "g1");
        engine.confirm(Modal::CreateStation, &mut out);
        assert_eq!(
            out.sent.last(),
            Some(&OutboundCommand::AddGenre {
                genre_id: "g1".into()
            })
        );
    }

    #[test]
    fn test_cancel_resets_every_modal() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        engine.apply(&stations(&["1", "2"]));

        engine.choose_source(CreationKind::Search, &mut out);
        engine.modal_search(Modal::CreateStation, "x", &mut out);
        engine.choose_station(Modal::AddMusic, "1", &mut out);
        engine.modal_search(Modal::AddMusic, "y", &mut out);
        engine.choose_station(Modal::Rename, "1", &mut out);
        engine.choose_station(Modal::Delete, "2", &mut out);
        engine.choose_station(Modal::Seeds, "2", &mut out);

        for modal in Modal::ALL {
            assert!(!engine.flow(modal).is_idle(), "{modal:?}");
            engine.cancel(modal);
            assert!(engine.flow(modal).is_idle(), "{modal:?}");
            assert_eq!(engine.flow(modal).stage(), modal.stages()[0]);
        }
        let s = engine.state();
        assert!(s.search_query.is_none());
        assert!(!s.search_loading);
        assert!(s.station_info.is_none());
    }

    #[test]
    fn test_rename_modal_prefills_and_sends() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        engine.apply(&stations(&["1"]));
        engine.choose_station(Modal::Rename, "1", &mut out);
        assert_eq!(engine.flow(Modal::Rename).text, "S1");
        assert!(!engine.set_name("   "));
        assert!(engine.set_name("Late Night"));
        assert!(engine.confirm(Modal::Rename, &mut out));
        assert_eq!(
            out.sent,
            [OutboundCommand::RenameStation {
                station_id: "1".into(),
                name: "Late Night".into()
            }]
        );
        assert!(engine.flow(Modal::Rename).is_idle());
    }

    #[test]
    fn test_delete_modal() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        assert!(!engine.confirm(Modal::Delete, &mut out));
        engine.choose_station(Modal::Delete, "4", &mut out);
        assert!(engine.confirm(Modal::Delete, &mut out));
        assert_eq!(
            out.sent,
            [OutboundCommand::DeleteStation {
                station_id: "4".into()
            }]
        );
    }

    #[test]
    fn test_add_music_modal() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        engine.choose_station(Modal::AddMusic, "4", &mut out);
        engine.modal_search(Modal::AddMusic, "monk", &mut out);
        engine.choose_item(Modal::AddMusic, "m7");
        assert!(engine.confirm(Modal::AddMusic, &mut out));
        assert_eq!(
            out.sent.last(),
            Some(&OutboundCommand::AddMusic {
                station_id: "4".into(),
                music_id: "m7".into()
            })
        );
        // Adding music is not a creation.
        assert!(engine.state().pending_creation.is_none());
    }

    #[test]
    fn test_seed_modal_fetches_and_filters_info() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        engine.choose_station(Modal::Seeds, "4", &mut out);
        assert_eq!(
            out.sent,
            [OutboundCommand::GetStationInfo {
                station_id: "4".into()
            }]
        );
        assert_eq!(engine.flow(Modal::Seeds).stage(), Stage::ReviewSeeds);

        let seeds = vec![Seed {
            id: "s1".into(),
            kind: "artist".into(),
            name: "Monk".into(),
        }];
        engine.apply(&InboundEvent::StationInfo(StationInfo {
            station_id: Some("9".into()),
            seeds: seeds.clone(),
        }));
        assert!(engine.state().station_info.is_none());
        engine.apply(&InboundEvent::StationInfo(StationInfo {
            station_id: Some("4".into()),
            seeds,
        }));
        assert_eq!(engine.state().station_info.as_ref().unwrap().seeds.len(), 1);

        engine.choose_item(Modal::Seeds, "s1");
        assert!(engine.confirm(Modal::Seeds, &mut out));
        assert_eq!(
            out.sent.last(),
            Some(&OutboundCommand::DeleteSeed {
                seed_id: "s1".into()
            })
        );
        assert!(engine.state().station_info.is_none());
    }

    #[test]
    fn test_stage_mismatch_is_ignored() {
        let mut engine = Engine::default();
        let mut out = Recorder::new();
        assert!(!engine.choose_item(Modal::CreateStation, "m1"));
        assert!(!engine.set_name("x"));
        assert!(!engine.modal_search(Modal::Delete, "x", &mut out));
        engine.choose_source(CreationKind::Song, &mut out);
        assert!(!engine.choose_source(CreationKind::Artist, &mut out));
        assert!(out.sent.is_empty());
    }
}
