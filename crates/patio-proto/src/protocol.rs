//! Typed view of the player protocol.
//!
//! Inbound frames are decoded by [`crate::codec`] into an [`Envelope`] and
//! then lifted into an [`InboundEvent`].  Outbound intents are expressed as
//! [`OutboundCommand`] and lowered back into an envelope for the codec.
//!
//! Payload types are lenient: every field has a default and explicit JSON
//! `null` is treated like a missing field, because the server sends partial
//! objects (most notably in the `process` snapshot).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::codec::Envelope;

// ── Payload types ─────────────────────────────────────────────────────────────

/// Descriptor of the track currently loaded by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub artist: String,
    #[serde(default, deserialize_with = "nullable")]
    pub album: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cover_art: String,
    /// Track length in seconds.
    #[serde(default, alias = "songDuration", deserialize_with = "nullable")]
    pub duration: f64,
    /// 1 = loved, 0 = unrated.
    #[serde(default, deserialize_with = "nullable")]
    pub rating: u8,
    /// Station the track belongs to (differs from the active station in quick mix).
    #[serde(default, alias = "songStationName", deserialize_with = "nullable")]
    pub station_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub track_token: String,
}

/// `start` payload: the song plus, optionally, the active station.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackStart {
    #[serde(flatten)]
    pub song: Song,
    #[serde(default, deserialize_with = "optional_id")]
    pub station_id: Option<String>,
    /// Active station name.
    #[serde(default)]
    pub station: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Progress {
    #[serde(default, deserialize_with = "nullable")]
    pub elapsed: f64,
    #[serde(default, alias = "total", deserialize_with = "nullable")]
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    #[serde(deserialize_with = "id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    /// The synthetic aggregate station.
    #[serde(default, deserialize_with = "nullable")]
    pub is_quick_mix: bool,
    /// An ordinary station currently included in the aggregate.
    #[serde(default, deserialize_with = "nullable")]
    pub is_quick_mixed: bool,
}

/// `process` payload: full state snapshot answering a `query`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSnapshot {
    #[serde(default)]
    pub song: Option<Song>,
    #[serde(default)]
    pub playing: Option<bool>,
    #[serde(default)]
    pub elapsed: Option<f64>,
    /// Active station name.
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub station_id: Option<String>,
    /// Current output gain in dB.
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub max_gain: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Genre {
    #[serde(deserialize_with = "id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GenreCategory {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArtistMatch {
    #[serde(alias = "musicId", deserialize_with = "id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SongMatch {
    #[serde(alias = "musicId", deserialize_with = "id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub artist: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchResults {
    #[serde(default, deserialize_with = "nullable")]
    pub artists: Vec<ArtistMatch>,
    #[serde(default, deserialize_with = "nullable")]
    pub songs: Vec<SongMatch>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.artists.is_empty() && self.songs.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UpcomingSong {
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub artist: String,
}

/// A seed (artist, song or genre) a station was built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Seed {
    #[serde(alias = "seedId", deserialize_with = "id")]
    pub id: String,
    #[serde(default, rename = "type", deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StationInfo {
    #[serde(default, deserialize_with = "optional_id")]
    pub station_id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub seeds: Vec<Seed>,
}

// ── Inbound events ────────────────────────────────────────────────────────────

/// Every inbound event name the client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Stop,
    Progress,
    Stations,
    Process,
    Genres,
    SearchResults,
    SongExplanation,
    UpcomingResult,
    StationInfo,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::Start,
        EventKind::Stop,
        EventKind::Progress,
        EventKind::Stations,
        EventKind::Process,
        EventKind::Genres,
        EventKind::SearchResults,
        EventKind::SongExplanation,
        EventKind::UpcomingResult,
        EventKind::StationInfo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Stop => "stop",
            EventKind::Progress => "progress",
            EventKind::Stations => "stations",
            EventKind::Process => "process",
            EventKind::Genres => "genres",
            EventKind::SearchResults => "searchResults",
            EventKind::SongExplanation => "song.explanation",
            EventKind::UpcomingResult => "query.upcoming.result",
            EventKind::StationInfo => "stationInfo",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// Typed inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Start(TrackStart),
    Stop,
    Progress(Progress),
    Stations(Vec<Station>),
    Process(ProcessSnapshot),
    Genres(Vec<GenreCategory>),
    SearchResults(SearchResults),
    SongExplanation(String),
    UpcomingResult(Vec<UpcomingSong>),
    StationInfo(StationInfo),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("bad payload for {event:?}: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("bad payload for {event:?}: {reason}")]
    Shape { event: &'static str, reason: String },
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::Start(_) => EventKind::Start,
            InboundEvent::Stop => EventKind::Stop,
            InboundEvent::Progress(_) => EventKind::Progress,
            InboundEvent::Stations(_) => EventKind::Stations,
            InboundEvent::Process(_) => EventKind::Process,
            InboundEvent::Genres(_) => EventKind::Genres,
            InboundEvent::SearchResults(_) => EventKind::SearchResults,
            InboundEvent::SongExplanation(_) => EventKind::SongExplanation,
            InboundEvent::UpcomingResult(_) => EventKind::UpcomingResult,
            InboundEvent::StationInfo(_) => EventKind::StationInfo,
        }
    }

    /// Lift an envelope into a typed event.
    ///
    /// Unknown event names yield `Ok(None)`; a known name whose payload does
    /// not fit yields an error.
    pub fn from_envelope(env: &Envelope) -> Result<Option<Self>, ProtocolError> {
        let Some(kind) = EventKind::from_name(&env.event) else {
            return Ok(None);
        };
        let payload = &env.payload;
        let event = match kind {
            EventKind::Start => InboundEvent::Start(parse(kind, payload)?),
            EventKind::Stop => InboundEvent::Stop,
            EventKind::Progress => InboundEvent::Progress(parse(kind, payload)?),
            EventKind::Stations => InboundEvent::Stations(parse_list(kind, payload)?),
            EventKind::Process => InboundEvent::Process(parse(kind, payload)?),
            EventKind::Genres => InboundEvent::Genres(parse_list(kind, payload)?),
            EventKind::SearchResults => InboundEvent::SearchResults(parse(kind, payload)?),
            EventKind::SongExplanation => {
                InboundEvent::SongExplanation(explanation_text(payload).ok_or_else(|| {
                    ProtocolError::Shape {
                        event: kind.name(),
                        reason: "expected a string or {explanation}".to_string(),
                    }
                })?)
            }
            EventKind::UpcomingResult => InboundEvent::UpcomingResult(parse_list(kind, payload)?),
            EventKind::StationInfo => InboundEvent::StationInfo(parse(kind, payload)?),
        };
        Ok(Some(event))
    }
}

fn parse<T: for<'de> Deserialize<'de> + Default>(
    kind: EventKind,
    payload: &Value,
) -> Result<T, ProtocolError> {
    if payload.is_null() {
        return Ok(T::default());
    }
    T::deserialize(payload).map_err(|source| ProtocolError::Payload {
        event: kind.name(),
        source,
    })
}

fn parse_list<T: for<'de> Deserialize<'de>>(
    kind: EventKind,
    payload: &Value,
) -> Result<Vec<T>, ProtocolError> {
    if payload.is_null() {
        return Ok(Vec::new());
    }
    Vec::<T>::deserialize(payload).map_err(|source| ProtocolError::Payload {
        event: kind.name(),
        source,
    })
}

fn explanation_text(payload: &Value) -> Option<String> {
    match payload {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("explanation")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

// ── Outbound commands ─────────────────────────────────────────────────────────

/// Bare-string player actions carried by the `action` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    TogglePlayback,
    Skip,
    Love,
    Ban,
    /// "Snooze": shelve the track for a month.
    Tired,
    Explain,
    Upcoming,
}

impl PlayerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerAction::TogglePlayback => "playback.toggle",
            PlayerAction::Skip => "playback.next",
            PlayerAction::Love => "song.love",
            PlayerAction::Ban => "song.ban",
            PlayerAction::Tired => "song.tired",
            PlayerAction::Explain => "song.explain",
            PlayerAction::Upcoming => "query.upcoming",
        }
    }
}

/// What a new station is created from.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateSource {
    /// The given track.
    Song { track_token: String },
    /// The artist of the given track.
    Artist { track_token: String },
    /// A search result (artist or song match).
    Music { music_id: String },
}

/// Every command the client sends.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCommand {
    /// Request a full `process` snapshot.
    Query,
    Action(PlayerAction),
    /// Slider percentage, 0..=100.
    SetGain { percent: f64 },
    ChangeStation { station_id: String },
    CreateFrom(CreateSource),
    AddGenre { genre_id: String },
    AddMusic { station_id: String, music_id: String },
    DeleteStation { station_id: String },
    RenameStation { station_id: String, name: String },
    SetQuickMix { station_ids: Vec<String> },
    GetGenres,
    Search { query: String },
    GetStationInfo { station_id: String },
    DeleteSeed { seed_id: String },
}

impl OutboundCommand {
    pub fn event_name(&self) -> &'static str {
        match self {
            OutboundCommand::Query => "query",
            OutboundCommand::Action(_) | OutboundCommand::SetGain { .. } => "action",
            OutboundCommand::ChangeStation { .. } => "station.change",
            OutboundCommand::CreateFrom(_) => "station.createFrom",
            OutboundCommand::AddGenre { .. } => "station.addGenre",
            OutboundCommand::AddMusic { .. } => "station.addMusic",
            OutboundCommand::DeleteStation { .. } => "station.delete",
            OutboundCommand::RenameStation { .. } => "station.rename",
            OutboundCommand::SetQuickMix { .. } => "station.setQuickMix",
            OutboundCommand::GetGenres => "station.getGenres",
            OutboundCommand::Search { .. } => "music.search",
            OutboundCommand::GetStationInfo { .. } => "station.getInfo",
            OutboundCommand::DeleteSeed { .. } => "station.deleteSeed",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            OutboundCommand::Query | OutboundCommand::GetGenres => Value::Null,
            OutboundCommand::Action(action) => json!(action.as_str()),
            OutboundCommand::SetGain { percent } => {
                json!({ "action": "volume", "volume": percent.clamp(0.0, 100.0).round() as u8 })
            }
            OutboundCommand::ChangeStation { station_id } => json!({ "stationId": station_id }),
            OutboundCommand::CreateFrom(CreateSource::Song { track_token }) => {
                json!({ "type": "song", "trackToken": track_token })
            }
            OutboundCommand::CreateFrom(CreateSource::Artist { track_token }) => {
                json!({ "type": "artist", "trackToken": track_token })
            }
            OutboundCommand::CreateFrom(CreateSource::Music { music_id }) => {
                json!({ "musicId": music_id })
            }
            OutboundCommand::AddGenre { genre_id } => json!({ "genreId": genre_id }),
            OutboundCommand::AddMusic {
                station_id,
                music_id,
            } => json!({ "stationId": station_id, "musicId": music_id }),
            OutboundCommand::DeleteStation { station_id } => json!({ "stationId": station_id }),
            OutboundCommand::RenameStation { station_id, name } => {
                json!({ "stationId": station_id, "name": name })
            }
            OutboundCommand::SetQuickMix { station_ids } => json!({ "stationIds": station_ids }),
            OutboundCommand::Search { query } => json!({ "query": query }),
            OutboundCommand::GetStationInfo { station_id } => json!({ "stationId": station_id }),
            OutboundCommand::DeleteSeed { seed_id } => json!({ "seedId": seed_id }),
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        Envelope::new(self.event_name(), self.payload())
    }
}

// ── Lenient field helpers ─────────────────────────────────────────────────────

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Ids arrive as strings from some servers and as numbers from others.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Int(n) => n.to_string(),
            RawId::Float(f) => f.to_string(),
        }
    }
}

fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}

fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}
