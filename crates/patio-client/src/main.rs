mod console;

use std::time::Instant;

use patio_client::flows::{CreationKind, Modal};
use patio_client::toast::Severity;
use patio_client::{Client, CreateRequest, UiState};
use patio_proto::gain;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::console::{clock, Command, HELP};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = patio_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("patio.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; keep the websocket internals quiet by default.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,tungstenite=warn,tokio_tungstenite=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("patio log: {}", log_path.display());
    info!("patio starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match patio_proto::config::Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("config: {}, using defaults", e);
            patio_proto::config::Config::default()
        }
    };

    let mut client = Client::from_config(&config)?;
    let url = client.transport().url().to_string();
    client
        .transport_mut()
        .on_connection_change(move |open| {
            if open {
                println!("● connected to {}", url);
            } else {
                println!("○ disconnected (type `reconnect` to try again)");
            }
        });
    client.connect();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut view = View::default();

    loop {
        tokio::select! {
            Some(event) = client.next_event() => {
                client.handle(event);
                // Drain whatever else is already queued before redrawing.
                while let Some(event) = client.try_next_event() {
                    client.handle(event);
                }
                view.refresh(&mut client, false);
            }

            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    // stdin closed
                    Ok(None) => break,
                    Err(e) => {
                        warn!("stdin: {}", e);
                        break;
                    }
                };
                match console::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(cmd) => {
                        let forced = run_command(&mut client, cmd);
                        view.refresh(&mut client, forced);
                    }
                    Err(e) => println!("! {}", e),
                }
            }
        }
    }

    info!("patio exiting");
    Ok(())
}

/// Returns `true` when the command asks for the status line to be reprinted.
fn run_command(client: &mut Client, cmd: Command) -> bool {
    let sent = match cmd {
        Command::Toggle => client.act(|e, out| e.toggle_playback(out)),
        Command::Next => client.act(|e, out| e.skip(out)),
        Command::Love => client.act(|e, out| e.love(out)),
        Command::Ban => client.act(|e, out| e.ban(out)),
        Command::Tired => client.act(|e, out| e.snooze(out)),
        Command::Explain => client.act(|e, out| e.explain(out)),
        Command::Upcoming => client.act(|e, out| e.request_upcoming(out)),
        Command::Station(id) => client.act(|e, out| e.change_station(&id, out)),
        Command::Volume(pct) => client.act(|e, out| e.set_gain(pct, out)),
        Command::Search(query) => client.act(|e, out| e.search(&query, out)),
        Command::Genres => client.act(|e, out| e.request_genres(out)),
        Command::Create(request) => client.act(|e, out| create(e, request, out)),
        Command::Yes => client.act(|e, out| e.accept_new_station(out)),
        Command::Delete(id) => client.act(|e, out| {
            e.choose_station(Modal::Delete, &id, out) && e.confirm(Modal::Delete, out)
        }),
        Command::Rename(id, name) => client.act(|e, out| {
            e.choose_station(Modal::Rename, &id, out)
                && e.set_name(&name)
                && e.confirm(Modal::Rename, out)
        }),
        Command::Seeds(id) => client.act(|e, out| {
            e.cancel(Modal::Seeds);
            e.choose_station(Modal::Seeds, &id, out)
        }),
        Command::Unseed(seed_id) => client.act(|e, out| {
            e.choose_item(Modal::Seeds, &seed_id) && e.confirm(Modal::Seeds, out)
        }),
        Command::QuickMix(ids) => client.act(|e, out| e.set_quick_mix(&ids, out)),
        Command::No => {
            client.engine_mut().dismiss_new_station();
            return false;
        }
        Command::Cancel => {
            let open: Vec<Modal> = client.state().flows.active().map(|f| f.modal()).collect();
            for modal in open {
                client.engine_mut().cancel(modal);
                println!("cancelled {:?}", modal);
            }
            client.engine_mut().cancel_creation();
            return false;
        }
        Command::Reconnect => {
            client.reconnect();
            return false;
        }
        Command::Stations => {
            print_stations(client.state());
            return false;
        }
        Command::Help => {
            println!("{}", HELP);
            return false;
        }
        Command::Status | Command::Quit => return true,
    };
    if !sent && !client.is_connected() {
        client
            .engine_mut()
            .toasts_mut()
            .error("Not connected, command dropped");
    }
    false
}

/// Create-station commands go through the modal so its reset contract holds.
fn create(
    engine: &mut patio_client::Engine,
    request: CreateRequest,
    out: &mut dyn patio_client::Outbound,
) -> bool {
    engine.cancel(Modal::CreateStation);
    let kind = request.kind();
    if !engine.choose_source(kind, out) {
        return false;
    }
    match request {
        CreateRequest::FromGenre { genre_id } => {
            engine.choose_item(Modal::CreateStation, &genre_id);
        }
        CreateRequest::FromSearch { music_id } => {
            engine.choose_item(Modal::CreateStation, &music_id);
        }
        CreateRequest::FromSong | CreateRequest::FromArtist => {}
    }
    let sent = engine.confirm(Modal::CreateStation, out);
    if sent && kind == CreationKind::Song {
        println!("… creating station from this song");
    }
    sent
}

fn print_stations(state: &UiState) {
    for station in &state.stations {
        let active = state.station_id.as_deref() == Some(station.id.as_str());
        let mark = if station.is_quick_mix {
            "Q"
        } else if station.is_quick_mixed {
            "q"
        } else {
            " "
        };
        println!(
            "{} {} {:>12}  {}",
            if active { "▶" } else { " " },
            mark,
            station.id,
            station.name
        );
    }
}

/// Tracks what has already been printed so events only print what changed.
#[derive(Default)]
struct View {
    last_status: String,
    last_prompt: Option<String>,
    last_genres: usize,
    last_search: Option<String>,
    last_seeds: Option<String>,
}

impl View {
    fn refresh(&mut self, client: &mut Client, force: bool) {
        let state = client.engine().snapshot();
        let state = &state;

        let status = status_line(state);
        if force {
            println!("{} {}/{}", status, clock(state.elapsed), clock(state.total));
        } else if status != self.last_status {
            println!("{}", status);
        }
        self.last_status = status;

        let prompt = state.new_station_prompt.as_ref().map(|s| s.id.clone());
        if prompt != self.last_prompt {
            if let Some(station) = &state.new_station_prompt {
                println!("★ created \"{}\": play it now? (yes/no)", station.name);
            }
            self.last_prompt = prompt;
        }

        let genre_count: usize = state.genres.iter().map(|c| c.genres.len()).sum();
        if genre_count != self.last_genres {
            for category in &state.genres {
                println!("[{}]", category.name);
                for genre in &category.genres {
                    println!("  {:>10}  {}", genre.id, genre.name);
                }
            }
            self.last_genres = genre_count;
        }

        if !state.search_loading && state.search_query != self.last_search {
            if state.search_query.is_some() {
                for artist in &state.search_results.artists {
                    println!("  artist {:>10}  {}", artist.id, artist.name);
                }
                for song in &state.search_results.songs {
                    println!("  song   {:>10}  {} – {}", song.id, song.artist, song.title);
                }
                if state.search_results.is_empty() {
                    println!("  (no results)");
                }
            }
            self.last_search = state.search_query.clone();
        }

        let seeds_for = state.station_info.as_ref().and_then(|i| i.station_id.clone());
        if seeds_for != self.last_seeds {
            if let Some(info) = &state.station_info {
                for seed in &info.seeds {
                    println!("  seed {:>10}  {} ({})", seed.id, seed.name, seed.kind);
                }
            }
            self.last_seeds = seeds_for;
        }

        let now = Instant::now();
        let toasts = client.engine_mut().toasts_mut();
        toasts.expire(now);
        for toast in toasts.drain() {
            let mark = match toast.severity {
                Severity::Info => "»",
                Severity::Success => "✓",
                Severity::Warning => "!",
                Severity::Error => "✗",
            };
            println!("{} {}", mark, toast.message);
        }
    }
}

fn status_line(state: &UiState) -> String {
    let icon = if state.is_playing() { "▶" } else { "■" };
    let pending = if state.playing.is_overdue() {
        "?"
    } else if state.playing.is_speculative() {
        "…"
    } else {
        ""
    };
    let love = if state.song.rating > 0 { " ♥" } else { "" };
    let station = state.station_name.as_deref().unwrap_or("-");
    format!(
        "{}{} {} – {}{}  [{}]  {}",
        icon,
        pending,
        state.song.artist,
        state.song.title,
        love,
        station,
        gain::format_db(state.gain_db)
    )
}
