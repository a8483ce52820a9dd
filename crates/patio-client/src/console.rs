//! Line commands for the console front end.

use anyhow::{anyhow, bail};
use patio_client::CreateRequest;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Toggle,
    Next,
    Love,
    Ban,
    Tired,
    Explain,
    Upcoming,
    Station(String),
    Stations,
    Volume(f64),
    Search(String),
    Genres,
    Create(CreateRequest),
    Yes,
    No,
    Delete(String),
    Rename(String, String),
    Seeds(String),
    Unseed(String),
    QuickMix(Vec<String>),
    Cancel,
    Reconnect,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
toggle | next | love | ban | tired | explain | upcoming
station <id> | stations | vol <0-100> | search <text> | genres
create song|artist | create genre <id> | create result <id> | yes | no
delete <id> | rename <id> <name> | seeds <id> | unseed <seed id>
quickmix <id,id,...> | cancel | reconnect | status | help | quit";

pub fn parse(line: &str) -> anyhow::Result<Command> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };

    let arg = |what: &str| -> anyhow::Result<String> {
        if rest.is_empty() {
            Err(anyhow!("{} needs {}", word, what))
        } else {
            Ok(rest.to_string())
        }
    };

    let cmd = match word {
        "toggle" | "p" => Command::Toggle,
        "next" | "n" => Command::Next,
        "love" | "+" => Command::Love,
        "ban" | "-" => Command::Ban,
        "tired" => Command::Tired,
        "explain" => Command::Explain,
        "upcoming" => Command::Upcoming,
        "station" => Command::Station(arg("a station id")?),
        "stations" => Command::Stations,
        "vol" | "volume" => {
            let pct: f64 = arg("a percentage")?
                .parse()
                .map_err(|_| anyhow!("not a number: {}", rest))?;
            if !(0.0..=100.0).contains(&pct) {
                bail!("volume must be 0-100");
            }
            Command::Volume(pct)
        }
        "search" => Command::Search(arg("some text")?),
        "genres" => Command::Genres,
        "create" => {
            let (what, id) = match rest.split_once(char::is_whitespace) {
                Some((w, i)) => (w, i.trim()),
                None => (rest, ""),
            };
            match (what, id) {
                ("song", _) => Command::Create(CreateRequest::FromSong),
                ("artist", _) => Command::Create(CreateRequest::FromArtist),
                ("genre", id) if !id.is_empty() => Command::Create(CreateRequest::FromGenre {
                    genre_id: id.to_string(),
                }),
                ("result", id) if !id.is_empty() => Command::Create(CreateRequest::FromSearch {
                    music_id: id.to_string(),
                }),
                _ => bail!("usage: create song|artist|genre <id>|result <id>"),
            }
        }
        "yes" | "y" => Command::Yes,
        "no" => Command::No,
        "delete" => Command::Delete(arg("a station id")?),
        "rename" => {
            let text = arg("a station id and a name")?;
            match text.split_once(char::is_whitespace) {
                Some((id, name)) if !name.trim().is_empty() => {
                    Command::Rename(id.to_string(), name.trim().to_string())
                }
                _ => bail!("usage: rename <id> <name>"),
            }
        }
        "seeds" => Command::Seeds(arg("a station id")?),
        "unseed" => Command::Unseed(arg("a seed id")?),
        "quickmix" => Command::QuickMix(
            arg("station ids")?
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        "cancel" => Command::Cancel,
        "reconnect" => Command::Reconnect,
        "status" | "" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => bail!("unknown command {:?} (try help)", other),
    };
    Ok(cmd)
}

/// `m:ss`
pub fn clock(secs: f64) -> String {
    let secs = secs.max(0.0) as u64;
    format!("{}:{:02}", secs / 60, secs % 60)
}
