use std::path::PathBuf;

use thiserror::Error;

/// Well-known socket path served next to the web UI.
pub const SOCKET_PATH: &str = "/ws";

const APP_DIR: &str = "patio";

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/patio/ (XDG standard)
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum UrlError {
    #[error("origin {0:?} must start with http:// or https://")]
    UnsupportedScheme(String),
    #[error("origin {0:?} has no host")]
    MissingHost(String),
}

/// Derive the socket URL from the page origin.
///
/// `http` maps to `ws` and `https` to `wss`; host and port are kept, any
/// path, query or fragment on the origin is discarded and `path` appended.
pub fn socket_url(origin: &str, path: &str) -> Result<String, UrlError> {
    let origin = origin.trim();
    let (scheme, rest) = if let Some(rest) = origin.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = origin.strip_prefix("http://") {
        ("ws", rest)
    } else {
        return Err(UrlError::UnsupportedScheme(origin.to_string()));
    };

    let host = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    if host.is_empty() {
        return Err(UrlError::MissingHost(origin.to_string()));
    }

    let path = path.trim_start_matches('/');
    Ok(format!("{}://{}/{}", scheme, host, path))
}
