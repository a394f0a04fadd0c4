//! Default paths for hayaoki components
//!
//! Everything lives under user-writable XDG locations:
//! - Socket: `$XDG_RUNTIME_DIR/hayaoki/hayaokid.sock` or `/tmp/hayaoki-$USER/hayaokid.sock`
//! - Config: `$XDG_CONFIG_HOME/hayaoki/config.toml` or `~/.config/hayaoki/config.toml`
//! - Data: `$XDG_DATA_HOME/hayaoki` or `~/.local/share/hayaoki`

use std::path::{Path, PathBuf};

/// Environment variable for overriding the socket path
pub const HAYAOKI_SOCKET_ENV: &str = "HAYAOKI_SOCKET";

/// Environment variable for overriding the data directory
pub const HAYAOKI_DATA_DIR_ENV: &str = "HAYAOKI_DATA_DIR";

const APP_DIR: &str = "hayaoki";
const SOCKET_FILENAME: &str = "hayaokid.sock";
const CONFIG_FILENAME: &str = "config.toml";
const LEDGER_FILENAME: &str = "ledger.db";

/// Default socket path; `$HAYAOKI_SOCKET` wins when set.
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(HAYAOKI_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Socket path ignoring `$HAYAOKI_SOCKET`, for config defaults
/// where the variable is checked separately by the CLI layer.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Default data directory; `$HAYAOKI_DATA_DIR` wins when set.
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(HAYAOKI_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

pub fn data_dir_without_env() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"])
        .unwrap_or_else(|| PathBuf::from("/tmp").join(APP_DIR).join("data"))
}

/// Default configuration file
pub fn default_config_path() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", &[".config"])
        .unwrap_or_else(|| PathBuf::from("/etc").join(APP_DIR))
        .join(CONFIG_FILENAME)
}

/// Ledger database file inside a data directory
pub fn ledger_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LEDGER_FILENAME)
}

fn xdg_dir(var: &str, home_fallback: &[&str]) -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(var) {
        return Some(PathBuf::from(dir).join(APP_DIR));
    }

    let home = std::env::var("HOME").ok()?;
    let mut path = PathBuf::from(home);
    for segment in home_fallback {
        path.push(segment);
    }
    Some(path.join(APP_DIR))
}
