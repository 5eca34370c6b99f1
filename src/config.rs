//! Process configuration, read once at startup.
//!
//! Every option can be given as a flag or through the environment; flags win. A `.env`
//! file is read into the environment first, without overriding variables already set.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::session::ManagerConfig;

/// Realtime collaborative plain-text document server.
#[derive(Debug, Clone, Parser)]
#[command(name = "rga-collab", version, about)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Snapshot file the document is loaded from and saved to
    #[arg(long = "document", env = "DOCUMENT_PATH", default_value = "document.json")]
    pub document_path: PathBuf,

    /// Directory of static assets served next to the websocket endpoint
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Give up on a participant whose write takes longer than this many milliseconds
    #[arg(long, env = "WRITE_TIMEOUT_MS")]
    pub write_timeout_ms: Option<u64>,

    /// Keep the document in memory only
    #[arg(long)]
    pub ephemeral: bool,
}

impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            write_timeout: self.write_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Loads `KEY=value` pairs from an env file into the process environment.
///
/// With no path, `.env` is searched for in the current directory and its parents.
/// A missing file is not an error; returns the path that was loaded, if any.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, dotenvy::Error> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
