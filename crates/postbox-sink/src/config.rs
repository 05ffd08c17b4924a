use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use postbox_types::DEFAULT_MAX_FRAME_SIZE;

/// Relay sink settings, built once at startup and handed to constructors.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub listen_addr: SocketAddr,
    pub db_path: PathBuf,
    /// Pending-connection queue depth passed to `listen(2)`.
    pub backlog: i32,
    /// Connections processed concurrently; the acceptor waits when all are busy.
    pub max_workers: usize,
    pub max_frame_size: usize,
    pub read_timeout: Duration,
    pub persist_timeout: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            db_path: PathBuf::from("postbox.db"),
            backlog: 128,
            max_workers: 64,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_timeout: Duration::from_secs(5),
            persist_timeout: Duration::from_secs(10),
        }
    }
}

impl SinkConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("POSTBOX_SINK_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&lookup, "POSTBOX_SINK_PORT", defaults.listen_addr.port())?;
        let listen_addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid POSTBOX_SINK_HOST {:?}", host))?;

        Ok(Self {
            listen_addr,
            db_path: lookup("POSTBOX_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            backlog: parse_or(&lookup, "POSTBOX_SINK_BACKLOG", defaults.backlog)?,
            max_workers: parse_or(&lookup, "POSTBOX_SINK_WORKERS", defaults.max_workers)?.max(1),
            max_frame_size: parse_or(&lookup, "POSTBOX_MAX_FRAME_BYTES", defaults.max_frame_size)?,
            read_timeout: Duration::from_millis(parse_or(
                &lookup,
                "POSTBOX_READ_TIMEOUT_MS",
                defaults.read_timeout.as_millis() as u64,
            )?),
            persist_timeout: Duration::from_millis(parse_or(
                &lookup,
                "POSTBOX_PERSIST_TIMEOUT_MS",
                defaults.persist_timeout.as_millis() as u64,
            )?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {} {:?}", key, raw)),
        None => Ok(default),
    }
}
