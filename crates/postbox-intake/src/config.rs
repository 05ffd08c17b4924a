use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use postbox_types::DEFAULT_MAX_FRAME_SIZE;

/// Intake service settings, built once at startup.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub http_addr: SocketAddr,
    /// `host:port` of the relay sink; host names are resolved per connection.
    pub relay_addr: String,
    pub static_dir: PathBuf,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub max_body_bytes: usize,
    /// Payload ceiling the sink enforces; larger submissions are refused here.
    pub max_frame_size: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            relay_addr: "127.0.0.1:5000".into(),
            static_dir: PathBuf::from("./static"),
            connect_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(3),
            max_body_bytes: 64 * 1024,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl IntakeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("POSTBOX_HTTP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&lookup, "POSTBOX_HTTP_PORT", defaults.http_addr.port())?;
        let http_addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid POSTBOX_HTTP_HOST {:?}", host))?;

        Ok(Self {
            http_addr,
            relay_addr: lookup("POSTBOX_RELAY_ADDR").unwrap_or(defaults.relay_addr),
            static_dir: lookup("POSTBOX_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            connect_timeout: Duration::from_millis(parse_or(
                &lookup,
                "POSTBOX_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout.as_millis() as u64,
            )?),
            write_timeout: Duration::from_millis(parse_or(
                &lookup,
                "POSTBOX_WRITE_TIMEOUT_MS",
                defaults.write_timeout.as_millis() as u64,
            )?),
            max_body_bytes: parse_or(&lookup, "POSTBOX_MAX_BODY_BYTES", defaults.max_body_bytes)?,
            max_frame_size: parse_or(&lookup, "POSTBOX_MAX_FRAME_BYTES", defaults.max_frame_size)?,
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
