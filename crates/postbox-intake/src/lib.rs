//! Intake service: serves the static site and relays each submitted form to
//! the sink over a fresh TCP connection.

pub mod config;
pub mod relay;
pub mod routes;

pub use config::IntakeConfig;
pub use relay::{RelayClient, TransportError};
pub use routes::{ASSETS, AppState, AppStateInner, router};
