//! Relay sink: accepts one transient TCP connection per message, stamps the
//! message with its receipt time and persists it through a [`MessageStore`].
//!
//! [`MessageStore`]: postbox_db::MessageStore

pub mod clock;
pub mod config;
pub mod error;
pub mod listener;
pub mod relay;

pub use clock::ReceiptClock;
pub use config::SinkConfig;
pub use error::RelayError;
pub use listener::bind_listener;
pub use relay::RelaySink;
