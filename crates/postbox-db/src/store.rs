use anyhow::Result;
use postbox_types::StoredMessage;
use uuid::Uuid;

use crate::Database;

/// Append-only sink for finalized messages.
///
/// `insert` is synchronous: when it returns, the write has either landed or
/// failed. Callers on an async runtime should run it on the blocking pool.
pub trait MessageStore: Send + Sync {
    fn insert(&self, msg: &StoredMessage) -> Result<()>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

impl MessageStore for Database {
    fn insert(&self, msg: &StoredMessage) -> Result<()> {
        // Every document gets its own id, so identical submissions stay distinct
        let id = Uuid::new_v4().to_string();
        self.insert_message(&id, msg)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
