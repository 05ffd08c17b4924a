use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use postbox_types::StoredMessage;

use crate::store::MessageStore;

/// In-process append-only store, for tests and local runs without SQLite.
///
/// Can be switched "down" to simulate a storage outage: every insert fails
/// until it is switched back. A slow mode blocks each insert for a fixed
/// delay, and the store tracks how many inserts ran at once.
pub struct MemoryStore {
    documents: Mutex<Vec<StoredMessage>>,
    available: AtomicBool,
    failed_inserts: AtomicU64,
    insert_delay_ms: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            documents: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            failed_inserts: AtomicU64::new(0),
            insert_delay_ms: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Snapshot of every stored document, in insert order.
    pub fn documents(&self) -> Vec<StoredMessage> {
        self.documents
            .lock()
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn failed_inserts(&self) -> u64 {
        self.failed_inserts.load(Ordering::SeqCst)
    }

    /// Block every following insert for `delay` before it lands.
    pub fn set_insert_delay(&self, delay: Duration) {
        self.insert_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Inserts currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Most inserts ever running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl MemoryStore {
    fn push(&self, msg: &StoredMessage) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            self.failed_inserts.fetch_add(1, Ordering::SeqCst);
            bail!("memory store unavailable");
        }

        let mut docs = self
            .documents
            .lock()
            .map_err(|e| anyhow::anyhow!("Memory store lock poisoned: {}", e))?;
        docs.push(msg.clone());
        Ok(())
    }
}

impl MessageStore for MemoryStore {
    fn insert(&self, msg: &StoredMessage) -> Result<()> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = self.insert_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }

        let result = self.push(msg);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
