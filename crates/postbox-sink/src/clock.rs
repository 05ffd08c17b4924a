use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Assigns `received_at` stamps for one sink instance.
///
/// Each stamp is at least the wall clock at the time of the call and strictly
/// after both the sink's startup time and the previous stamp, so stamps never
/// go backwards even if the wall clock does.
pub struct ReceiptClock {
    started_at: DateTime<Utc>,
    last: Mutex<DateTime<Utc>>,
}

impl ReceiptClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            last: Mutex::new(started_at),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn stamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        // A poisoned lock still holds a valid timestamp
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = now.max(*last + Duration::microseconds(1));
        *last = next;
        next
    }
}

impl Default for ReceiptClock {
    fn default() -> Self {
        Self::new()
    }
}
