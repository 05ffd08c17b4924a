use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Sender name used when a submission carries no `username` field.
pub const ANONYMOUS_USERNAME: &str = "anonymous";

/// A message as submitted by a user and relayed over the wire.
///
/// Carries no timestamp: the sink is the only party allowed to assign one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    pub username: String,
    pub message: String,
}

impl Message {
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
        }
    }

    /// Finalize the message with its server-side receipt time.
    pub fn stamp(self, received_at: DateTime<Utc>) -> StoredMessage {
        StoredMessage {
            username: self.username,
            message: self.message,
            date: received_at,
        }
    }
}

/// The persisted document: `{ username, message, date }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub username: String,
    pub message: String,
    #[serde(serialize_with = "serialize_date", deserialize_with = "deserialize_date")]
    pub date: DateTime<Utc>,
}

impl StoredMessage {
    /// `date` rendered as RFC 3339 with microseconds, e.g. `2024-05-01T12:00:00.000123Z`.
    pub fn date_string(&self) -> String {
        format_date(&self.date)
    }
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn serialize_date<S: Serializer>(date: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_date(date))
}

fn deserialize_date<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}
