use crate::Database;
use crate::models::MessageRow;
use anyhow::Result;
use postbox_types::StoredMessage;
use rusqlite::Connection;

impl Database {
    // -- Messages --

    pub fn insert_message(&self, id: &str, msg: &StoredMessage) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, username, message, date) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, msg.username, msg.message, msg.date_string()],
            )?;
            Ok(())
        })
    }

    /// Oldest first, at most `limit` rows.
    pub fn list_messages(&self, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, limit))
    }

    pub fn count_messages(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }
}

fn query_messages(conn: &Connection, limit: u32) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, message, date
         FROM messages
         ORDER BY date ASC, rowid ASC
         LIMIT ?1",
    )?;

    let rows = stmt
        .query_map([limit], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                username: row.get(1)?,
                message: row.get(2)?,
                date: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
