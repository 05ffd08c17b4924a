use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Database: running migration v1 (messages)");
        conn.execute_batch(
            "
            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL,
                message     TEXT NOT NULL,
                date        TEXT NOT NULL
            );

            CREATE INDEX idx_messages_date ON messages(date);

            INSERT INTO schema_version (version) VALUES (1);
            "
        )?;
    }

    Ok(())
}
