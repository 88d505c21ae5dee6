use std::path::Path;

use anyhow::{bail, Context};
use duckdb::Connection;

/// Open the analytical database. In-memory when no path is given; the file
/// connection is process-local and must not be shared across processes.
pub fn open(db_path: Option<&Path>) -> anyhow::Result<Connection> {
    match db_path {
        Some(path) => Connection::open(path)
            .with_context(|| format!("failed to open analytics database {}", path.display())),
        None => Connection::open_in_memory().context("failed to open in-memory database"),
    }
}

/// (Re)create the `events` table from the generated CSV and index the
/// columns the query catalogue groups on. Returns the loaded row count.
pub fn load_events(conn: &Connection, csv_path: &Path) -> anyhow::Result<i64> {
    if !csv_path.exists() {
        bail!(
            "event table not found: {} (run `geopulse generate` first)",
            csv_path.display()
        );
    }

    let path = csv_path.to_string_lossy().replace('\'', "''");
    conn.execute_batch(&format!(
        "CREATE OR REPLACE TABLE events AS SELECT * FROM read_csv_auto('{path}');
         CREATE INDEX IF NOT EXISTS idx_events_city ON events(city);
         CREATE INDEX IF NOT EXISTS idx_events_user ON events(user_id);
         CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
         CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);"
    ))
    .with_context(|| format!("failed to load events from {}", csv_path.display()))?;

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
        .context("failed to count loaded events")?;
    Ok(count)
}
