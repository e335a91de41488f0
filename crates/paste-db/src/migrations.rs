use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

/// Timestamps are INTEGER milliseconds since the Unix epoch so the
/// visibility predicate compares numbers, not strings.
pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Paste DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE pastes (
                id              TEXT PRIMARY KEY,
                content         TEXT NOT NULL,
                expires_at      INTEGER,
                max_views       INTEGER CHECK (max_views IS NULL OR max_views >= 1),
                remaining_views INTEGER CHECK (
                    (max_views IS NULL AND remaining_views IS NULL)
                    OR (max_views IS NOT NULL
                        AND remaining_views IS NOT NULL
                        AND remaining_views BETWEEN 0 AND max_views)
                ),
                created_at      INTEGER NOT NULL
            );

            CREATE INDEX idx_pastes_expires_at
                ON pastes(expires_at) WHERE expires_at IS NOT NULL;

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    Ok(())
}
