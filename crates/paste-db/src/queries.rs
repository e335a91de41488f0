use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use paste_types::models::{ConsumedPaste, NewPaste};

use crate::{Database, PasteStore, StoreError};

// Same predicate as `paste_types::lifecycle::is_visible`, evaluated by SQLite
// under its write lock. `NULL - 1` stays NULL, so unlimited pastes are
// untouched.
const CONSUME_SQL: &str = "
    UPDATE pastes
    SET remaining_views = remaining_views - 1
    WHERE id = ?1
      AND (expires_at IS NULL OR expires_at > ?2)
      AND (remaining_views IS NULL OR remaining_views > 0)
    RETURNING content, remaining_views, expires_at";

const PURGE_SQL: &str = "
    DELETE FROM pastes
    WHERE (expires_at IS NOT NULL AND expires_at <= ?1)
       OR (remaining_views IS NOT NULL AND remaining_views <= 0)";

impl PasteStore for Database {
    fn create(&self, paste: &NewPaste) -> Result<(), StoreError> {
        let max_views = paste.max_views.map(i64::from);

        self.with_conn(|conn| {
            let inserted = conn
                .prepare_cached(
                    "INSERT INTO pastes (id, content, expires_at, max_views, remaining_views, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?4, ?5)",
                )?
                .execute(params![
                    &paste.id,
                    &paste.content,
                    paste.expires_at.map(|at| at.timestamp_millis()),
                    max_views,
                    paste.created_at.timestamp_millis(),
                ]);

            match inserted {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
                {
                    Err(StoreError::DuplicateId)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn consume(&self, id: &str, now: DateTime<Utc>) -> Result<Option<ConsumedPaste>, StoreError> {
        let row = self.with_conn(|conn| {
            let row = conn
                .prepare_cached(CONSUME_SQL)?
                .query_row(params![id, now.timestamp_millis()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                })
                .optional()?;
            Ok(row)
        })?;

        let Some((content, remaining_views, expires_at)) = row else {
            return Ok(None);
        };

        Ok(Some(ConsumedPaste {
            content,
            remaining_views: remaining_views
                .map(|n| {
                    u32::try_from(n)
                        .map_err(|_| StoreError::CorruptRow(format!("remaining_views {n} for {id}")))
                })
                .transpose()?,
            expires_at: expires_at.map(|ms| from_millis(ms, id)).transpose()?,
        }))
    }

    fn health_check(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    fn purge_inert(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let removed = conn
                .prepare_cached(PURGE_SQL)?
                .execute([now.timestamp_millis()])?;
            Ok(removed)
        })
    }
}

fn from_millis(ms: i64, id: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::CorruptRow(format!("expires_at {ms} for {id}")))
}
