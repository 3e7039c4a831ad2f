//! Session-level foreign-key enforcement toggle
//!
//! PostgreSQL enforces foreign keys through internal triggers, which are
//! skipped while `session_replication_role` is `replica`. Changing it needs
//! superuser (or an explicit grant); without the privilege the toggle is a
//! no-op and the caller relies on statement order alone.

use futures::future::BoxFuture;
use sqlx::PgConnection;
use tracing::{debug, warn};

use super::{DbError, DbResult};

const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Foreign-key checks disabled on one session
///
/// Must be handed back through [`ForeignKeyChecks::restore`]; dropping it
/// without restoring leaves the session with checks off and is logged.
#[must_use = "foreign-key checks stay disabled until `restore` is awaited"]
#[derive(Debug)]
pub struct ForeignKeyChecks {
    previous: Option<String>,
    released: bool,
}

impl ForeignKeyChecks {
    /// Turn foreign-key enforcement off for the session behind `conn`
    pub async fn disable(conn: &mut PgConnection) -> DbResult<Self> {
        let previous: String = sqlx::query_scalar("SHOW session_replication_role")
            .fetch_one(&mut *conn)
            .await?;

        match sqlx::query("SET session_replication_role = replica")
            .execute(&mut *conn)
            .await
        {
            Ok(_) => {
                debug!(previous = %previous, "Foreign key checks disabled");
                Ok(Self {
                    previous: Some(previous),
                    released: false,
                })
            },
            Err(e) => {
                let err = DbError::from(e);
                if err.sqlstate().as_deref() == Some(INSUFFICIENT_PRIVILEGE) {
                    warn!("Not allowed to disable foreign key checks, continuing with them enabled");
                    Ok(Self {
                        previous: None,
                        released: false,
                    })
                } else {
                    Err(err)
                }
            },
        }
    }

    /// Whether the toggle actually changed the session
    pub fn is_active(&self) -> bool {
        self.previous.is_some()
    }

    /// Put the session back the way [`disable`](Self::disable) found it
    pub async fn restore(mut self, conn: &mut PgConnection) -> DbResult<()> {
        self.released = true;
        let Some(previous) = self.previous.take() else {
            return Ok(());
        };

        // SET does not take bind parameters; the value came from SHOW.
        let statement = format!(
            "SET session_replication_role = {}",
            quote_literal(&previous)
        );
        sqlx::query(&statement).execute(&mut *conn).await?;
        debug!(restored = %previous, "Foreign key checks restored");
        Ok(())
    }
}

impl Drop for ForeignKeyChecks {
    fn drop(&mut self) {
        if !self.released && self.previous.is_some() {
            warn!("Foreign key checks were never restored on this session");
        }
    }
}

/// Run `body` with foreign-key checks disabled, restoring them on every exit path
///
/// An error from `body` wins over an error from the restore; the latter is
/// logged so it is not lost.
pub async fn with_foreign_key_checks_disabled<T, F>(conn: &mut PgConnection, body: F) -> DbResult<T>
where
    F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, DbResult<T>>,
{
    let checks = ForeignKeyChecks::disable(conn).await?;
    let result = body(&mut *conn).await;
    let restored = checks.restore(conn).await;

    match (result, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(restore_err)) => Err(restore_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(restore_err)) => {
            warn!(error = %restore_err, "Failed to restore foreign key checks after error");
            Err(err)
        },
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
