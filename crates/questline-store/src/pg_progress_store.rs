//! `PostgreSQL` implementation of the `ProgressStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, error, warn};
use uuid::Uuid;

use questline_core::error::DomainError;
use questline_core::progress::ProgressCode;
use questline_core::repository::{
    HistoryEntry, NewHistoryEntry, ProgressStore, ProgressUnit, UserIdentity, UserRecord,
};

const SELECT_USER: &str =
    "SELECT id, identity, progress_code, created_at FROM users WHERE identity = $1";

/// PostgreSQL-backed progress store.
#[derive(Debug, Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    /// Creates a new `PgProgressStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Persistence` if a migration fails.
    pub async fn migrate(&self) -> Result<(), DomainError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!(target: "questline::db", error = %e, "migration failed");
                DomainError::Persistence(format!("migration failed: {e}"))
            })
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn begin(&self) -> Result<Box<dyn ProgressUnit>, DomainError> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgUnit { tx }))
    }

    async fn find_user(&self, identity: &UserIdentity) -> Result<Option<UserRecord>, DomainError> {
        let row = sqlx::query(SELECT_USER)
            .bind(identity.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn load_history(&self, identity: &UserIdentity) -> Result<Vec<HistoryEntry>, DomainError> {
        let rows = sqlx::query(
            "SELECT h.id, h.user_id, h.channel_id, h.message_id, h.content, h.state_label, \
                    h.created_at \
             FROM history h JOIN users u ON u.id = h.user_id \
             WHERE u.identity = $1 \
             ORDER BY h.created_at, h.id",
        )
        .bind(identity.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(history_from_row).collect()
    }

    async fn delete_user(&self, identity: &UserIdentity) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM users WHERE identity = $1")
            .bind(identity.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!(target: "questline::db", %identity, rows = result.rows_affected(), "deleted user");
        Ok(result.rows_affected() > 0)
    }
}

/// A unit of work backed by one database transaction. Dropping it without
/// calling `commit` rolls the transaction back.
struct PgUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ProgressUnit for PgUnit {
    async fn get_or_create(
        &mut self,
        identity: &UserIdentity,
        now: DateTime<Utc>,
    ) -> Result<UserRecord, DomainError> {
        let inserted = sqlx::query(
            "INSERT INTO users (id, identity, progress_code, created_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (identity) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(identity.as_str())
        .bind(ProgressCode::Default.as_str())
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        if inserted.rows_affected() > 0 {
            debug!(target: "questline::db", %identity, "created user");
        }

        let row = sqlx::query(SELECT_USER)
            .bind(identity.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| DomainError::NotFound(identity.to_string()))?;
        user_from_row(&row)
    }

    async fn set_progress(
        &mut self,
        identity: &UserIdentity,
        code: ProgressCode,
    ) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE users SET progress_code = $2 WHERE identity = $1")
            .bind(identity.as_str())
            .bind(code.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(identity.to_string()));
        }
        Ok(())
    }

    async fn append_history(&mut self, entry: NewHistoryEntry) -> Result<(), DomainError> {
        let result = sqlx::query(
            "INSERT INTO history \
                 (id, user_id, channel_id, message_id, content, state_label, created_at) \
             SELECT $1, id, $3, $4, $5, $6, $7 FROM users WHERE identity = $2",
        )
        .bind(Uuid::now_v7())
        .bind(entry.identity.as_str())
        .bind(entry.channel_id)
        .bind(entry.message_id)
        .bind(&entry.content)
        .bind(&entry.state_label)
        .bind(entry.recorded_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(entry.identity.to_string()));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, DomainError> {
    let identity: String = row.try_get("identity").map_err(map_sqlx_error)?;
    let raw_code: String = row.try_get("progress_code").map_err(map_sqlx_error)?;
    let progress_code = raw_code.parse::<ProgressCode>().unwrap_or_else(|e| {
        warn!(
            target: "questline::db",
            %identity,
            error = %e,
            "unknown stored progress code; treating as default"
        );
        ProgressCode::Default
    });
    Ok(UserRecord {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        identity: UserIdentity::parse(identity)?,
        progress_code,
        created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
    })
}

fn history_from_row(row: &PgRow) -> Result<HistoryEntry, DomainError> {
    Ok(HistoryEntry {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        user_id: row.try_get("user_id").map_err(map_sqlx_error)?,
        channel_id: row.try_get("channel_id").map_err(map_sqlx_error)?,
        message_id: row.try_get("message_id").map_err(map_sqlx_error)?,
        content: row.try_get("content").map_err(map_sqlx_error)?,
        state_label: row.try_get("state_label").map_err(map_sqlx_error)?,
        created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
    })
}

/// Maps a sqlx error onto the domain taxonomy and logs it.
pub(crate) fn map_sqlx_error(e: sqlx::Error) -> DomainError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            error!(target: "questline::db", severity = "critical", error = %e, "database unreachable");
            DomainError::Connection(e.to_string())
        }
        sqlx::Error::RowNotFound => DomainError::NotFound(e.to_string()),
        other => {
            error!(target: "questline::db", error = %other, "database operation failed");
            DomainError::Persistence(other.to_string())
        }
    }
}
