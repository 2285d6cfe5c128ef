// Schedule Store - persistence interface for the board
// Every mutation runs inside one StoreTransaction; the *_tx methods never
// commit on their own, so dropping the transaction rolls the whole batch back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Sqlite, Transaction};
use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::core::{BoardColumnId, ScheduleId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::postgres_database::PostgresScheduleStore;
use crate::infrastructure::sqlite_database::SqliteScheduleStore;
use crate::models::{
    NewSchedule, NewScheduleLog, NewScheduleParticipant, Schedule, ScheduleFilter, ScheduleLog,
    ScheduleParticipant,
};
use crate::services::position_manager::PositionShift;

/// Transaction wrapper for store operations
pub enum StoreTransaction {
    Sqlite(Transaction<'static, Sqlite>),
    Postgres(Transaction<'static, Postgres>),
}

impl StoreTransaction {
    pub fn new_sqlite(tx: Transaction<'static, Sqlite>) -> Self {
        StoreTransaction::Sqlite(tx)
    }

    pub fn new_postgres(tx: Transaction<'static, Postgres>) -> Self {
        StoreTransaction::Postgres(tx)
    }

    pub fn as_sqlite_mut(&mut self) -> AppResult<&mut Transaction<'static, Sqlite>> {
        match self {
            StoreTransaction::Sqlite(tx) => Ok(tx),
            StoreTransaction::Postgres(_) => Err(AppError::Internal(
                "SQLite store handed a PostgreSQL transaction".to_string(),
            )),
        }
    }

    pub fn as_postgres_mut(&mut self) -> AppResult<&mut Transaction<'static, Postgres>> {
        match self {
            StoreTransaction::Postgres(tx) => Ok(tx),
            StoreTransaction::Sqlite(_) => Err(AppError::Internal(
                "PostgreSQL store handed a SQLite transaction".to_string(),
            )),
        }
    }

    /// Commit the transaction
    pub async fn commit(self) -> AppResult<()> {
        let result = match self {
            StoreTransaction::Sqlite(tx) => tx.commit().await,
            StoreTransaction::Postgres(tx) => tx.commit().await,
        };
        result.map_err(|e| AppError::from_sqlx("Failed to commit transaction", e))
    }

    /// Rollback the transaction
    pub async fn rollback(self) -> AppResult<()> {
        let result = match self {
            StoreTransaction::Sqlite(tx) => tx.rollback().await,
            StoreTransaction::Postgres(tx) => tx.rollback().await,
        };
        result.map_err(|e| AppError::from_sqlx("Failed to rollback transaction", e))
    }
}

/// Store interface for schedules, their logs and participants.
///
/// Guarded writes (`place`, `mark_deleted`, shifts, field updates) only touch
/// an active row still at the expected position; a miss means another writer
/// got there first and surfaces as `AppError::Conflict`.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Create tables and indexes if they do not exist
    async fn initialize(&self) -> AppResult<()>;
    async fn health_check(&self) -> AppResult<()>;
    async fn begin_transaction(&self) -> AppResult<StoreTransaction>;

    // Reads outside any transaction
    async fn get_schedule(&self, id: ScheduleId) -> AppResult<Option<Schedule>>;
    async fn find_schedules(&self, filter: &ScheduleFilter) -> AppResult<Vec<Schedule>>;
    async fn get_logs(&self, schedule_id: ScheduleId) -> AppResult<Vec<ScheduleLog>>;
    async fn get_participants(&self, schedule_id: ScheduleId)
        -> AppResult<Vec<ScheduleParticipant>>;

    /// Take the write lock for each column for the rest of the transaction.
    /// Callers pass columns in ascending order.
    async fn lock_columns_tx(
        &self,
        tx: &mut StoreTransaction,
        columns: &[BoardColumnId],
        at: DateTime<Utc>,
    ) -> AppResult<()>;
    async fn get_schedule_tx(
        &self,
        tx: &mut StoreTransaction,
        id: ScheduleId,
    ) -> AppResult<Option<Schedule>>;
    /// Active schedules of a column, ascending by position
    async fn active_in_column_tx(
        &self,
        tx: &mut StoreTransaction,
        column: BoardColumnId,
    ) -> AppResult<Vec<Schedule>>;
    async fn insert_schedule_tx(
        &self,
        tx: &mut StoreTransaction,
        new: NewSchedule,
    ) -> AppResult<Schedule>;
    /// Persist content fields and `updated_at`; never position, column or lifecycle
    async fn update_fields_tx(&self, tx: &mut StoreTransaction, schedule: &Schedule)
        -> AppResult<()>;
    async fn place_schedule_tx(
        &self,
        tx: &mut StoreTransaction,
        id: ScheduleId,
        expected_position: i64,
        column: BoardColumnId,
        position: i64,
        at: DateTime<Utc>,
    ) -> AppResult<()>;
    async fn mark_deleted_tx(
        &self,
        tx: &mut StoreTransaction,
        id: ScheduleId,
        at: DateTime<Utc>,
    ) -> AppResult<()>;
    async fn apply_shifts_tx(
        &self,
        tx: &mut StoreTransaction,
        shifts: &[PositionShift],
        at: DateTime<Utc>,
    ) -> AppResult<()>;
    async fn insert_participant_tx(
        &self,
        tx: &mut StoreTransaction,
        participant: &NewScheduleParticipant,
    ) -> AppResult<()>;
    async fn append_logs_tx(
        &self,
        tx: &mut StoreTransaction,
        logs: &[NewScheduleLog],
    ) -> AppResult<()>;
}

/// Guarded write helper: exactly one row must have matched.
pub(crate) fn expect_one_row(rows_affected: u64, what: impl FnOnce() -> String) -> AppResult<()> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(AppError::Conflict(what()))
    }
}

/// Open the store selected by the URL scheme and create its schema.
pub async fn connect_store(config: &DatabaseConfig) -> AppResult<Arc<dyn ScheduleStore>> {
    let store: Arc<dyn ScheduleStore> = if config.is_postgres() {
        Arc::new(PostgresScheduleStore::connect(config).await?)
    } else {
        Arc::new(SqliteScheduleStore::connect(config).await?)
    };
    store.initialize().await?;
    Ok(store)
}
