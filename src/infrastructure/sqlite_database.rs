use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    Sqlite, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::QueryBuilder;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::core::{BoardColumnId, ScheduleId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{expect_one_row, ScheduleStore, StoreTransaction};
use crate::models::{
    NewSchedule, NewScheduleLog, NewScheduleParticipant, Schedule, ScheduleFilter, ScheduleLog,
    ScheduleLogRow, ScheduleParticipant, ScheduleParticipantRow, ScheduleRow, DONE_STATUS,
    SCHEDULE_COLUMNS,
};
use crate::services::position_manager::PositionShift;

/// SQLite implementation of the schedule store.
///
/// Runs in WAL mode. Every mutation starts by upserting its column lock rows,
/// which takes SQLite's single write lock up front; a transaction that loses a
/// race on a stale snapshot fails with SQLITE_BUSY and surfaces as Conflict.
pub struct SqliteScheduleStore {
    pool: SqlitePool,
}

impl SqliteScheduleStore {
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| {
                AppError::Configuration(format!("Invalid SQLite URL {}: {}", config.url, e))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to connect to SQLite", e))?;

        info!(
            "SQLite schedule store connected ({} max connections)",
            config.max_connections
        );
        Ok(Self { pool })
    }

    /// Single-connection in-memory store; every connection to `:memory:` is
    /// its own database, so the pool must never open a second one.
    pub async fn new_in_memory() -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| AppError::from_sqlx("Failed to connect to in-memory SQLite", e))?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn execute_ddl(&self, sql: &str, what: &str) -> AppResult<()> {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx(&format!("Failed to create {}", what), e))?;
        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for SqliteScheduleStore {
    async fn initialize(&self) -> AppResult<()> {
        self.execute_ddl(
            r#"
            CREATE TABLE IF NOT EXISTS schedules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace_id INTEGER NOT NULL,
                board_column_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                start_time DATETIME,
                end_time DATETIME,
                location TEXT NOT NULL DEFAULT '',
                created_by INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'not yet',
                all_day BOOLEAN NOT NULL DEFAULT FALSE,
                visibility TEXT NOT NULL DEFAULT 'public',
                extra_data TEXT NOT NULL DEFAULT '',
                recurrence_pattern TEXT NOT NULL DEFAULT '',
                priority TEXT NOT NULL DEFAULT '',
                video_transcript TEXT NOT NULL DEFAULT '',
                position INTEGER NOT NULL CHECK (position >= 1),
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                deleted_at DATETIME,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
            "schedules table",
        )
        .await?;

        self.execute_ddl(
            r#"
            CREATE TABLE IF NOT EXISTS schedule_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                schedule_id INTEGER NOT NULL REFERENCES schedules(id),
                actor_id INTEGER NOT NULL,
                action TEXT NOT NULL,
                field_changed TEXT NOT NULL DEFAULT '',
                old_value TEXT NOT NULL DEFAULT '',
                new_value TEXT NOT NULL DEFAULT '',
                created_at DATETIME NOT NULL
            )
            "#,
            "schedule_logs table",
        )
        .await?;

        self.execute_ddl(
            r#"
            CREATE TABLE IF NOT EXISTS schedule_participants (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                schedule_id INTEGER NOT NULL REFERENCES schedules(id),
                actor_id INTEGER NOT NULL,
                status TEXT NOT NULL,
                invitation_status TEXT NOT NULL,
                assign_by INTEGER NOT NULL,
                assign_at DATETIME,
                response_time DATETIME,
                invitation_sent_at DATETIME,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                UNIQUE (schedule_id, actor_id)
            )
            "#,
            "schedule_participants table",
        )
        .await?;

        self.execute_ddl(
            r#"
            CREATE TABLE IF NOT EXISTS board_column_locks (
                board_column_id INTEGER PRIMARY KEY,
                locked_at DATETIME NOT NULL
            )
            "#,
            "board_column_locks table",
        )
        .await?;

        self.execute_ddl(
            "CREATE INDEX IF NOT EXISTS idx_schedules_column_position ON schedules(board_column_id, is_deleted, position)",
            "schedules column index",
        )
        .await?;
        self.execute_ddl(
            "CREATE INDEX IF NOT EXISTS idx_schedules_workspace ON schedules(workspace_id)",
            "schedules workspace index",
        )
        .await?;
        self.execute_ddl(
            "CREATE INDEX IF NOT EXISTS idx_schedule_logs_schedule ON schedule_logs(schedule_id, id)",
            "schedule_logs index",
        )
        .await?;

        debug!("SQLite schedule schema ready");
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Database health check failed", e))?;
        Ok(())
    }

    async fn begin_transaction(&self) -> AppResult<StoreTransaction> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::from_sqlx("Failed to begin transaction", e))?;
        Ok(StoreTransaction::new_sqlite(tx))
    }

    async fn get_schedule(&self, id: ScheduleId) -> AppResult<Option<Schedule>> {
        let sql = format!("SELECT {} FROM schedules WHERE id = ?", SCHEDULE_COLUMNS);
        let row = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx(&format!("Failed to get schedule {}", id), e))?;
        Ok(row.map(Schedule::from))
    }

    async fn find_schedules(&self, filter: &ScheduleFilter) -> AppResult<Vec<Schedule>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM schedules WHERE 1 = 1",
            SCHEDULE_COLUMNS
        ));

        if !filter.workspace_ids.is_empty() {
            qb.push(" AND workspace_id IN (");
            let mut separated = qb.separated(", ");
            for workspace_id in &filter.workspace_ids {
                separated.push_bind(workspace_id.value());
            }
            qb.push(")");
        }
        if let Some(column) = filter.board_column_id {
            qb.push(" AND board_column_id = ");
            qb.push_bind(column.value());
        }
        if let Some(start_after) = filter.start_after {
            qb.push(" AND start_time >= ");
            qb.push_bind(start_after);
        }
        if let Some(end_before) = filter.end_before {
            qb.push(" AND end_time <= ");
            qb.push_bind(end_before);
        }
        if let Some(created_by) = filter.created_by {
            qb.push(" AND created_by = ");
            qb.push_bind(created_by.value());
        }
        if let Some(status) = &filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status.clone());
        }
        if let Some(is_deleted) = filter.is_deleted {
            qb.push(" AND is_deleted = ");
            qb.push_bind(is_deleted);
        }
        if let Some((from, until)) = filter.due_between {
            qb.push(" AND start_time >= ");
            qb.push_bind(from);
            qb.push(" AND start_time < ");
            qb.push_bind(until);
        }
        if filter.due_complete {
            qb.push(" AND status = ");
            qb.push_bind(DONE_STATUS);
        }
        if let Some(before) = filter.overdue_before {
            qb.push(" AND start_time < ");
            qb.push_bind(before);
            qb.push(" AND status <> ");
            qb.push_bind(DONE_STATUS);
        }
        if filter.not_due {
            qb.push(" AND start_time IS NULL");
        }

        if filter.order_by_position {
            qb.push(" ORDER BY position ASC, id ASC");
        } else {
            qb.push(" ORDER BY id ASC");
        }

        let rows = qb
            .build_query_as::<ScheduleRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to find schedules", e))?;
        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    async fn get_logs(&self, schedule_id: ScheduleId) -> AppResult<Vec<ScheduleLog>> {
        let rows = sqlx::query_as::<_, ScheduleLogRow>(
            "SELECT id, schedule_id, actor_id, action, field_changed, old_value, new_value, created_at \
             FROM schedule_logs WHERE schedule_id = ? ORDER BY id ASC",
        )
        .bind(schedule_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::from_sqlx(&format!("Failed to get logs for schedule {}", schedule_id), e)
        })?;
        Ok(rows.into_iter().map(ScheduleLog::from).collect())
    }

    async fn get_participants(
        &self,
        schedule_id: ScheduleId,
    ) -> AppResult<Vec<ScheduleParticipant>> {
        let rows = sqlx::query_as::<_, ScheduleParticipantRow>(
            "SELECT id, schedule_id, actor_id, status, invitation_status, assign_by, assign_at, \
             response_time, invitation_sent_at, created_at, updated_at \
             FROM schedule_participants WHERE schedule_id = ? ORDER BY id ASC",
        )
        .bind(schedule_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::from_sqlx(
                &format!("Failed to get participants for schedule {}", schedule_id),
                e,
            )
        })?;
        Ok(rows.into_iter().map(ScheduleParticipant::from).collect())
    }

    async fn lock_columns_tx(
        &self,
        tx: &mut StoreTransaction,
        columns: &[BoardColumnId],
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let sqlite_tx = tx.as_sqlite_mut()?;
        for column in columns {
            sqlx::query(
                "INSERT INTO board_column_locks (board_column_id, locked_at) VALUES (?, ?) \
                 ON CONFLICT (board_column_id) DO UPDATE SET locked_at = excluded.locked_at",
            )
            .bind(column.value())
            .bind(at)
            .execute(&mut **sqlite_tx)
            .await
            .map_err(|e| AppError::from_sqlx(&format!("Failed to lock column {}", column), e))?;
        }
        Ok(())
    }

    async fn get_schedule_tx(
        &self,
        tx: &mut StoreTransaction,
        id: ScheduleId,
    ) -> AppResult<Option<Schedule>> {
        let sqlite_tx = tx.as_sqlite_mut()?;
        let sql = format!("SELECT {} FROM schedules WHERE id = ?", SCHEDULE_COLUMNS);
        let row = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(id.value())
            .fetch_optional(&mut **sqlite_tx)
            .await
            .map_err(|e| AppError::from_sqlx(&format!("Failed to get schedule {}", id), e))?;
        Ok(row.map(Schedule::from))
    }

    async fn active_in_column_tx(
        &self,
        tx: &mut StoreTransaction,
        column: BoardColumnId,
    ) -> AppResult<Vec<Schedule>> {
        let sqlite_tx = tx.as_sqlite_mut()?;
        let sql = format!(
            "SELECT {} FROM schedules WHERE board_column_id = ? AND is_deleted = FALSE \
             ORDER BY position ASC",
            SCHEDULE_COLUMNS
        );
        let rows = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(column.value())
            .fetch_all(&mut **sqlite_tx)
            .await
            .map_err(|e| {
                AppError::from_sqlx(&format!("Failed to read column {}", column), e)
            })?;
        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    async fn insert_schedule_tx(
        &self,
        tx: &mut StoreTransaction,
        new: NewSchedule,
    ) -> AppResult<Schedule> {
        let sqlite_tx = tx.as_sqlite_mut()?;
        let result = sqlx::query(
            "INSERT INTO schedules (workspace_id, board_column_id, title, description, start_time, \
             end_time, location, created_by, status, all_day, visibility, extra_data, \
             recurrence_pattern, priority, video_transcript, position, is_deleted, created_at, \
             updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '', ?, FALSE, ?, ?)",
        )
        .bind(new.workspace_id.value())
        .bind(new.board_column_id.value())
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(&new.location)
        .bind(new.created_by.value())
        .bind(&new.status)
        .bind(new.all_day)
        .bind(&new.visibility)
        .bind(&new.extra_data)
        .bind(&new.recurrence_pattern)
        .bind(&new.priority)
        .bind(new.position)
        .bind(new.created_at)
        .bind(new.created_at)
        .execute(&mut **sqlite_tx)
        .await
        .map_err(|e| {
            AppError::from_sqlx(
                &format!("Failed to insert schedule into column {}", new.board_column_id),
                e,
            )
        })?;

        Ok(new.into_schedule(ScheduleId(result.last_insert_rowid())))
    }

    async fn update_fields_tx(
        &self,
        tx: &mut StoreTransaction,
        schedule: &Schedule,
    ) -> AppResult<()> {
        let sqlite_tx = tx.as_sqlite_mut()?;
        let result = sqlx::query(
            "UPDATE schedules SET title = ?, description = ?, start_time = ?, end_time = ?, \
             location = ?, status = ?, all_day = ?, visibility = ?, extra_data = ?, \
             recurrence_pattern = ?, priority = ?, video_transcript = ?, updated_at = ? \
             WHERE id = ? AND is_deleted = FALSE",
        )
        .bind(&schedule.title)
        .bind(&schedule.description)
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .bind(&schedule.location)
        .bind(&schedule.status)
        .bind(schedule.all_day)
        .bind(&schedule.visibility)
        .bind(&schedule.extra_data)
        .bind(&schedule.recurrence_pattern)
        .bind(&schedule.priority)
        .bind(&schedule.video_transcript)
        .bind(schedule.updated_at)
        .bind(schedule.id.value())
        .execute(&mut **sqlite_tx)
        .await
        .map_err(|e| {
            AppError::from_sqlx(&format!("Failed to update schedule {}", schedule.id), e)
        })?;

        expect_one_row(result.rows_affected(), || {
            format!("schedule {} was deleted concurrently", schedule.id)
        })
    }

    async fn place_schedule_tx(
        &self,
        tx: &mut StoreTransaction,
        id: ScheduleId,
        expected_position: i64,
        column: BoardColumnId,
        position: i64,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let sqlite_tx = tx.as_sqlite_mut()?;
        let result = sqlx::query(
            "UPDATE schedules SET board_column_id = ?, position = ?, updated_at = ? \
             WHERE id = ? AND position = ? AND is_deleted = FALSE",
        )
        .bind(column.value())
        .bind(position)
        .bind(at)
        .bind(id.value())
        .bind(expected_position)
        .execute(&mut **sqlite_tx)
        .await
        .map_err(|e| AppError::from_sqlx(&format!("Failed to place schedule {}", id), e))?;

        expect_one_row(result.rows_affected(), || {
            format!("schedule {} moved concurrently", id)
        })
    }

    async fn mark_deleted_tx(
        &self,
        tx: &mut StoreTransaction,
        id: ScheduleId,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let sqlite_tx = tx.as_sqlite_mut()?;
        let result = sqlx::query(
            "UPDATE schedules SET is_deleted = TRUE, deleted_at = ?, updated_at = ? \
             WHERE id = ? AND is_deleted = FALSE",
        )
        .bind(at)
        .bind(at)
        .bind(id.value())
        .execute(&mut **sqlite_tx)
        .await
        .map_err(|e| AppError::from_sqlx(&format!("Failed to delete schedule {}", id), e))?;

        expect_one_row(result.rows_affected(), || {
            format!("schedule {} was deleted concurrently", id)
        })
    }

    async fn apply_shifts_tx(
        &self,
        tx: &mut StoreTransaction,
        shifts: &[PositionShift],
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let sqlite_tx = tx.as_sqlite_mut()?;
        for shift in shifts {
            let result = sqlx::query(
                "UPDATE schedules SET position = ?, updated_at = ? \
                 WHERE id = ? AND position = ? AND is_deleted = FALSE",
            )
            .bind(shift.to)
            .bind(at)
            .bind(shift.schedule_id.value())
            .bind(shift.from)
            .execute(&mut **sqlite_tx)
            .await
            .map_err(|e| {
                AppError::from_sqlx(
                    &format!("Failed to shift schedule {}", shift.schedule_id),
                    e,
                )
            })?;

            expect_one_row(result.rows_affected(), || {
                format!(
                    "schedule {} left position {} concurrently",
                    shift.schedule_id, shift.from
                )
            })?;
        }
        Ok(())
    }

    async fn insert_participant_tx(
        &self,
        tx: &mut StoreTransaction,
        participant: &NewScheduleParticipant,
    ) -> AppResult<()> {
        let sqlite_tx = tx.as_sqlite_mut()?;
        sqlx::query(
            "INSERT INTO schedule_participants (schedule_id, actor_id, status, invitation_status, \
             assign_by, assign_at, response_time, invitation_sent_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(participant.schedule_id.value())
        .bind(participant.actor_id.value())
        .bind(&participant.status)
        .bind(&participant.invitation_status)
        .bind(participant.assign_by.value())
        .bind(participant.at)
        .bind(participant.at)
        .bind(participant.at)
        .bind(participant.at)
        .bind(participant.at)
        .execute(&mut **sqlite_tx)
        .await
        .map_err(|e| {
            AppError::from_sqlx(
                &format!(
                    "Failed to add participant to schedule {}",
                    participant.schedule_id
                ),
                e,
            )
        })?;
        Ok(())
    }

    async fn append_logs_tx(
        &self,
        tx: &mut StoreTransaction,
        logs: &[NewScheduleLog],
    ) -> AppResult<()> {
        let sqlite_tx = tx.as_sqlite_mut()?;
        for log in logs {
            sqlx::query(
                "INSERT INTO schedule_logs (schedule_id, actor_id, action, field_changed, \
                 old_value, new_value, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(log.schedule_id.value())
            .bind(log.actor_id.value())
            .bind(log.action.as_str())
            .bind(&log.field_changed)
            .bind(&log.old_value)
            .bind(&log.new_value)
            .bind(log.created_at)
            .execute(&mut **sqlite_tx)
            .await
            .map_err(|e| {
                AppError::from_sqlx(
                    &format!("Failed to append log for schedule {}", log.schedule_id),
                    e,
                )
            })?;
        }
        Ok(())
    }
}
