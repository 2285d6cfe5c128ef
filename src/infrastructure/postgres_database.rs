use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::QueryBuilder;
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

/// PostgreSQL implementation of the schedule store.
///
/// The column lock upsert holds a row lock on `board_column_locks` until the
/// transaction ends, so writers to the same column queue behind each other.
pub struct PostgresScheduleStore {
    pool: PgPool,
}

impl PostgresScheduleStore {
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to connect to PostgreSQL", e))?;

        info!(
            "PostgreSQL schedule store connected ({} max connections)",
            config.max_connections
        );
        Ok(Self { pool })
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
impl ScheduleStore for PostgresScheduleStore {
    async fn initialize(&self) -> AppResult<()> {
        self.execute_ddl(
            r#"
            CREATE TABLE IF NOT EXISTS schedules (
                id BIGSERIAL PRIMARY KEY,
                workspace_id BIGINT NOT NULL,
                board_column_id BIGINT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                start_time TIMESTAMPTZ,
                end_time TIMESTAMPTZ,
                location TEXT NOT NULL DEFAULT '',
                created_by BIGINT NOT NULL,
                status TEXT NOT NULL DEFAULT 'not yet',
                all_day BOOLEAN NOT NULL DEFAULT FALSE,
                visibility TEXT NOT NULL DEFAULT 'public',
                extra_data TEXT NOT NULL DEFAULT '',
                recurrence_pattern TEXT NOT NULL DEFAULT '',
                priority TEXT NOT NULL DEFAULT '',
                video_transcript TEXT NOT NULL DEFAULT '',
                position BIGINT NOT NULL CHECK (position >= 1),
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                deleted_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "schedules table",
        )
        .await?;

        self.execute_ddl(
            r#"
            CREATE TABLE IF NOT EXISTS schedule_logs (
                id BIGSERIAL PRIMARY KEY,
                schedule_id BIGINT NOT NULL REFERENCES schedules(id),
                actor_id BIGINT NOT NULL,
                action TEXT NOT NULL,
                field_changed TEXT NOT NULL DEFAULT '',
                old_value TEXT NOT NULL DEFAULT '',
                new_value TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "schedule_logs table",
        )
        .await?;

        self.execute_ddl(
            r#"
            CREATE TABLE IF NOT EXISTS schedule_participants (
                id BIGSERIAL PRIMARY KEY,
                schedule_id BIGINT NOT NULL REFERENCES schedules(id),
                actor_id BIGINT NOT NULL,
                status TEXT NOT NULL,
                invitation_status TEXT NOT NULL,
                assign_by BIGINT NOT NULL,
                assign_at TIMESTAMPTZ,
                response_time TIMESTAMPTZ,
                invitation_sent_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (schedule_id, actor_id)
            )
            "#,
            "schedule_participants table",
        )
        .await?;

        self.execute_ddl(
            r#"
            CREATE TABLE IF NOT EXISTS board_column_locks (
                board_column_id BIGINT PRIMARY KEY,
                locked_at TIMESTAMPTZ NOT NULL
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

        debug!("PostgreSQL schedule schema ready");
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
        Ok(StoreTransaction::new_postgres(tx))
    }

    async fn get_schedule(&self, id: ScheduleId) -> AppResult<Option<Schedule>> {
        let sql = format!("SELECT {} FROM schedules WHERE id = $1", SCHEDULE_COLUMNS);
        let row = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx(&format!("Failed to get schedule {}", id), e))?;
        Ok(row.map(Schedule::from))
    }

    async fn find_schedules(&self, filter: &ScheduleFilter) -> AppResult<Vec<Schedule>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM schedules WHERE TRUE",
            SCHEDULE_COLUMNS
        ));

        if !filter.workspace_ids.is_empty() {
            let ids: Vec<i64> = filter.workspace_ids.iter().map(|w| w.value()).collect();
            qb.push(" AND workspace_id = ANY(");
            qb.push_bind(ids);
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
             FROM schedule_logs WHERE schedule_id = $1 ORDER BY id ASC",
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
             FROM schedule_participants WHERE schedule_id = $1 ORDER BY id ASC",
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
        let pg_tx = tx.as_postgres_mut()?;
        for column in columns {
            sqlx::query(
                "INSERT INTO board_column_locks (board_column_id, locked_at) VALUES ($1, $2) \
                 ON CONFLICT (board_column_id) DO UPDATE SET locked_at = EXCLUDED.locked_at",
            )
            .bind(column.value())
            .bind(at)
            .execute(&mut **pg_tx)
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
        let pg_tx = tx.as_postgres_mut()?;
        let sql = format!("SELECT {} FROM schedules WHERE id = $1", SCHEDULE_COLUMNS);
        let row = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(id.value())
            .fetch_optional(&mut **pg_tx)
            .await
            .map_err(|e| AppError::from_sqlx(&format!("Failed to get schedule {}", id), e))?;
        Ok(row.map(Schedule::from))
    }

    async fn active_in_column_tx(
        &self,
        tx: &mut StoreTransaction,
        column: BoardColumnId,
    ) -> AppResult<Vec<Schedule>> {
        let pg_tx = tx.as_postgres_mut()?;
        let sql = format!(
            "SELECT {} FROM schedules WHERE board_column_id = $1 AND is_deleted = FALSE \
             ORDER BY position ASC",
            SCHEDULE_COLUMNS
        );
        let rows = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(column.value())
            .fetch_all(&mut **pg_tx)
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
        let pg_tx = tx.as_postgres_mut()?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO schedules (workspace_id, board_column_id, title, description, start_time, \
             end_time, location, created_by, status, all_day, visibility, extra_data, \
             recurrence_pattern, priority, video_transcript, position, is_deleted, created_at, \
             updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, '', $15, FALSE, $16, $16) \
             RETURNING id",
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
        .fetch_one(&mut **pg_tx)
        .await
        .map_err(|e| {
            AppError::from_sqlx(
                &format!("Failed to insert schedule into column {}", new.board_column_id),
                e,
            )
        })?;

        Ok(new.into_schedule(ScheduleId(id)))
    }

    async fn update_fields_tx(
        &self,
        tx: &mut StoreTransaction,
        schedule: &Schedule,
    ) -> AppResult<()> {
        let pg_tx = tx.as_postgres_mut()?;
        let result = sqlx::query(
            "UPDATE schedules SET title = $1, description = $2, start_time = $3, end_time = $4, \
             location = $5, status = $6, all_day = $7, visibility = $8, extra_data = $9, \
             recurrence_pattern = $10, priority = $11, video_transcript = $12, updated_at = $13 \
             WHERE id = $14 AND is_deleted = FALSE",
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
        .execute(&mut **pg_tx)
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
        let pg_tx = tx.as_postgres_mut()?;
        let result = sqlx::query(
            "UPDATE schedules SET board_column_id = $1, position = $2, updated_at = $3 \
             WHERE id = $4 AND position = $5 AND is_deleted = FALSE",
        )
        .bind(column.value())
        .bind(position)
        .bind(at)
        .bind(id.value())
        .bind(expected_position)
        .execute(&mut **pg_tx)
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
        let pg_tx = tx.as_postgres_mut()?;
        let result = sqlx::query(
            "UPDATE schedules SET is_deleted = TRUE, deleted_at = $1, updated_at = $1 \
             WHERE id = $2 AND is_deleted = FALSE",
        )
        .bind(at)
        .bind(id.value())
        .execute(&mut **pg_tx)
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
        let pg_tx = tx.as_postgres_mut()?;
        for shift in shifts {
            let result = sqlx::query(
                "UPDATE schedules SET position = $1, updated_at = $2 \
                 WHERE id = $3 AND position = $4 AND is_deleted = FALSE",
            )
            .bind(shift.to)
            .bind(at)
            .bind(shift.schedule_id.value())
            .bind(shift.from)
            .execute(&mut **pg_tx)
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
        let pg_tx = tx.as_postgres_mut()?;
        sqlx::query(
            "INSERT INTO schedule_participants (schedule_id, actor_id, status, invitation_status, \
             assign_by, assign_at, response_time, invitation_sent_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6, $6, $6, $6)",
        )
        .bind(participant.schedule_id.value())
        .bind(participant.actor_id.value())
        .bind(&participant.status)
        .bind(&participant.invitation_status)
        .bind(participant.assign_by.value())
        .bind(participant.at)
        .execute(&mut **pg_tx)
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
        let pg_tx = tx.as_postgres_mut()?;
        for log in logs {
            sqlx::query(
                "INSERT INTO schedule_logs (schedule_id, actor_id, action, field_changed, \
                 old_value, new_value, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(log.schedule_id.value())
            .bind(log.actor_id.value())
            .bind(log.action.as_str())
            .bind(&log.field_changed)
            .bind(&log.old_value)
            .bind(&log.new_value)
            .bind(log.created_at)
            .execute(&mut **pg_tx)
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
