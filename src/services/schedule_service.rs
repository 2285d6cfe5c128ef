// ScheduleService - board operations over the schedule store
// Each mutation: column lock(s) -> one store transaction -> plan -> guarded writes
// -> audit rows -> commit. Any error before commit drops the transaction.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::{ActorId, BoardColumnId, ScheduleId, WorkspaceId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::{ColumnLocks, ScheduleStore, StoreTransaction};
use crate::models::{
    DueCriteria, Lifecycle, LogAction, NewSchedule, NewScheduleLog, NewScheduleParticipant,
    Schedule, ScheduleFields, ScheduleFilter, ScheduleLog, ScheduleParticipant, SchedulePatch,
};
use crate::services::change_log::ChangeLogRecorder;
use crate::services::position_manager::PositionManager;

#[derive(Clone)]
pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
    locks: Arc<ColumnLocks>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self {
            store,
            locks: Arc::new(ColumnLocks::new()),
        }
    }

    pub async fn health_check(&self) -> AppResult<()> {
        self.store.health_check().await
    }

    /// Append a new schedule at the end of `column`.
    pub async fn create(
        &self,
        column: BoardColumnId,
        workspace: WorkspaceId,
        actor: ActorId,
        fields: ScheduleFields,
    ) -> AppResult<Schedule> {
        if !column.is_valid() {
            return Err(AppError::InvalidArgument(format!(
                "invalid board column id {}",
                column
            )));
        }
        if fields.title.is_none() {
            return Err(AppError::InvalidArgument("title is required".to_string()));
        }

        let now = Utc::now();
        let _guard = self.locks.lock(&[column]).await;
        let mut tx = self.store.begin_transaction().await?;
        self.store.lock_columns_tx(&mut tx, &[column], now).await?;

        let rows = self.store.active_in_column_tx(&mut tx, column).await?;
        let plan = PositionManager::insert(column, &rows);
        let new = NewSchedule::from_fields(column, workspace, actor, fields, plan.position, now)?;

        let schedule = self.store.insert_schedule_tx(&mut tx, new).await?;
        self.store
            .insert_participant_tx(
                &mut tx,
                &NewScheduleParticipant::creator(schedule.id, actor, now),
            )
            .await?;
        self.store
            .append_logs_tx(
                &mut tx,
                &[NewScheduleLog::marker(schedule.id, actor, LogAction::Create, now)],
            )
            .await?;
        tx.commit().await?;

        info!(
            "Created schedule {} in column {} at position {}",
            schedule.id, column, schedule.position
        );
        Ok(schedule)
    }

    /// Apply a partial update. Position and column are never touched here.
    pub async fn update(
        &self,
        id: ScheduleId,
        actor: ActorId,
        patch: SchedulePatch,
    ) -> AppResult<Schedule> {
        if patch.is_empty() {
            return Err(AppError::InvalidArgument(format!(
                "empty update for schedule {}",
                id
            )));
        }

        let current = self.active_schedule(id).await?;
        // Reject malformed input before taking any lock
        patch.apply_to(&current)?;

        let now = Utc::now();
        let column = current.board_column_id;
        let _guard = self.locks.lock(&[column]).await;
        let mut tx = self.store.begin_transaction().await?;
        self.store.lock_columns_tx(&mut tx, &[column], now).await?;
        let fresh = self.reload_active(&mut tx, &current).await?;

        let mut next = patch.apply_to(&fresh)?;
        let logs = ChangeLogRecorder::diff(&fresh, &next, LogAction::Update, actor, now);
        if logs.is_empty() {
            tx.rollback().await?;
            debug!("Update of schedule {} changed nothing", id);
            return Ok(fresh);
        }

        next.updated_at = now;
        self.store.update_fields_tx(&mut tx, &next).await?;
        self.store.append_logs_tx(&mut tx, &logs).await?;
        tx.commit().await?;

        info!("Updated schedule {} ({} fields changed)", id, logs.len());
        Ok(next)
    }

    /// Move within the schedule's column, or into `target_column` when it differs.
    pub async fn move_schedule(
        &self,
        id: ScheduleId,
        actor: ActorId,
        target_column: Option<BoardColumnId>,
        position: i64,
    ) -> AppResult<Schedule> {
        let current = self.active_schedule(id).await?;
        let source = current.board_column_id;
        let target = target_column.unwrap_or(source);
        if !target.is_valid() {
            return Err(AppError::InvalidArgument(format!(
                "invalid board column id {}",
                target
            )));
        }

        let now = Utc::now();
        let guard = self.locks.lock(&[source, target]).await;
        let mut tx = self.store.begin_transaction().await?;
        self.store
            .lock_columns_tx(&mut tx, guard.columns(), now)
            .await?;
        let fresh = self.reload_active(&mut tx, &current).await?;

        let source_rows = self.store.active_in_column_tx(&mut tx, source).await?;
        let plan = if target == source {
            PositionManager::move_within_column(&fresh, &source_rows, position)?
        } else {
            let target_rows = self.store.active_in_column_tx(&mut tx, target).await?;
            PositionManager::move_across_columns(
                &fresh,
                &source_rows,
                target,
                &target_rows,
                position,
            )?
        };

        if plan.is_noop_for(&fresh) {
            tx.rollback().await?;
            debug!("Move of schedule {} to position {} is a no-op", id, position);
            return Ok(fresh);
        }
        debug!(
            "Moving schedule {} to column {} position {} ({} shifts)",
            id,
            plan.board_column_id,
            plan.position,
            plan.shifts.len()
        );

        self.store.apply_shifts_tx(&mut tx, &plan.shifts, now).await?;
        self.store
            .place_schedule_tx(
                &mut tx,
                id,
                fresh.position,
                plan.board_column_id,
                plan.position,
                now,
            )
            .await?;

        let mut moved = fresh.clone();
        moved.board_column_id = plan.board_column_id;
        moved.position = plan.position;
        moved.updated_at = now;

        let logs = ChangeLogRecorder::diff(&fresh, &moved, LogAction::Move, actor, now);
        self.store.append_logs_tx(&mut tx, &logs).await?;
        tx.commit().await?;

        info!(
            "Moved schedule {} from {}:{} to {}:{}",
            id, fresh.board_column_id, fresh.position, moved.board_column_id, moved.position
        );
        Ok(moved)
    }

    /// Soft delete and close the gap. A deleted schedule cannot be deleted again.
    pub async fn delete(&self, id: ScheduleId, actor: ActorId) -> AppResult<Schedule> {
        let current = self.active_schedule(id).await?;

        let now = Utc::now();
        let column = current.board_column_id;
        let _guard = self.locks.lock(&[column]).await;
        let mut tx = self.store.begin_transaction().await?;
        self.store.lock_columns_tx(&mut tx, &[column], now).await?;
        let fresh = self.reload_active(&mut tx, &current).await?;

        let rows = self.store.active_in_column_tx(&mut tx, column).await?;
        let plan = PositionManager::delete(&fresh, &rows);

        self.store.mark_deleted_tx(&mut tx, id, now).await?;
        self.store.apply_shifts_tx(&mut tx, &plan.shifts, now).await?;
        self.store
            .append_logs_tx(
                &mut tx,
                &[NewScheduleLog::marker(id, actor, LogAction::Delete, now)],
            )
            .await?;
        tx.commit().await?;

        info!(
            "Deleted schedule {} from column {} ({} siblings compacted)",
            id,
            column,
            plan.shifts.len()
        );
        let mut deleted = fresh;
        deleted.lifecycle = Lifecycle::Deleted { at: now };
        deleted.updated_at = now;
        Ok(deleted)
    }

    /// Replace the stored transcript. Only JSON objects are accepted.
    pub async fn update_transcript(
        &self,
        id: ScheduleId,
        actor: ActorId,
        transcript: &Value,
    ) -> AppResult<Schedule> {
        if !transcript.is_object() {
            return Err(AppError::InvalidArgument(
                "video transcript must be a JSON object".to_string(),
            ));
        }
        let serialized = serde_json::to_string(transcript).map_err(|e| {
            AppError::InvalidArgument(format!("unserializable video transcript: {}", e))
        })?;

        self.update(
            id,
            actor,
            SchedulePatch {
                video_transcript: Some(serialized),
                ..SchedulePatch::default()
            },
        )
        .await
    }

    /// Any lifecycle.
    pub async fn get(&self, id: ScheduleId) -> AppResult<Schedule> {
        self.store
            .get_schedule(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("schedule {} not found", id)))
    }

    pub async fn list_by_column(&self, column: BoardColumnId) -> AppResult<Vec<Schedule>> {
        self.store
            .find_schedules(&ScheduleFilter::active_in_column(column))
            .await
    }

    pub async fn list_by_workspace(&self, workspace: WorkspaceId) -> AppResult<Vec<Schedule>> {
        self.store
            .find_schedules(&ScheduleFilter {
                workspace_ids: vec![workspace],
                ..ScheduleFilter::default()
            })
            .await
    }

    pub async fn list_by_workspace_column(
        &self,
        workspace: WorkspaceId,
        column: BoardColumnId,
    ) -> AppResult<Vec<Schedule>> {
        self.filter_workspace_column(workspace, column, DueCriteria::default())
            .await
    }

    /// Board-column view narrowed by due-date criteria, resolved against the
    /// current UTC date.
    pub async fn filter_workspace_column(
        &self,
        workspace: WorkspaceId,
        column: BoardColumnId,
        due: DueCriteria,
    ) -> AppResult<Vec<Schedule>> {
        let filter = ScheduleFilter {
            workspace_ids: vec![workspace],
            ..ScheduleFilter::active_in_column(column)
        }
        .with_due(due, Utc::now().date_naive());
        self.store.find_schedules(&filter).await
    }

    pub async fn list_all(&self) -> AppResult<Vec<Schedule>> {
        self.store.find_schedules(&ScheduleFilter::default()).await
    }

    pub async fn filter(&self, filter: &ScheduleFilter) -> AppResult<Vec<Schedule>> {
        self.store.find_schedules(filter).await
    }

    pub async fn list_logs(&self, id: ScheduleId) -> AppResult<Vec<ScheduleLog>> {
        self.get(id).await?;
        self.store.get_logs(id).await
    }

    pub async fn list_participants(&self, id: ScheduleId) -> AppResult<Vec<ScheduleParticipant>> {
        self.get(id).await?;
        self.store.get_participants(id).await
    }

    async fn active_schedule(&self, id: ScheduleId) -> AppResult<Schedule> {
        match self.store.get_schedule(id).await? {
            Some(schedule) if schedule.is_active() => Ok(schedule),
            _ => Err(AppError::NotFound(format!("active schedule {} not found", id))),
        }
    }

    /// Re-read under the column lock. The row must still be active and still
    /// live in the column that was locked.
    async fn reload_active(
        &self,
        tx: &mut StoreTransaction,
        seen: &Schedule,
    ) -> AppResult<Schedule> {
        let fresh = match self.store.get_schedule_tx(tx, seen.id).await? {
            Some(schedule) if schedule.is_active() => schedule,
            _ => {
                return Err(AppError::NotFound(format!(
                    "active schedule {} not found",
                    seen.id
                )))
            }
        };
        if fresh.board_column_id != seen.board_column_id {
            warn!(
                "Schedule {} left column {} while waiting for its lock",
                seen.id, seen.board_column_id
            );
            return Err(AppError::Conflict(format!(
                "schedule {} was moved concurrently",
                seen.id
            )));
        }
        Ok(fresh)
    }
}
