use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{parse_timestamp, ActorId, BoardColumnId, ScheduleId, WorkspaceId};
use crate::error::{AppError, AppResult};

pub const DEFAULT_STATUS: &str = "not yet";
pub const DEFAULT_VISIBILITY: &str = "public";
pub const DONE_STATUS: &str = "done";

/// Lifecycle of a schedule. Deletion is always soft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    Active,
    Deleted { at: DateTime<Utc> },
}

/// A card on the board. `position` is 1-based and dense among active
/// schedules of the same column; it is frozen once the schedule is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub workspace_id: WorkspaceId,
    pub board_column_id: BoardColumnId,
    pub title: String,
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: String,
    pub created_by: ActorId,
    pub status: String,
    pub all_day: bool,
    pub visibility: String,
    pub extra_data: String,
    pub recurrence_pattern: String,
    pub priority: String,
    pub video_transcript: String,
    pub position: i64,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    pub fn is_active(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Active)
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self.lifecycle {
            Lifecycle::Active => None,
            Lifecycle::Deleted { at } => Some(at),
        }
    }
}

/// Flat row shape shared by the SQLite and PostgreSQL stores.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduleRow {
    pub id: i64,
    pub workspace_id: i64,
    pub board_column_id: i64,
    pub title: String,
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: String,
    pub created_by: i64,
    pub status: String,
    pub all_day: bool,
    pub visibility: String,
    pub extra_data: String,
    pub recurrence_pattern: String,
    pub priority: String,
    pub video_transcript: String,
    pub position: i64,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ScheduleRow> for Schedule {
    fn from(row: ScheduleRow) -> Self {
        // Rows written before deleted_at existed fall back to updated_at
        let lifecycle = if row.is_deleted {
            Lifecycle::Deleted {
                at: row.deleted_at.unwrap_or(row.updated_at),
            }
        } else {
            Lifecycle::Active
        };
        Schedule {
            id: ScheduleId(row.id),
            workspace_id: WorkspaceId(row.workspace_id),
            board_column_id: BoardColumnId(row.board_column_id),
            title: row.title,
            description: row.description,
            start_time: row.start_time,
            end_time: row.end_time,
            location: row.location,
            created_by: ActorId(row.created_by),
            status: row.status,
            all_day: row.all_day,
            visibility: row.visibility,
            extra_data: row.extra_data,
            recurrence_pattern: row.recurrence_pattern,
            priority: row.priority,
            video_transcript: row.video_transcript,
            position: row.position,
            lifecycle,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Column list used by every `SELECT` against `schedules`.
pub const SCHEDULE_COLUMNS: &str = "id, workspace_id, board_column_id, title, description, \
     start_time, end_time, location, created_by, status, all_day, visibility, extra_data, \
     recurrence_pattern, priority, video_transcript, position, is_deleted, deleted_at, \
     created_at, updated_at";

/// Caller-supplied fields for a new schedule. Only `title` is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub all_day: Option<bool>,
    pub visibility: Option<String>,
    pub extra_data: Option<String>,
    pub recurrence_pattern: Option<String>,
    pub priority: Option<String>,
}

/// Fully resolved insert payload; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSchedule {
    pub workspace_id: WorkspaceId,
    pub board_column_id: BoardColumnId,
    pub title: String,
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: String,
    pub created_by: ActorId,
    pub status: String,
    pub all_day: bool,
    pub visibility: String,
    pub extra_data: String,
    pub recurrence_pattern: String,
    pub priority: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

impl NewSchedule {
    /// Resolve create fields against board defaults. Start defaults to `now`
    /// and end to one hour later.
    pub fn from_fields(
        board_column_id: BoardColumnId,
        workspace_id: WorkspaceId,
        created_by: ActorId,
        fields: ScheduleFields,
        position: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let title = fields
            .title
            .ok_or_else(|| AppError::InvalidArgument("title is required".to_string()))?;
        let start_time = match fields.start_time.as_deref() {
            Some(raw) => parse_timestamp("start_time", raw)?,
            None => now,
        };
        let end_time = match fields.end_time.as_deref() {
            Some(raw) => parse_timestamp("end_time", raw)?,
            None => now + Duration::hours(1),
        };

        Ok(Self {
            workspace_id,
            board_column_id,
            title,
            description: fields.description.unwrap_or_default(),
            start_time: Some(start_time),
            end_time: Some(end_time),
            location: fields.location.unwrap_or_default(),
            created_by,
            status: fields.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            all_day: fields.all_day.unwrap_or(false),
            visibility: fields
                .visibility
                .unwrap_or_else(|| DEFAULT_VISIBILITY.to_string()),
            extra_data: fields.extra_data.unwrap_or_default(),
            recurrence_pattern: fields.recurrence_pattern.unwrap_or_default(),
            priority: fields.priority.unwrap_or_default(),
            position,
            created_at: now,
        })
    }

    pub fn into_schedule(self, id: ScheduleId) -> Schedule {
        Schedule {
            id,
            workspace_id: self.workspace_id,
            board_column_id: self.board_column_id,
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            created_by: self.created_by,
            status: self.status,
            all_day: self.all_day,
            visibility: self.visibility,
            extra_data: self.extra_data,
            recurrence_pattern: self.recurrence_pattern,
            priority: self.priority,
            video_transcript: String::new(),
            position: self.position,
            lifecycle: Lifecycle::Active,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Partial update. Absent fields are left untouched; position and column are
/// never part of a patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub all_day: Option<bool>,
    pub visibility: Option<String>,
    pub extra_data: Option<String>,
    pub recurrence_pattern: Option<String>,
    pub priority: Option<String>,
    pub video_transcript: Option<String>,
}

impl SchedulePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.location.is_none()
            && self.status.is_none()
            && self.all_day.is_none()
            && self.visibility.is_none()
            && self.extra_data.is_none()
            && self.recurrence_pattern.is_none()
            && self.priority.is_none()
            && self.video_transcript.is_none()
    }

    /// Apply onto a copy of `schedule`. Timestamps are validated before any
    /// field is touched so a bad patch leaves nothing half-applied.
    pub fn apply_to(&self, schedule: &Schedule) -> AppResult<Schedule> {
        let start_time = self
            .start_time
            .as_deref()
            .map(|raw| parse_timestamp("start_time", raw))
            .transpose()?;
        let end_time = self
            .end_time
            .as_deref()
            .map(|raw| parse_timestamp("end_time", raw))
            .transpose()?;

        let mut next = schedule.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(start_time) = start_time {
            next.start_time = Some(start_time);
        }
        if let Some(end_time) = end_time {
            next.end_time = Some(end_time);
        }
        if let Some(location) = &self.location {
            next.location = location.clone();
        }
        if let Some(status) = &self.status {
            next.status = status.clone();
        }
        if let Some(all_day) = self.all_day {
            next.all_day = all_day;
        }
        if let Some(visibility) = &self.visibility {
            next.visibility = visibility.clone();
        }
        if let Some(extra_data) = &self.extra_data {
            next.extra_data = extra_data.clone();
        }
        if let Some(recurrence_pattern) = &self.recurrence_pattern {
            next.recurrence_pattern = recurrence_pattern.clone();
        }
        if let Some(priority) = &self.priority {
            next.priority = priority.clone();
        }
        if let Some(video_transcript) = &self.video_transcript {
            next.video_transcript = video_transcript.clone();
        }
        Ok(next)
    }
}

/// Structured filter over schedules. Every criterion is optional and they
/// combine with AND; `workspace_ids` matches any of the listed workspaces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleFilter {
    pub workspace_ids: Vec<WorkspaceId>,
    pub board_column_id: Option<BoardColumnId>,
    pub start_after: Option<DateTime<Utc>>,
    pub end_before: Option<DateTime<Utc>>,
    pub created_by: Option<ActorId>,
    pub status: Option<String>,
    pub is_deleted: Option<bool>,
    /// start_time within `[from, until)`
    pub due_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// status is `done`
    pub due_complete: bool,
    /// start_time before this instant and status is not `done`
    pub overdue_before: Option<DateTime<Utc>>,
    /// start_time is unset
    pub not_due: bool,
    /// Order by position instead of id
    pub order_by_position: bool,
}

impl ScheduleFilter {
    pub fn active_in_column(column: BoardColumnId) -> Self {
        Self {
            board_column_id: Some(column),
            is_deleted: Some(false),
            order_by_position: true,
            ..Self::default()
        }
    }

    /// Resolve due-date criteria against `today` (UTC).
    pub fn with_due(mut self, due: DueCriteria, today: NaiveDate) -> Self {
        if let Some(window) = due.window {
            self.due_between = Some(window.range(today));
        }
        if due.overdue {
            self.overdue_before = Some(start_of(today));
        }
        self.due_complete = due.complete;
        self.not_due = due.not_due;
        self
    }
}

/// Start-time window counted in whole days from today, today included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueWindow {
    Day,
    Week,
    Month,
}

impl DueWindow {
    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "day" => Ok(DueWindow::Day),
            "week" => Ok(DueWindow::Week),
            "month" => Ok(DueWindow::Month),
            other => Err(AppError::InvalidArgument(format!(
                "due must be day, week or month, got {}",
                other
            ))),
        }
    }

    pub fn days(self) -> i64 {
        match self {
            DueWindow::Day => 1,
            DueWindow::Week => 7,
            DueWindow::Month => 30,
        }
    }

    pub fn range(self, today: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (start_of(today), start_of(today + Duration::days(self.days())))
    }
}

/// Due-date criteria of the board-column view, before they are pinned to a date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DueCriteria {
    pub window: Option<DueWindow>,
    pub complete: bool,
    pub overdue: bool,
    pub not_due: bool,
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}
