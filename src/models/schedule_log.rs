use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{ActorId, ScheduleId};

/// Kind of mutation a log row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Create,
    Update,
    Move,
    Delete,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Create => "create schedule",
            LogAction::Update => "update schedule",
            LogAction::Move => "move schedule",
            LogAction::Delete => "delete schedule",
        }
    }
}

/// Append-only audit entry. Create/delete markers leave the field columns empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleLog {
    pub id: i64,
    pub schedule_id: ScheduleId,
    pub actor_id: ActorId,
    pub action: String,
    pub field_changed: String,
    pub old_value: String,
    pub new_value: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduleLogRow {
    pub id: i64,
    pub schedule_id: i64,
    pub actor_id: i64,
    pub action: String,
    pub field_changed: String,
    pub old_value: String,
    pub new_value: String,
    pub created_at: DateTime<Utc>,
}

impl From<ScheduleLogRow> for ScheduleLog {
    fn from(row: ScheduleLogRow) -> Self {
        ScheduleLog {
            id: row.id,
            schedule_id: ScheduleId(row.schedule_id),
            actor_id: ActorId(row.actor_id),
            action: row.action,
            field_changed: row.field_changed,
            old_value: row.old_value,
            new_value: row.new_value,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewScheduleLog {
    pub schedule_id: ScheduleId,
    pub actor_id: ActorId,
    pub action: LogAction,
    pub field_changed: String,
    pub old_value: String,
    pub new_value: String,
    pub created_at: DateTime<Utc>,
}

impl NewScheduleLog {
    /// Whole-record marker used for create and delete.
    pub fn marker(
        schedule_id: ScheduleId,
        actor_id: ActorId,
        action: LogAction,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schedule_id,
            actor_id,
            action,
            field_changed: String::new(),
            old_value: String::new(),
            new_value: String::new(),
            created_at,
        }
    }
}
