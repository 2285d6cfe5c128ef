use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{ActorId, ScheduleId};

pub const CREATOR_ROLE: &str = "creator";
pub const INVITATION_JOINED: &str = "joined";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleParticipant {
    pub id: i64,
    pub schedule_id: ScheduleId,
    pub actor_id: ActorId,
    pub status: String,
    pub invitation_status: String,
    pub assign_by: ActorId,
    pub assign_at: Option<DateTime<Utc>>,
    pub response_time: Option<DateTime<Utc>>,
    pub invitation_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduleParticipantRow {
    pub id: i64,
    pub schedule_id: i64,
    pub actor_id: i64,
    pub status: String,
    pub invitation_status: String,
    pub assign_by: i64,
    pub assign_at: Option<DateTime<Utc>>,
    pub response_time: Option<DateTime<Utc>>,
    pub invitation_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ScheduleParticipantRow> for ScheduleParticipant {
    fn from(row: ScheduleParticipantRow) -> Self {
        ScheduleParticipant {
            id: row.id,
            schedule_id: ScheduleId(row.schedule_id),
            actor_id: ActorId(row.actor_id),
            status: row.status,
            invitation_status: row.invitation_status,
            assign_by: ActorId(row.assign_by),
            assign_at: row.assign_at,
            response_time: row.response_time,
            invitation_sent_at: row.invitation_sent_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewScheduleParticipant {
    pub schedule_id: ScheduleId,
    pub actor_id: ActorId,
    pub status: String,
    pub invitation_status: String,
    pub assign_by: ActorId,
    pub at: DateTime<Utc>,
}

impl NewScheduleParticipant {
    /// The creating actor joins their own schedule immediately.
    pub fn creator(schedule_id: ScheduleId, actor_id: ActorId, at: DateTime<Utc>) -> Self {
        Self {
            schedule_id,
            actor_id,
            status: CREATOR_ROLE.to_string(),
            invitation_status: INVITATION_JOINED.to_string(),
            assign_by: actor_id,
            at,
        }
    }
}
