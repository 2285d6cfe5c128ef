// Change Log Recorder - field-level audit rows for schedule mutations

use chrono::{DateTime, Utc};

use crate::core::{render_timestamp, ActorId};
use crate::models::{LogAction, NewScheduleLog, Schedule};

/// Typed value of one tracked field. Equality is checked on the typed value;
/// the rendered string only goes into the log.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Time(Option<DateTime<Utc>>),
    Flag(bool),
    Int(i64),
}

impl FieldValue {
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Time(ts) => render_timestamp(*ts),
            FieldValue::Flag(flag) => flag.to_string(),
            FieldValue::Int(value) => value.to_string(),
        }
    }
}

pub const TRACKED_FIELDS: [&str; 14] = [
    "title",
    "description",
    "start_time",
    "end_time",
    "location",
    "status",
    "all_day",
    "visibility",
    "extra_data",
    "recurrence_pattern",
    "priority",
    "video_transcript",
    "position",
    "board_column_id",
];

fn tracked_values(s: &Schedule) -> [FieldValue; 14] {
    [
        FieldValue::Text(s.title.clone()),
        FieldValue::Text(s.description.clone()),
        FieldValue::Time(s.start_time),
        FieldValue::Time(s.end_time),
        FieldValue::Text(s.location.clone()),
        FieldValue::Text(s.status.clone()),
        FieldValue::Flag(s.all_day),
        FieldValue::Text(s.visibility.clone()),
        FieldValue::Text(s.extra_data.clone()),
        FieldValue::Text(s.recurrence_pattern.clone()),
        FieldValue::Text(s.priority.clone()),
        FieldValue::Text(s.video_transcript.clone()),
        FieldValue::Int(s.position),
        FieldValue::Int(s.board_column_id.value()),
    ]
}

pub struct ChangeLogRecorder;

impl ChangeLogRecorder {
    /// One row per tracked field whose value differs between `before` and
    /// `after`, all sharing `action`, `actor` and `at`.
    pub fn diff(
        before: &Schedule,
        after: &Schedule,
        action: LogAction,
        actor: ActorId,
        at: DateTime<Utc>,
    ) -> Vec<NewScheduleLog> {
        TRACKED_FIELDS
            .iter()
            .zip(tracked_values(before))
            .zip(tracked_values(after))
            .filter(|((_, old), new)| old != new)
            .map(|((field, old), new)| NewScheduleLog {
                schedule_id: after.id,
                actor_id: actor,
                action,
                field_changed: field.to_string(),
                old_value: old.render(),
                new_value: new.render(),
                created_at: at,
            })
            .collect()
    }
}
