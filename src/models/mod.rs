// Board records - schedules, their audit trail and participants

pub mod participant;
pub mod schedule;
pub mod schedule_log;

pub use participant::{NewScheduleParticipant, ScheduleParticipant, ScheduleParticipantRow};
pub use schedule::{
    DueCriteria, DueWindow, Lifecycle, NewSchedule, Schedule, ScheduleFields, ScheduleFilter,
    SchedulePatch, ScheduleRow, DONE_STATUS, SCHEDULE_COLUMNS,
};
pub use schedule_log::{LogAction, NewScheduleLog, ScheduleLog, ScheduleLogRow};
