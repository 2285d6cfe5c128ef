// Board services - position planning, audit diffing and the operations built on them

pub mod change_log;
pub mod position_manager;
pub mod schedule_service;

pub use change_log::{ChangeLogRecorder, FieldValue, TRACKED_FIELDS};
pub use position_manager::{PositionManager, PositionPlan, PositionShift};
pub use schedule_service::ScheduleService;
