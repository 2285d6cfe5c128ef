// Core types and primitives

pub mod strong_types;
pub mod timestamps;

pub use strong_types::{ActorId, BoardColumnId, ScheduleId, WorkspaceId};
pub use timestamps::{parse_timestamp, render_timestamp};
