// Strong Types - newtype identifiers for the board domain
// Keeps schedule, column, workspace and actor ids from being swapped by accident

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! board_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the raw ID value
            pub fn value(self) -> i64 {
                self.0
            }

            /// Check if this is a valid ID (positive)
            pub fn is_valid(self) -> bool {
                self.0 > 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

board_id!(
    /// Stable identifier of a schedule (card)
    ScheduleId
);
board_id!(
    /// Board column (kanban lane) owning a set of schedules
    BoardColumnId
);
board_id!(WorkspaceId);
board_id!(
    /// Workspace user performing a mutation
    ActorId
);
