// Position Manager - keeps active positions of every board column dense (1..=N)
//
// Planning is pure: callers hand in the active rows of the affected column(s),
// read inside the same store transaction, and get back where the schedule
// lands plus every sibling that must move with it. The store applies the plan
// as one atomic batch.

use crate::core::{BoardColumnId, ScheduleId};
use crate::error::{AppError, AppResult};
use crate::models::Schedule;

/// One sibling row whose position changes as part of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionShift {
    pub schedule_id: ScheduleId,
    pub from: i64,
    pub to: i64,
}

/// Result of planning one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionPlan {
    /// Column the primary schedule ends up in
    pub board_column_id: BoardColumnId,
    /// Position the primary schedule ends up at (frozen position on delete)
    pub position: i64,
    pub shifts: Vec<PositionShift>,
}

impl PositionPlan {
    /// True when applying the plan would change nothing at all.
    pub fn is_noop_for(&self, schedule: &Schedule) -> bool {
        self.shifts.is_empty()
            && self.position == schedule.position
            && self.board_column_id == schedule.board_column_id
    }
}

pub struct PositionManager;

impl PositionManager {
    /// Next free slot at the end of the column.
    pub fn insert(column: BoardColumnId, column_rows: &[Schedule]) -> PositionPlan {
        PositionPlan {
            board_column_id: column,
            position: active_siblings(column_rows, None).count() as i64 + 1,
            shifts: Vec::new(),
        }
    }

    /// Reorder inside the schedule's own column. `new_position` must lie in
    /// `1..=N` where N counts the schedule itself.
    pub fn move_within_column(
        schedule: &Schedule,
        column_rows: &[Schedule],
        new_position: i64,
    ) -> AppResult<PositionPlan> {
        let old_position = schedule.position;
        let count = active_siblings(column_rows, Some(schedule.id)).count() as i64 + 1;
        if new_position < 1 || new_position > count {
            return Err(AppError::InvalidArgument(format!(
                "position {} is outside 1..={} for column {}",
                new_position, count, schedule.board_column_id
            )));
        }

        let shifts = if new_position < old_position {
            shift_range(column_rows, schedule.id, |p| p >= new_position && p < old_position, 1)
        } else if new_position > old_position {
            shift_range(column_rows, schedule.id, |p| p > old_position && p <= new_position, -1)
        } else {
            Vec::new()
        };

        Ok(PositionPlan {
            board_column_id: schedule.board_column_id,
            position: new_position,
            shifts,
        })
    }

    /// Move into another column. The source gap is closed, then the target
    /// opens a slot at `target_position`; a slot at or past the end of the
    /// target column clamps to appending after its last active schedule.
    pub fn move_across_columns(
        schedule: &Schedule,
        source_rows: &[Schedule],
        target_column: BoardColumnId,
        target_rows: &[Schedule],
        target_position: i64,
    ) -> AppResult<PositionPlan> {
        if target_position < 1 {
            return Err(AppError::InvalidArgument(format!(
                "position {} must be at least 1",
                target_position
            )));
        }

        let old_position = schedule.position;
        let mut shifts = shift_range(source_rows, schedule.id, |p| p > old_position, -1);

        let opened = shift_range(target_rows, schedule.id, |p| p >= target_position, 1);
        let position = if opened.is_empty() {
            active_siblings(target_rows, Some(schedule.id))
                .map(|s| s.position)
                .max()
                .unwrap_or(0)
                + 1
        } else {
            target_position
        };
        shifts.extend(opened);

        Ok(PositionPlan {
            board_column_id: target_column,
            position,
            shifts,
        })
    }

    /// Close the gap left by a soft delete. The deleted row keeps its position.
    pub fn delete(schedule: &Schedule, column_rows: &[Schedule]) -> PositionPlan {
        let frozen = schedule.position;
        PositionPlan {
            board_column_id: schedule.board_column_id,
            position: frozen,
            shifts: shift_range(column_rows, schedule.id, |p| p > frozen, -1),
        }
    }
}

fn active_siblings(
    rows: &[Schedule],
    exclude: Option<ScheduleId>,
) -> impl Iterator<Item = &Schedule> {
    rows.iter()
        .filter(move |s| s.is_active() && Some(s.id) != exclude)
}

fn shift_range(
    rows: &[Schedule],
    exclude: ScheduleId,
    in_range: impl Fn(i64) -> bool,
    delta: i64,
) -> Vec<PositionShift> {
    let mut shifts: Vec<PositionShift> = active_siblings(rows, Some(exclude))
        .filter(|s| in_range(s.position))
        .map(|s| PositionShift {
            schedule_id: s.id,
            from: s.position,
            to: s.position + delta,
        })
        .collect();
    shifts.sort_by_key(|shift| shift.from);
    shifts
}
