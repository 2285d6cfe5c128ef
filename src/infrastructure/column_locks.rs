// Column Locks - per-column serialization of position mutations inside one process

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use crate::core::BoardColumnId;

/// Registry of one async mutex per board column.
///
/// Multi-column callers always acquire in ascending column order, so two
/// cross-column moves in opposite directions cannot deadlock.
#[derive(Default)]
pub struct ColumnLocks {
    columns: Mutex<HashMap<BoardColumnId, Arc<Mutex<()>>>>,
}

/// Held column locks, released on drop.
pub struct ColumnGuard {
    columns: Vec<BoardColumnId>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl ColumnGuard {
    /// Locked columns, ascending and without duplicates
    pub fn columns(&self) -> &[BoardColumnId] {
        &self.columns
    }
}

impl ColumnLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, columns: &[BoardColumnId]) -> ColumnGuard {
        let mut ordered = columns.to_vec();
        ordered.sort();
        ordered.dedup();

        let handles: Vec<Arc<Mutex<()>>> = {
            let mut registry = self.columns.lock().await;
            // Only the registry holds an idle column's mutex
            registry.retain(|_, handle| Arc::strong_count(handle) > 1);
            ordered
                .iter()
                .map(|column| registry.entry(*column).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(handles.len());
        for handle in handles {
            guards.push(handle.lock_owned().await);
        }
        trace!("Locked columns {:?}", ordered);

        ColumnGuard {
            columns: ordered,
            _guards: guards,
        }
    }

    /// Number of columns currently registered; idle ones are dropped on the next `lock`
    pub async fn tracked_columns(&self) -> usize {
        self.columns.lock().await.len()
    }
}
