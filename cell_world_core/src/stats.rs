use serde::{Deserialize, Serialize};

use crate::{EntityId, Position};

/// Per-cleaner figures at the end of a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanerReport {
    pub id: EntityId,
    pub position: Position,
    pub battery: u32,
    pub move_count: u64,
    pub cleaned_count: u64,
    pub visited_cells: usize,
}

/// World-wide figures at the end of a tick.
///
/// The environment only produces these; keeping a history is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub step: u64,
    pub initial_dirty: usize,
    pub remaining_dirty: usize,
    /// Share of the initially dirty cells cleaned so far, in percent.
    pub clean_percent: f64,
    pub move_count: u64,
    pub avg_battery: f64,
    pub cleaners: Vec<CleanerReport>,
}

impl Snapshot {
    pub fn batteries(&self) -> impl Iterator<Item = u32> + '_ {
        self.cleaners.iter().map(|c| c.battery)
    }
}

pub(crate) fn clean_percent(initial_dirty: usize, remaining_dirty: usize) -> f64 {
    if initial_dirty == 0 {
        0.0
    } else {
        100.0 * initial_dirty.saturating_sub(remaining_dirty) as f64 / initial_dirty as f64
    }
}

pub(crate) fn average(values: impl Iterator<Item = u32>) -> f64 {
    let (sum, count) = values.fold((0u64, 0u64), |(sum, count), v| (sum + v as u64, count + 1));
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}
