use serde::{Deserialize, Serialize};

pub mod agent;
pub mod automaton;
pub mod battery;
pub mod config;
pub mod environment;
pub mod map;
pub mod pathfinding;
pub mod stats;

/// Unique identifier for cleaners.
pub type EntityId = usize;

/// Represents a 2D coordinate.
///
/// Ordering is by `x`, then `y`. Path finding uses it as the final tie-break key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Returns the manhattan distance `|dx| + |dy|` between two positions.
///
/// Computed on raw coordinates, so it never accounts for torus wraparound.
pub fn manhattan_distance(a: Position, b: Position) -> usize {
    a.x.abs_diff(b.x) + a.y.abs_diff(b.y)
}

/// What occupies a cell of the cleaning world, apart from cleaners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellKind {
    #[default]
    Floor,
    Obstacle,
    Charger,
    /// A patch that started dirty. Once cleaned it stays clean.
    Patch { dirty: bool },
}

impl CellKind {
    pub fn is_dirty(&self) -> bool {
        matches!(self, CellKind::Patch { dirty: true })
    }

    pub fn is_charger(&self) -> bool {
        matches!(self, CellKind::Charger)
    }

    pub fn is_obstacle(&self) -> bool {
        matches!(self, CellKind::Obstacle)
    }
}
