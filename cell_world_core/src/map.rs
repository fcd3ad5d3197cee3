use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::Position;

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinates ({x}, {y}) are out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

/// How the edges of a grid behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Cells on the border simply have fewer neighbors.
    #[default]
    Bounded,
    /// Opposite edges are joined, every cell has a full neighborhood.
    Torus,
}

/// Which surrounding cells count as neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Neighborhood {
    /// The 4 orthogonally adjacent cells.
    VonNeumann,
    /// The 8 adjacent cells, diagonals included.
    #[default]
    Moore,
}

const VON_NEUMANN_OFFSETS: [(isize, isize); 4] = [
    (0, 1),  // Down
    (0, -1), // Up
    (1, 0),  // Right
    (-1, 0), // Left
];

const MOORE_OFFSETS: [(isize, isize); 8] = [
    (0, 1),
    (0, -1),
    (1, 0),
    (-1, 0),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

impl Neighborhood {
    /// Offsets in enumeration order. "First found" tie-breaking depends on this order.
    pub fn offsets(&self) -> &'static [(isize, isize)] {
        match self {
            Neighborhood::VonNeumann => &VON_NEUMANN_OFFSETS,
            Neighborhood::Moore => &MOORE_OFFSETS,
        }
    }
}

/// Read-only grid queries a cleaner consults when deciding what to do.
pub trait GridQuery {
    /// Whether `position` lies inside the world.
    fn is_valid(&self, position: Position) -> bool;

    /// Neighbors of `position` a cleaner could step onto right now.
    fn neighbors(&self, position: Position) -> Vec<Position>;
}

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
/// Provides methods for accessing and modifying elements via (x, y) coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled with default values.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn new(width: usize, height: usize) -> Self
    where
        T: Default + Clone,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        Grid {
            width,
            height,
            cells: vec![T::default(); size],
        }
    }

    /// Creates a new grid with the specified dimensions, filled by a generator function.
    ///
    /// The generator function `f` takes `(x, y)` coordinates and returns the value for that cell.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn from_generator<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        let mut cells = Vec::with_capacity(size);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(x, y));
            }
        }
        Grid {
            width,
            height,
            cells,
        }
    }

    /// Returns the width of the grid.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height of the grid.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Converts (x, y) coordinates to a flat vector index.
    ///
    /// Returns `None` if the coordinates are out of bounds.
    #[inline]
    pub fn coords_to_index(&self, x: usize, y: usize) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    /// Converts a flat vector index back to a position.
    ///
    /// Returns `None` if the index is out of bounds.
    #[inline]
    pub fn index_to_position(&self, index: usize) -> Option<Position> {
        if index < self.cells.len() {
            Some(Position {
                x: index % self.width,
                y: index / self.width,
            })
        } else {
            None
        }
    }

    /// Checks if the given coordinates are within the grid boundaries.
    #[inline]
    pub fn is_valid(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    /// Checks if the position is within the grid boundaries.
    #[inline]
    pub fn contains(&self, position: Position) -> bool {
        self.is_valid(position.x, position.y)
    }

    /// Gets an immutable reference to the cell at the given coordinates.
    ///
    /// Returns `None` if the coordinates are out of bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        let index = self.coords_to_index(x, y)?;
        self.cells.get(index)
    }

    /// Gets a mutable reference to the cell at the given coordinates.
    ///
    /// Returns `None` if the coordinates are out of bounds.
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        let index = self.coords_to_index(x, y)?;
        self.cells.get_mut(index)
    }

    /// Sets the value of the cell at the given coordinates.
    ///
    /// Returns `Ok(())` on success, or `Err(GridError::OutOfBounds)` if the
    /// coordinates are invalid.
    pub fn set(&mut self, x: usize, y: usize, value: T) -> Result<(), GridError> {
        let index = self.coords_to_index(x, y).ok_or(GridError::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Returns an iterator over the cells of the grid in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter()
    }

    /// Returns an iterator that yields `(Position, &T)` for each cell.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let width = self.width;
        self.cells.iter().enumerate().map(move |(index, cell)| {
            (
                Position {
                    x: index % width,
                    y: index / width,
                },
                cell,
            )
        })
    }

    /// Returns the positions adjacent to `position`, in the neighborhood's enumeration order.
    ///
    /// Under [`Topology::Torus`] coordinates wrap; on grids too small for a full
    /// neighborhood duplicates and the cell itself are dropped. Positions outside
    /// the grid have no neighbors.
    pub fn neighbor_positions(
        &self,
        position: Position,
        neighborhood: Neighborhood,
        topology: Topology,
    ) -> Vec<Position> {
        let mut neighbors = Vec::with_capacity(8);
        if !self.contains(position) {
            return neighbors;
        }

        for &(dx, dy) in neighborhood.offsets() {
            let candidate = match topology {
                Topology::Bounded => {
                    let (Some(x), Some(y)) = (
                        position.x.checked_add_signed(dx),
                        position.y.checked_add_signed(dy),
                    ) else {
                        continue;
                    };
                    if !self.is_valid(x, y) {
                        continue;
                    }
                    Position { x, y }
                }
                Topology::Torus => Position {
                    x: wrap(position.x, dx, self.width),
                    y: wrap(position.y, dy, self.height),
                },
            };

            if candidate != position && !neighbors.contains(&candidate) {
                neighbors.push(candidate);
            }
        }

        neighbors
    }
}

/// Moves `value` by `delta` modulo `len`.
#[inline]
fn wrap(value: usize, delta: isize, len: usize) -> usize {
    (value as isize + delta).rem_euclid(len as isize) as usize
}

/// Indexing using Position coordinates for access
impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Position) -> &Self::Output {
        let (x, y) = (index.x, index.y);
        match self.coords_to_index(x, y) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                x, y, self.width, self.height
            ),
        }
    }
}

/// Indexing using Position coordinates for mutable access
impl<T> IndexMut<Position> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, index: Position) -> &mut Self::Output {
        let (x, y) = (index.x, index.y);
        let width = self.width;
        let height = self.height;
        match self.coords_to_index(x, y) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                x, y, width, height
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut positions: Vec<Position>) -> Vec<Position> {
        positions.sort();
        positions
    }

    #[test]
    fn set_out_of_bounds_is_an_error() {
        let mut grid: Grid<u8> = Grid::new(3, 2);
        assert_eq!(grid.set(2, 1, 7), Ok(()));
        assert_eq!(grid[Position::new(2, 1)], 7);
        assert_eq!(
            grid.set(3, 0, 1),
            Err(GridError::OutOfBounds {
                x: 3,
                y: 0,
                width: 3,
                height: 2
            })
        );
    }

    #[test]
    fn from_generator_is_row_major() {
        let grid = Grid::from_generator(3, 2, |x, y| y * 10 + x);
        let values: Vec<usize> = grid.iter().copied().collect();
        assert_eq!(values, vec![0, 1, 2, 10, 11, 12]);
        assert_eq!(grid.index_to_position(4), Some(Position::new(1, 1)));
        assert_eq!(grid.index_to_position(6), None);
    }

    #[test]
    fn corner_neighbors_on_bounded_grid() {
        let grid: Grid<u8> = Grid::new(4, 4);
        let corner = Position::new(0, 0);

        let orthogonal = grid.neighbor_positions(corner, Neighborhood::VonNeumann, Topology::Bounded);
        assert_eq!(
            sorted(orthogonal),
            vec![Position::new(0, 1), Position::new(1, 0)]
        );

        let moore = grid.neighbor_positions(corner, Neighborhood::Moore, Topology::Bounded);
        assert_eq!(
            sorted(moore),
            vec![Position::new(0, 1), Position::new(1, 0), Position::new(1, 1)]
        );
    }

    #[test]
    fn torus_wraps_edges() {
        let grid: Grid<u8> = Grid::new(5, 5);
        let corner = Position::new(0, 0);
        let neighbors = grid.neighbor_positions(corner, Neighborhood::Moore, Topology::Torus);
        assert_eq!(neighbors.len(), 8);
        assert!(neighbors.contains(&Position::new(4, 4)));
        assert!(neighbors.contains(&Position::new(4, 0)));
        assert!(neighbors.contains(&Position::new(0, 4)));
    }

    #[test]
    fn torus_on_tiny_grid_drops_duplicates_and_self() {
        let grid: Grid<u8> = Grid::new(2, 1);
        let neighbors =
            grid.neighbor_positions(Position::new(0, 0), Neighborhood::Moore, Topology::Torus);
        assert_eq!(neighbors, vec![Position::new(1, 0)]);
    }

    #[test]
    fn outside_position_has_no_neighbors() {
        let grid: Grid<u8> = Grid::new(2, 2);
        assert!(grid
            .neighbor_positions(Position::new(5, 5), Neighborhood::Moore, Topology::Bounded)
            .is_empty());
    }
}
