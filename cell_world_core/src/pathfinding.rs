//! A* shortest paths over grid coordinates.
//!
//! Cleaners never call this while deciding a turn: they navigate greedily on
//! manhattan distance. The path finder is a standalone, side-effect free
//! utility for callers that want exact routes (the TUI shows each cleaner's
//! true distance home with it).

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap, HashSet},
};

use crate::{Position, manhattan_distance};

/// Estimates the remaining cost between two positions.
pub type Heuristic = fn(Position, Position) -> usize;

/// Frontier entry, ordered so the `BinaryHeap` pops the lowest `(f, g, position)` first.
#[derive(Clone, Copy, Eq, PartialEq)]
struct PrioritizedItem {
    f: usize,
    g: usize,
    position: Position,
}

impl Ord for PrioritizedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        (other.f, other.g, other.position).cmp(&(self.f, self.g, self.position))
    }
}

impl PartialOrd for PrioritizedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Finds a shortest 4-connected path from `start` to `goal`.
///
/// * `valid`: every position that exists in the world.
/// * `is_blocked`: positions that cannot be entered.
/// * `heuristic`: defaults to manhattan distance.
///
/// Returns the path from `start` to `goal` inclusive, or `None` when `goal` is
/// not a valid position or cannot be reached.
pub fn astar_path<B>(
    start: Position,
    goal: Position,
    valid: &HashSet<Position>,
    is_blocked: B,
    heuristic: Option<Heuristic>,
) -> Option<Vec<Position>>
where
    B: Fn(Position) -> bool,
{
    if start == goal {
        return Some(vec![start]);
    }
    if !valid.contains(&goal) {
        return None;
    }
    let heuristic = heuristic.unwrap_or(manhattan_distance);

    let mut frontier = BinaryHeap::new();
    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut g_score: HashMap<Position, usize> = HashMap::new();

    g_score.insert(start, 0);
    frontier.push(PrioritizedItem {
        f: heuristic(start, goal),
        g: 0,
        position: start,
    });

    while let Some(PrioritizedItem {
        g, position: current, ..
    }) = frontier.pop()
    {
        if current == goal {
            return Some(reconstruct_path(&came_from, start, goal));
        }

        // Stale entry: a cheaper route to `current` was queued after this one.
        if g_score.get(&current).is_some_and(|&best| g > best) {
            continue;
        }

        for neighbor in orthogonal_neighbors(current, valid, &is_blocked) {
            let tentative_g = g + 1;
            let improves = g_score
                .get(&neighbor)
                .is_none_or(|&known| tentative_g < known);
            if improves {
                g_score.insert(neighbor, tentative_g);
                came_from.insert(neighbor, current);
                frontier.push(PrioritizedItem {
                    f: tentative_g + heuristic(neighbor, goal),
                    g: tentative_g,
                    position: neighbor,
                });
            }
        }
    }

    None
}

fn orthogonal_neighbors<'a, B>(
    position: Position,
    valid: &'a HashSet<Position>,
    is_blocked: &'a B,
) -> impl Iterator<Item = Position> + 'a
where
    B: Fn(Position) -> bool,
{
    [(1, 0), (-1, 0), (0, 1), (0, -1)]
        .into_iter()
        .filter_map(move |(dx, dy)| {
            Some(Position {
                x: position.x.checked_add_signed(dx)?,
                y: position.y.checked_add_signed(dy)?,
            })
        })
        .filter(move |candidate| valid.contains(candidate) && !is_blocked(*candidate))
}

fn reconstruct_path(
    came_from: &HashMap<Position, Position>,
    start: Position,
    goal: Position,
) -> Vec<Position> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(&previous) => {
                current = previous;
                path.push(current);
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn open_grid(width: usize, height: usize) -> HashSet<Position> {
        (0..width)
            .flat_map(|x| (0..height).map(move |y| Position { x, y }))
            .collect()
    }

    fn assert_connected(path: &[Position]) {
        for step in path.windows(2) {
            assert_eq!(manhattan_distance(step[0], step[1]), 1, "{:?}", step);
        }
    }

    #[test]
    fn start_equals_goal_returns_single_cell() {
        let valid = open_grid(3, 3);
        let here = Position::new(1, 1);
        assert_eq!(astar_path(here, here, &valid, |_| false, None), Some(vec![here]));
    }

    #[test]
    fn goal_outside_lookup_is_no_path() {
        let valid = open_grid(3, 3);
        let path = astar_path(
            Position::new(0, 0),
            Position::new(5, 5),
            &valid,
            |_| false,
            None,
        );
        assert_eq!(path, None);
    }

    #[test]
    fn walled_off_goal_is_no_path() {
        let valid = open_grid(5, 5);
        let goal = Position::new(4, 4);
        let wall = [Position::new(3, 4), Position::new(4, 3), Position::new(3, 3)];
        let path = astar_path(
            Position::new(0, 0),
            goal,
            &valid,
            |p| wall.contains(&p),
            None,
        );
        assert_eq!(path, None);
    }

    #[test]
    fn routes_around_a_wall() {
        // A vertical wall at x = 2 with a gap at y = 4.
        let valid = open_grid(5, 5);
        let start = Position::new(0, 0);
        let goal = Position::new(4, 0);
        let path = astar_path(start, goal, &valid, |p| p.x == 2 && p.y < 4, None)
            .expect("gap should be reachable");

        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&goal));
        assert_connected(&path);
        // Down four, across four, up four.
        assert_eq!(path.len() - 1, 12);
        assert!(path.contains(&Position::new(2, 4)));
    }

    #[test]
    fn zero_heuristic_still_finds_shortest_path() {
        let valid = open_grid(6, 6);
        let path = astar_path(
            Position::new(0, 5),
            Position::new(5, 0),
            &valid,
            |_| false,
            Some(|_, _| 0),
        )
        .expect("open grid");
        assert_eq!(path.len() - 1, 10);
        assert_connected(&path);
    }

    proptest! {
        #[test]
        fn open_grid_path_length_is_manhattan(
            sx in 0..8usize, sy in 0..8usize,
            gx in 0..8usize, gy in 0..8usize,
        ) {
            let valid = open_grid(8, 8);
            let start = Position::new(sx, sy);
            let goal = Position::new(gx, gy);
            let path = astar_path(start, goal, &valid, |_| false, None);
            prop_assert!(path.is_some());
            let path = path.unwrap();
            prop_assert_eq!(path.len() - 1, manhattan_distance(start, goal));
            prop_assert_eq!(path[0], start);
            prop_assert_eq!(*path.last().unwrap(), goal);
        }
    }
}
