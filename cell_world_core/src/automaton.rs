//! Row rules and Conway's Game of Life on a [`Grid`].
//!
//! Every step computes all next states from the current generation first and
//! only then writes them back, so the order cells are visited in never matters.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    Position,
    config::{LifeConfig, resolve_seed, unit_fraction},
    map::{Grid, Neighborhood, Topology},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellState {
    #[default]
    Dead,
    Alive,
}

impl CellState {
    #[inline]
    pub fn is_alive(&self) -> bool {
        matches!(self, CellState::Alive)
    }

    #[inline]
    pub fn from_alive(alive: bool) -> Self {
        if alive {
            CellState::Alive
        } else {
            CellState::Dead
        }
    }

    #[inline]
    fn bit(&self) -> u8 {
        u8::from(self.is_alive())
    }
}

/// An elementary (three parent) rule, stored as its Wolfram code.
///
/// Bit `i` of the code is the next state for the pattern whose
/// left/centre/right bits spell `i` in binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleTable(u8);

/// The row rule the simulations use:
///
/// ```text
/// 111 -> 0   110 -> 1   101 -> 0   100 -> 1
/// 011 -> 1   010 -> 0   001 -> 1   000 -> 0
/// ```
pub const RULE_90: RuleTable = RuleTable::new(90);

impl RuleTable {
    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    pub fn code(&self) -> u8 {
        self.0
    }

    /// Looks up the next state for a left/centre/right pattern.
    pub fn next_state(&self, left: CellState, center: CellState, right: CellState) -> CellState {
        let pattern = (left.bit() << 2) | (center.bit() << 1) | right.bit();
        CellState::from_alive((self.0 >> pattern) & 1 == 1)
    }

    /// All eight entries, from pattern `111` down to `000`.
    pub fn truth_table(&self) -> [([CellState; 3], CellState); 8] {
        std::array::from_fn(|i| {
            let pattern = 7 - i as u8;
            let parents = [
                CellState::from_alive(pattern & 0b100 != 0),
                CellState::from_alive(pattern & 0b010 != 0),
                CellState::from_alive(pattern & 0b001 != 0),
            ];
            (parents, self.next_state(parents[0], parents[1], parents[2]))
        })
    }
}

/// [`RULE_90`] stated as a neighbor count: a cell is born when exactly one of
/// its two outer parents is alive. The centre parent does not matter.
pub fn outer_parent_rule(left: CellState, _center: CellState, right: CellState) -> CellState {
    let live_parents = usize::from(left.is_alive()) + usize::from(right.is_alive());
    CellState::from_alive(live_parents == 1)
}

/// Conway's B3/S23 rule for one cell.
pub fn conway_rule(current: CellState, live_neighbors: usize) -> CellState {
    match (current, live_neighbors) {
        (CellState::Alive, 2 | 3) => CellState::Alive,
        (CellState::Dead, 3) => CellState::Alive,
        _ => CellState::Dead,
    }
}

/// How an [`Automaton`] advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeMode {
    /// Only row 0 is seeded. Each step writes the next row from the one above
    /// it, and the run ends once the last row is written.
    #[default]
    RowSweep,
    /// Every row is rewritten from the row above it, wrapping top to bottom.
    TorusRows,
    /// Classic Game of Life on a torus with the Moore neighborhood.
    Conway,
}

/// A grid of cells driven by one of the [`LifeMode`]s.
#[derive(Debug, Clone)]
pub struct Automaton {
    cells: Grid<CellState>,
    mode: LifeMode,
    rule: RuleTable,
    generation: u64,
    /// Last row written by the row sweep.
    current_row: usize,
    running: bool,
}

impl Automaton {
    /// Creates a randomly seeded automaton.
    pub fn new<R: Rng + ?Sized>(config: &LifeConfig, rng: &mut R) -> Self {
        let fraction = unit_fraction(config.initial_fraction_alive);
        let mode = config.mode;
        let cells = Grid::from_generator(config.width, config.height, |_, y| {
            let seeded = mode != LifeMode::RowSweep || y == 0;
            CellState::from_alive(seeded && rng.random_bool(fraction))
        });
        tracing::info!(
            width = config.width,
            height = config.height,
            ?mode,
            rule = config.rule,
            "seeded automaton"
        );
        Self::from_cells(cells, mode, RuleTable::new(config.rule))
    }

    /// Seeds from the config's seed, drawing one when it has none.
    pub fn from_config(config: &LifeConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(resolve_seed(config.seed));
        Self::new(config, &mut rng)
    }

    /// Wraps an existing generation.
    pub fn from_cells(cells: Grid<CellState>, mode: LifeMode, rule: RuleTable) -> Self {
        Self {
            cells,
            mode,
            rule,
            generation: 0,
            current_row: 0,
            running: true,
        }
    }

    pub fn cells(&self) -> &Grid<CellState> {
        &self.cells
    }

    pub fn mode(&self) -> LifeMode {
        self.mode
    }

    pub fn rule(&self) -> RuleTable {
        self.rule
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of live cells.
    pub fn population(&self) -> usize {
        self.cells.iter().filter(|c| c.is_alive()).count()
    }

    pub fn row(&self, y: usize) -> Vec<CellState> {
        (0..self.cells.width())
            .filter_map(|x| self.cells.get(x, y).copied())
            .collect()
    }

    /// Advances one generation. Returns `false` once the automaton has stopped.
    pub fn step(&mut self) -> bool {
        if !self.running {
            return false;
        }
        match self.mode {
            LifeMode::RowSweep => self.step_row_sweep(),
            LifeMode::TorusRows => self.step_torus_rows(),
            LifeMode::Conway => self.step_conway(),
        }
        if self.running {
            self.generation += 1;
        }
        self.running
    }

    /// Next state of the cell below `(x, parent_row)`, wrapping horizontally.
    fn from_parents(&self, x: usize, parent_row: usize) -> CellState {
        let width = self.cells.width();
        let left = self.cells[Position::new((x + width - 1) % width, parent_row)];
        let center = self.cells[Position::new(x, parent_row)];
        let right = self.cells[Position::new((x + 1) % width, parent_row)];
        self.rule.next_state(left, center, right)
    }

    fn step_row_sweep(&mut self) {
        let next_row = self.current_row + 1;
        if next_row >= self.cells.height() {
            self.running = false;
            return;
        }

        let next: Vec<CellState> = (0..self.cells.width())
            .map(|x| self.from_parents(x, self.current_row))
            .collect();
        for (x, state) in next.into_iter().enumerate() {
            self.cells[Position::new(x, next_row)] = state;
        }
        self.current_row = next_row;
    }

    fn step_torus_rows(&mut self) {
        let height = self.cells.height();
        let next = Grid::from_generator(self.cells.width(), height, |x, y| {
            self.from_parents(x, (y + height - 1) % height)
        });
        self.cells = next;
    }

    fn step_conway(&mut self) {
        let next = Grid::from_generator(self.cells.width(), self.cells.height(), |x, y| {
            let position = Position::new(x, y);
            let live_neighbors = self
                .cells
                .neighbor_positions(position, Neighborhood::Moore, Topology::Torus)
                .into_iter()
                .filter(|p| self.cells[*p].is_alive())
                .count();
            conway_rule(self.cells[position], live_neighbors)
        });
        self.cells = next;
    }
}
