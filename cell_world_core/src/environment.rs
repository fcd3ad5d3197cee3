use std::collections::{BTreeMap, HashSet};

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    CellKind, EntityId, Position,
    agent::{Cleaner, PriorityCleaner, WanderingCleaner},
    battery::Battery,
    config::{CleaningConfig, PolicyConfig, Variant, resolve_seed, unit_fraction},
    manhattan_distance,
    map::{Grid, GridError, GridQuery, Neighborhood, Topology},
    pathfinding::astar_path,
    stats::{self, CleanerReport, Snapshot},
};

/// Where the single-station variants put their charger.
pub const FIXED_STATION: Position = Position { x: 1, y: 1 };

/// Errors raised while building a world.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("Cannot place a cleaner on an obstacle at {0:?}.")]
    Obstacle(Position),
    #[error("Position {0:?} is already occupied by a cleaner.")]
    Occupied(Position),
    #[error("Home charger {0:?} is not a charging station.")]
    NotACharger(Position),
    #[error("Map string is empty.")]
    EmptyMap,
    #[error("Map has zero width.")]
    ZeroWidth,
    #[error("Inconsistent width at row {row}: expected {expected}, found {found}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown map code '{code}' at position ({x}, {y}).")]
    UnknownCode { code: String, x: usize, y: usize },
}

/// Represents actions a cleaner can decide to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Wait,
    Clean,
    Recharge,
    /// Step onto an adjacent free cell.
    MoveTo(Position),
}

/// Represents the outcome of processing a cleaner's action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Success,
    /// The cleaner chose to wait.
    Idle,
    Failure(String),
}

/// Where a run stands after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnStatus {
    Running,
    /// No dirty cell is left.
    AllClean,
    /// The configured number of ticks has run.
    OutOfSteps,
    /// A whole tick passed without any cleaner acting. Nothing changed, so no
    /// later tick could change anything either.
    Stalled,
}

/// Holds the state of a cleaner within the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanerState {
    pub id: EntityId,
    pub position: Position,
    pub battery: Battery,
    pub move_count: u64,
    pub cleaned_count: u64,
    /// Every cell the cleaner has stood on, the current one included.
    pub visited: HashSet<Position>,
    pub home_charger: Position,
}

impl CleanerState {
    fn report(&self) -> CleanerReport {
        CleanerReport {
            id: self.id,
            position: self.position,
            battery: self.battery.level(),
            move_count: self.move_count,
            cleaned_count: self.cleaned_count,
            visited_cells: self.visited.len(),
        }
    }
}

/// Provides a read-only view of the environment relevant to a cleaner.
#[derive(Debug)]
pub struct EnvironmentView<'a> {
    pub cleaner: &'a CleanerState,
    pub terrain: &'a Grid<CellKind>,
    /// Number of cleaners standing on each cell.
    pub cleaner_counts: &'a Grid<usize>,
    pub policy: &'a PolicyConfig,
    pub neighborhood: Neighborhood,
    pub topology: Topology,
}

impl EnvironmentView<'_> {
    #[inline]
    pub fn location(&self) -> Position {
        self.cleaner.position
    }

    pub fn is_dirty(&self, position: Position) -> bool {
        self.terrain
            .get(position.x, position.y)
            .is_some_and(CellKind::is_dirty)
    }

    /// Any charger will do, not only the home one.
    pub fn at_charger(&self) -> bool {
        self.terrain[self.location()].is_charger()
    }

    pub fn distance_home(&self, from: Position) -> usize {
        manhattan_distance(from, self.cleaner.home_charger)
    }

    /// Charge is at the low threshold, or barely covers the trip home.
    pub fn needs_charge(&self) -> bool {
        let level = self.cleaner.battery.level() as usize;
        level <= self.policy.low_threshold as usize
            || level <= self.distance_home(self.location()) + self.policy.safety_margin as usize
    }
}

impl GridQuery for EnvironmentView<'_> {
    fn is_valid(&self, position: Position) -> bool {
        self.terrain.contains(position)
    }

    fn neighbors(&self, position: Position) -> Vec<Position> {
        free_neighbors(
            self.terrain,
            self.cleaner_counts,
            self.policy.avoid_cleaners,
            self.neighborhood,
            self.topology,
            position,
        )
    }
}

/// Neighbors that are not obstacles and, when `avoid_cleaners` is set, hold no cleaner.
fn free_neighbors(
    terrain: &Grid<CellKind>,
    cleaner_counts: &Grid<usize>,
    avoid_cleaners: bool,
    neighborhood: Neighborhood,
    topology: Topology,
    position: Position,
) -> Vec<Position> {
    terrain
        .neighbor_positions(position, neighborhood, topology)
        .into_iter()
        .filter(|p| !terrain[*p].is_obstacle())
        .filter(|p| !avoid_cleaners || cleaner_counts[*p] == 0)
        .collect()
}

/// Manages the cleaning simulation.
pub struct Environment {
    terrain: Grid<CellKind>,
    cleaner_counts: Grid<usize>,
    cleaners: BTreeMap<EntityId, CleanerState>,
    behaviors: BTreeMap<EntityId, Box<dyn Cleaner>>,
    next_entity_id: EntityId,
    policy: PolicyConfig,
    neighborhood: Neighborhood,
    topology: Topology,
    shuffle_order: bool,
    max_steps: u64,
    seed: u64,
    rng: StdRng,
    step: u64,
    move_count: u64,
    initial_dirty: usize,
    remaining_dirty: usize,
    time_to_clean: Option<u64>,
    status: TurnStatus,
}

impl Environment {
    /// Creates an all-floor world of the given size with the config's rules and seed.
    pub fn new(width: usize, height: usize, config: &CleaningConfig) -> Self {
        let seed = resolve_seed(config.seed);
        Environment {
            terrain: Grid::new(width, height),
            cleaner_counts: Grid::new(width, height),
            cleaners: BTreeMap::new(),
            behaviors: BTreeMap::new(),
            next_entity_id: 0,
            policy: config.policy(),
            neighborhood: config.neighborhood,
            topology: config.topology,
            shuffle_order: config.shuffle_order,
            max_steps: config.max_steps,
            seed,
            rng: StdRng::seed_from_u64(seed),
            step: 0,
            move_count: 0,
            initial_dirty: 0,
            remaining_dirty: 0,
            time_to_clean: None,
            status: TurnStatus::Running,
        }
    }

    /// Builds a random world for the configured variant.
    ///
    /// Requested counts that do not fit are clamped to the free cells left.
    pub fn generate(config: &CleaningConfig) -> Self {
        let mut environment = Self::new(config.width, config.height, config);
        let total_cells = environment.terrain.len();
        let mut free: Vec<Position> = environment.terrain.enumerate().map(|(p, _)| p).collect();

        let station = (config.variant.has_fixed_station() && total_cells > 0).then(|| Position {
            x: FIXED_STATION.x.min(config.width - 1),
            y: FIXED_STATION.y.min(config.height - 1),
        });
        if let Some(station) = station {
            environment.terrain[station] = CellKind::Charger;
            free.retain(|p| *p != station);
        }

        let wanted = fraction_of(total_cells, config.obstacle_percent);
        for position in take_random(&mut free, wanted, &mut environment.rng, "obstacles") {
            environment.terrain[position] = CellKind::Obstacle;
        }

        let starts = match station {
            Some(station) => vec![station],
            None => {
                let wanted = config.requested_cleaners();
                take_random(&mut free, wanted, &mut environment.rng, "cleaners")
            }
        };
        for start in starts {
            environment.terrain[start] = CellKind::Charger;
            environment.insert_cleaner(
                start,
                behavior_for(config.variant),
                Battery::full(),
                start,
            );
        }

        let wanted = fraction_of(total_cells, config.dirty_percent);
        for position in take_random(&mut free, wanted, &mut environment.rng, "dirty cells") {
            environment.terrain[position] = CellKind::Patch { dirty: true };
            environment.initial_dirty += 1;
        }
        environment.remaining_dirty = environment.initial_dirty;

        info!(
            variant = ?config.variant,
            width = config.width,
            height = config.height,
            cleaners = environment.cleaners.len(),
            dirty = environment.initial_dirty,
            seed = environment.seed,
            "generated cleaning world"
        );
        environment
    }

    /// Generates a unique entity ID for cleaners.
    pub fn reserve_entity_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    /// Replaces the kind of a cell, keeping the dirt counters in step.
    pub fn set_cell(&mut self, position: Position, kind: CellKind) -> Result<(), WorldError> {
        let previous = *self
            .terrain
            .get(position.x, position.y)
            .ok_or(GridError::OutOfBounds {
                x: position.x,
                y: position.y,
                width: self.terrain.width(),
                height: self.terrain.height(),
            })?;
        if kind.is_obstacle() && self.cleaner_counts[position] > 0 {
            return Err(WorldError::Occupied(position));
        }
        if previous.is_dirty() {
            self.initial_dirty -= 1;
            self.remaining_dirty -= 1;
        }
        if kind.is_dirty() {
            self.initial_dirty += 1;
            self.remaining_dirty += 1;
        }
        self.terrain.set(position.x, position.y, kind)?;
        Ok(())
    }

    /// Adds a cleaner homed on the charger at `home_charger`.
    pub fn add_cleaner(
        &mut self,
        position: Position,
        behavior: Box<dyn Cleaner>,
        battery: Battery,
        home_charger: Position,
    ) -> Result<EntityId, WorldError> {
        let out_of_bounds = |p: Position| GridError::OutOfBounds {
            x: p.x,
            y: p.y,
            width: self.terrain.width(),
            height: self.terrain.height(),
        };
        let kind = *self
            .terrain
            .get(position.x, position.y)
            .ok_or_else(|| out_of_bounds(position))?;
        let home_kind = *self
            .terrain
            .get(home_charger.x, home_charger.y)
            .ok_or_else(|| out_of_bounds(home_charger))?;

        if kind.is_obstacle() {
            return Err(WorldError::Obstacle(position));
        }
        if self.policy.avoid_cleaners && self.cleaner_counts[position] > 0 {
            return Err(WorldError::Occupied(position));
        }
        if !home_kind.is_charger() {
            return Err(WorldError::NotACharger(home_charger));
        }

        Ok(self.insert_cleaner(position, behavior, battery, home_charger))
    }

    fn insert_cleaner(
        &mut self,
        position: Position,
        behavior: Box<dyn Cleaner>,
        battery: Battery,
        home_charger: Position,
    ) -> EntityId {
        let id = self.reserve_entity_id();
        let state = CleanerState {
            id,
            position,
            battery,
            move_count: 0,
            cleaned_count: 0,
            visited: HashSet::from([position]),
            home_charger,
        };
        self.cleaner_counts[position] += 1;
        self.cleaners.insert(id, state);
        self.behaviors.insert(id, behavior);
        id
    }

    /// Processes one tick: every cleaner acts once.
    pub fn process_turn(&mut self) -> TurnStatus {
        if self.status != TurnStatus::Running {
            return self.status;
        }
        self.step += 1;

        let mut order: Vec<EntityId> = self.cleaners.keys().copied().collect();
        if self.shuffle_order {
            order.shuffle(&mut self.rng);
        }

        let mut anyone_acted = false;
        for cleaner_id in order {
            let action = self.decide(cleaner_id);
            match self.process_action(cleaner_id, action) {
                ActionResult::Success => anyone_acted = true,
                ActionResult::Idle => {}
                ActionResult::Failure(reason) => {
                    warn!(cleaner_id, ?action, %reason, "action rejected");
                }
            }
        }

        self.status = if self.remaining_dirty == 0 {
            self.time_to_clean.get_or_insert(self.step);
            TurnStatus::AllClean
        } else if self.step >= self.max_steps {
            TurnStatus::OutOfSteps
        } else if !anyone_acted {
            TurnStatus::Stalled
        } else {
            TurnStatus::Running
        };

        if self.status != TurnStatus::Running {
            info!(
                step = self.step,
                status = ?self.status,
                remaining_dirty = self.remaining_dirty,
                moves = self.move_count,
                "simulation finished"
            );
        }
        self.status
    }

    /// Runs ticks until the simulation stops.
    pub fn run_to_completion(&mut self) -> TurnStatus {
        while self.process_turn() == TurnStatus::Running {}
        self.status
    }

    fn decide(&mut self, cleaner_id: EntityId) -> Action {
        let (Some(cleaner), Some(behavior)) = (
            self.cleaners.get(&cleaner_id),
            self.behaviors.get_mut(&cleaner_id),
        ) else {
            return Action::Wait;
        };
        let view = EnvironmentView {
            cleaner,
            terrain: &self.terrain,
            cleaner_counts: &self.cleaner_counts,
            policy: &self.policy,
            neighborhood: self.neighborhood,
            topology: self.topology,
        };
        behavior.decide(&view, &mut self.rng)
    }

    /// Processes a single action for a given cleaner.
    pub fn process_action(&mut self, cleaner_id: EntityId, action: Action) -> ActionResult {
        let cleaner = match self.cleaners.get_mut(&cleaner_id) {
            Some(state) => state,
            None => return ActionResult::Failure(format!("Cleaner {} not found.", cleaner_id)),
        };
        let position = cleaner.position;

        match action {
            Action::Wait => ActionResult::Idle,
            Action::Clean => {
                if cleaner.battery.is_empty() {
                    return ActionResult::Failure("Battery is empty.".to_string());
                }
                if !self.terrain[position].is_dirty() {
                    return ActionResult::Failure("Nothing to clean here.".to_string());
                }
                self.terrain[position] = CellKind::Patch { dirty: false };
                cleaner.battery.consume(1);
                cleaner.cleaned_count += 1;
                self.remaining_dirty = self.remaining_dirty.saturating_sub(1);
                debug!(cleaner_id, ?position, remaining = self.remaining_dirty, "cleaned");
                ActionResult::Success
            }
            Action::Recharge => {
                if !self.terrain[position].is_charger() {
                    return ActionResult::Failure("Not on a charging station.".to_string());
                }
                if cleaner.battery.is_full() {
                    return ActionResult::Failure("Battery is already full.".to_string());
                }
                cleaner.battery.recharge(self.policy.recharge_rate);
                debug!(cleaner_id, battery = cleaner.battery.level(), "recharged");
                ActionResult::Success
            }
            Action::MoveTo(target) => {
                if cleaner.battery.is_empty() {
                    return ActionResult::Failure("Battery is empty.".to_string());
                }
                let reachable = free_neighbors(
                    &self.terrain,
                    &self.cleaner_counts,
                    self.policy.avoid_cleaners,
                    self.neighborhood,
                    self.topology,
                    position,
                );
                if !reachable.contains(&target) {
                    return ActionResult::Failure(format!(
                        "{:?} is not a free neighbor of {:?}.",
                        target, position
                    ));
                }

                self.cleaner_counts[position] -= 1;
                self.cleaner_counts[target] += 1;
                cleaner.position = target;
                cleaner.battery.consume(1);
                cleaner.move_count += 1;
                cleaner.visited.insert(target);
                self.move_count += 1;
                debug!(cleaner_id, from = ?position, to = ?target, "moved");
                ActionResult::Success
            }
        }
    }

    /// Exact 4-connected route between two cells, going around obstacles.
    ///
    /// Pure helper over the current terrain; cleaners do not use it.
    pub fn shortest_path(&self, from: Position, to: Position) -> Option<Vec<Position>> {
        let valid: HashSet<Position> = self.terrain.enumerate().map(|(p, _)| p).collect();
        astar_path(
            from,
            to,
            &valid,
            |p| self.terrain[p].is_obstacle(),
            None,
        )
    }

    /// World-wide figures for the current tick.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            step: self.step,
            initial_dirty: self.initial_dirty,
            remaining_dirty: self.remaining_dirty,
            clean_percent: stats::clean_percent(self.initial_dirty, self.remaining_dirty),
            move_count: self.move_count,
            avg_battery: stats::average(self.cleaners.values().map(|c| c.battery.level())),
            cleaners: self.cleaners.values().map(CleanerState::report).collect(),
        }
    }

    pub fn terrain(&self) -> &Grid<CellKind> {
        &self.terrain
    }
    pub fn cleaners(&self) -> impl Iterator<Item = &CleanerState> {
        self.cleaners.values()
    }
    pub fn get_cleaner_state(&self, cleaner_id: EntityId) -> Option<&CleanerState> {
        self.cleaners.get(&cleaner_id)
    }
    /// The lowest-id cleaner standing on `position`, if any.
    pub fn cleaner_at(&self, position: Position) -> Option<EntityId> {
        self.cleaners
            .values()
            .find(|c| c.position == position)
            .map(|c| c.id)
    }
    pub fn status(&self) -> TurnStatus {
        self.status
    }
    pub fn step(&self) -> u64 {
        self.step
    }
    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }
    pub fn seed(&self) -> u64 {
        self.seed
    }
    pub fn move_count(&self) -> u64 {
        self.move_count
    }
    pub fn initial_dirty(&self) -> usize {
        self.initial_dirty
    }
    pub fn remaining_dirty(&self) -> usize {
        self.remaining_dirty
    }
    /// Tick at which the last dirty cell was cleaned.
    pub fn time_to_clean(&self) -> Option<u64> {
        self.time_to_clean
    }
    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }
}

/// The behavior each variant runs its cleaners with.
pub fn behavior_for(variant: Variant) -> Box<dyn Cleaner> {
    match variant {
        Variant::SingleStation | Variant::MultiStation => Box::new(PriorityCleaner::new()),
        Variant::Baseline => Box::new(WanderingCleaner::new()),
    }
}

fn fraction_of(total: usize, fraction: f64) -> usize {
    (total as f64 * unit_fraction(fraction)).floor() as usize
}

/// Removes up to `count` uniformly chosen positions from `pool`.
fn take_random(
    pool: &mut Vec<Position>,
    count: usize,
    rng: &mut StdRng,
    what: &str,
) -> Vec<Position> {
    if count > pool.len() {
        warn!(requested = count, available = pool.len(), what, "clamping to free cells");
    }
    let count = count.min(pool.len());
    (0..count)
        .map(|_| {
            let index = rng.random_range(0..pool.len());
            pool.swap_remove(index)
        })
        .collect()
}

/// Loads a cleaning world from a string representation of a map.
///
/// Tokens are whitespace separated, one row per line:
///
/// | token | cell |
/// |-------|------|
/// | `FL`  | floor |
/// | `OB`  | obstacle |
/// | `DT`  | dirty patch |
/// | `CH`  | charging station |
/// | `CR`  | charging station with a cleaner homed on it |
///
/// Cleaners start with a full battery and run the variant's behavior.
pub fn load_environment_from_string(
    map_string: &str,
    config: &CleaningConfig,
) -> Result<Environment, WorldError> {
    let lines: Vec<&str> = map_string.trim().lines().collect();
    if lines.is_empty() {
        return Err(WorldError::EmptyMap);
    }

    let height = lines.len();
    let mut width = 0;
    let mut parsed_rows: Vec<Vec<&str>> = Vec::with_capacity(height);

    for (y, line) in lines.iter().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if y == 0 {
            width = tokens.len();
            if width == 0 {
                return Err(WorldError::ZeroWidth);
            }
        } else if tokens.len() != width {
            return Err(WorldError::RaggedRow {
                row: y,
                expected: width,
                found: tokens.len(),
            });
        }
        parsed_rows.push(tokens);
    }

    let mut environment = Environment::new(width, height, config);
    let mut homes = Vec::new();

    for (y, row_tokens) in parsed_rows.iter().enumerate() {
        for (x, token) in row_tokens.iter().enumerate() {
            let pos = Position { x, y };
            let kind = match *token {
                "FL" => CellKind::Floor,
                "OB" => CellKind::Obstacle,
                "DT" => CellKind::Patch { dirty: true },
                "CH" => CellKind::Charger,
                "CR" => {
                    homes.push(pos);
                    CellKind::Charger
                }
                unknown => {
                    return Err(WorldError::UnknownCode {
                        code: unknown.to_string(),
                        x,
                        y,
                    });
                }
            };
            environment.set_cell(pos, kind)?;
        }
    }

    for home in homes {
        environment.add_cleaner(home, behavior_for(config.variant), Battery::full(), home)?;
    }

    info!(
        width,
        height,
        cleaners = environment.cleaners.len(),
        dirty = environment.initial_dirty,
        "loaded cleaning world from map"
    );
    Ok(environment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seeded(variant: Variant, seed: u64) -> CleaningConfig {
        CleaningConfig {
            seed: Some(seed),
            ..CleaningConfig::for_variant(variant)
        }
    }

    fn count(environment: &Environment, predicate: impl Fn(&CellKind) -> bool) -> usize {
        environment.terrain().iter().filter(|k| predicate(*k)).count()
    }

    #[test]
    fn single_station_world_layout() {
        let environment = Environment::generate(&seeded(Variant::SingleStation, 1));
        assert_eq!(environment.terrain()[FIXED_STATION], CellKind::Charger);
        assert_eq!(count(&environment, CellKind::is_charger), 1);
        assert_eq!(count(&environment, CellKind::is_obstacle), 10);
        assert_eq!(count(&environment, CellKind::is_dirty), 40);
        assert_eq!(environment.initial_dirty(), 40);

        let cleaners: Vec<&CleanerState> = environment.cleaners().collect();
        assert_eq!(cleaners.len(), 1);
        assert_eq!(cleaners[0].position, FIXED_STATION);
        assert_eq!(cleaners[0].home_charger, FIXED_STATION);
        assert_eq!(cleaners[0].battery, Battery::full());
    }

    #[test]
    fn multi_station_homes_every_cleaner_on_its_own_charger() {
        let environment = Environment::generate(&seeded(Variant::MultiStation, 2));
        let cleaners: Vec<&CleanerState> = environment.cleaners().collect();
        assert_eq!(cleaners.len(), 3);
        assert_eq!(count(&environment, CellKind::is_charger), 3);
        for cleaner in cleaners {
            assert_eq!(cleaner.position, cleaner.home_charger);
            assert!(environment.terrain()[cleaner.position].is_charger());
        }
    }

    #[test]
    fn oversized_requests_are_clamped() {
        let config = CleaningConfig {
            width: 3,
            height: 3,
            num_agents: 20,
            obstacle_percent: 0.5,
            dirty_percent: 1.0,
            ..seeded(Variant::MultiStation, 3)
        };
        let environment = Environment::generate(&config);
        // 4 obstacles, the other 5 cells all become chargers.
        assert_eq!(count(&environment, CellKind::is_obstacle), 4);
        assert_eq!(environment.cleaners().count(), 5);
        assert_eq!(environment.initial_dirty(), 0);
    }

    #[test]
    fn tiny_single_station_grid_clamps_charger() {
        let config = CleaningConfig {
            width: 1,
            height: 1,
            ..seeded(Variant::SingleStation, 4)
        };
        let environment = Environment::generate(&config);
        assert_eq!(environment.terrain()[Position::new(0, 0)], CellKind::Charger);
        assert_eq!(environment.cleaners().count(), 1);
    }

    #[test]
    fn map_loader_builds_world() {
        let environment = load_environment_from_string(
            "CR FL DT\nOB DT CH",
            &seeded(Variant::SingleStation, 5),
        )
        .expect("valid map");
        assert_eq!(environment.terrain().width(), 3);
        assert_eq!(environment.terrain().height(), 2);
        assert_eq!(environment.initial_dirty(), 2);
        assert_eq!(environment.cleaner_at(Position::new(0, 0)), Some(0));
        assert_eq!(environment.terrain()[Position::new(0, 1)], CellKind::Obstacle);
    }

    #[test]
    fn map_loader_rejects_bad_input() {
        let config = seeded(Variant::SingleStation, 6);
        assert!(matches!(
            load_environment_from_string("   ", &config),
            Err(WorldError::EmptyMap)
        ));
        assert_eq!(
            load_environment_from_string("FL FL\nFL", &config).err(),
            Some(WorldError::RaggedRow {
                row: 1,
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            load_environment_from_string("FL XX", &config).err(),
            Some(WorldError::UnknownCode {
                code: "XX".to_string(),
                x: 1,
                y: 0
            })
        );
    }

    #[test]
    fn add_cleaner_validates_placement() {
        let config = seeded(Variant::MultiStation, 7);
        let mut environment =
            load_environment_from_string("CH FL OB", &config).expect("valid map");
        let behavior = || behavior_for(Variant::MultiStation);
        let home = Position::new(0, 0);

        assert_eq!(
            environment.add_cleaner(Position::new(2, 0), behavior(), Battery::full(), home),
            Err(WorldError::Obstacle(Position::new(2, 0)))
        );
        assert_eq!(
            environment.add_cleaner(Position::new(1, 0), behavior(), Battery::full(), Position::new(1, 0)),
            Err(WorldError::NotACharger(Position::new(1, 0)))
        );
        assert!(matches!(
            environment.add_cleaner(Position::new(9, 0), behavior(), Battery::full(), home),
            Err(WorldError::Grid(GridError::OutOfBounds { .. }))
        ));

        let id = environment
            .add_cleaner(Position::new(1, 0), behavior(), Battery::full(), home)
            .expect("free floor");
        assert_eq!(id, 0);
        assert_eq!(
            environment.add_cleaner(Position::new(1, 0), behavior(), Battery::full(), home),
            Err(WorldError::Occupied(Position::new(1, 0)))
        );
    }

    #[test]
    fn rejected_actions_change_nothing() {
        let config = seeded(Variant::SingleStation, 8);
        let mut environment =
            load_environment_from_string("CR FL OB", &config).expect("valid map");

        assert!(matches!(
            environment.process_action(0, Action::MoveTo(Position::new(2, 0))),
            ActionResult::Failure(_)
        ));
        assert!(matches!(
            environment.process_action(0, Action::Clean),
            ActionResult::Failure(_)
        ));
        assert!(matches!(
            environment.process_action(0, Action::Recharge),
            ActionResult::Failure(_)
        ));
        assert!(matches!(
            environment.process_action(42, Action::Wait),
            ActionResult::Failure(_)
        ));

        let cleaner = environment.get_cleaner_state(0).expect("cleaner 0");
        assert_eq!(cleaner.position, Position::new(0, 0));
        assert_eq!(cleaner.battery, Battery::full());
        assert_eq!(cleaner.move_count, 0);
    }

    #[test]
    fn move_updates_counters_and_visited() {
        let config = seeded(Variant::SingleStation, 9);
        let mut environment =
            load_environment_from_string("CR FL FL", &config).expect("valid map");
        assert_eq!(
            environment.process_action(0, Action::MoveTo(Position::new(1, 0))),
            ActionResult::Success
        );
        let cleaner = environment.get_cleaner_state(0).expect("cleaner 0");
        assert_eq!(cleaner.position, Position::new(1, 0));
        assert_eq!(cleaner.battery.level(), 99);
        assert_eq!(cleaner.move_count, 1);
        assert!(cleaner.visited.contains(&Position::new(0, 0)));
        assert!(cleaner.visited.contains(&Position::new(1, 0)));
        assert_eq!(environment.move_count(), 1);
    }

    #[test]
    fn avoiding_cleaners_blocks_occupied_cells() {
        let config = seeded(Variant::MultiStation, 11);
        let mut environment =
            load_environment_from_string("CR CR FL", &config).expect("valid map");
        let from = Position::new(0, 0);

        let avoiding = free_neighbors(
            &environment.terrain,
            &environment.cleaner_counts,
            true,
            Neighborhood::Moore,
            Topology::Bounded,
            from,
        );
        assert!(avoiding.is_empty());
        let sharing = free_neighbors(
            &environment.terrain,
            &environment.cleaner_counts,
            false,
            Neighborhood::Moore,
            Topology::Bounded,
            from,
        );
        assert_eq!(sharing, vec![Position::new(1, 0)]);

        assert!(matches!(
            environment.process_action(0, Action::MoveTo(Position::new(1, 0))),
            ActionResult::Failure(_)
        ));
        let cleaner = environment.get_cleaner_state(0).expect("cleaner 0");
        assert_eq!(cleaner.position, from);
        assert_eq!(cleaner.move_count, 0);
        assert_eq!(environment.cleaner_counts[Position::new(1, 0)], 1);
    }

    #[test]
    fn sharing_cleaners_may_stack() {
        let config = seeded(Variant::SingleStation, 12);
        let mut environment =
            load_environment_from_string("CR CR FL", &config).expect("valid map");
        assert_eq!(
            environment.process_action(0, Action::MoveTo(Position::new(1, 0))),
            ActionResult::Success
        );
        assert_eq!(environment.cleaner_counts[Position::new(1, 0)], 2);
        assert_eq!(environment.cleaner_counts[Position::new(0, 0)], 0);
        // Lowest id wins when several cleaners share a cell.
        assert_eq!(environment.cleaner_at(Position::new(1, 0)), Some(0));
    }

    #[test]
    fn shortest_path_goes_around_obstacles() {
        let config = seeded(Variant::SingleStation, 10);
        let environment = load_environment_from_string(
            "CR OB FL\nFL OB FL\nFL FL FL",
            &config,
        )
        .expect("valid map");
        let path = environment
            .shortest_path(Position::new(0, 0), Position::new(2, 0))
            .expect("reachable");
        assert_eq!(path.len(), 7);
        assert_eq!(
            environment.shortest_path(Position::new(0, 0), Position::new(1, 0)),
            None
        );
    }

    proptest! {
        #[test]
        fn battery_stays_in_bounds_over_random_runs(
            seed in any::<u64>(),
            variant in prop_oneof![
                Just(Variant::SingleStation),
                Just(Variant::MultiStation),
                Just(Variant::Baseline),
            ],
        ) {
            let config = CleaningConfig {
                width: 8,
                height: 8,
                max_steps: 150,
                ..seeded(variant, seed)
            };
            let mut environment = Environment::generate(&config);
            while environment.process_turn() == TurnStatus::Running {
                for cleaner in environment.cleaners() {
                    prop_assert!(cleaner.battery.level() <= crate::battery::MAX_CHARGE);
                    prop_assert!(cleaner.visited.contains(&cleaner.position));
                }
            }
            let snapshot = environment.snapshot();
            prop_assert!(snapshot.remaining_dirty <= snapshot.initial_dirty);
            prop_assert!(snapshot.step <= 150);
        }
    }
}
