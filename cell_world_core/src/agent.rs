use rand::{rngs::StdRng, seq::IndexedRandom};

use crate::{
    Position,
    config::TieBreak,
    environment::{Action, EnvironmentView},
    manhattan_distance,
    map::GridQuery,
};

/// Trait defining how a cleaner picks its action each turn.
///
/// Implementations only read the world through the [`EnvironmentView`]; the
/// environment applies the returned [`Action`]. The RNG is the simulation's
/// shared seeded source, so runs stay reproducible.
pub trait Cleaner {
    /// Determines the action to perform this turn.
    fn decide(&mut self, view: &EnvironmentView<'_>, rng: &mut StdRng) -> Action;
}

/// Cleans first, heads home when charge runs low, recharges, and otherwise
/// explores preferring dirty then unvisited cells.
#[derive(Debug, Default, Clone, Copy)]
pub struct PriorityCleaner;

impl PriorityCleaner {
    pub fn new() -> Self {
        Self
    }

    /// The free neighbor closest to the home charger.
    fn move_toward_charger(view: &EnvironmentView<'_>, rng: &mut StdRng) -> Option<Position> {
        let home = view.cleaner.home_charger;
        let candidates = view.neighbors(view.location());
        let best = candidates
            .iter()
            .map(|p| manhattan_distance(*p, home))
            .min()?;
        let mut closest = candidates
            .into_iter()
            .filter(|p| manhattan_distance(*p, home) == best);

        match view.policy.tie_break {
            TieBreak::First => closest.next(),
            TieBreak::Random => closest.collect::<Vec<_>>().choose(rng).copied(),
        }
    }

    /// A dirty neighbor, else an unvisited one, else any free neighbor.
    fn explore(view: &EnvironmentView<'_>, rng: &mut StdRng) -> Option<Position> {
        let candidates = view.neighbors(view.location());

        let dirty: Vec<Position> = candidates
            .iter()
            .copied()
            .filter(|p| view.is_dirty(*p))
            .collect();
        if let Some(target) = dirty.choose(rng) {
            return Some(*target);
        }

        let unvisited: Vec<Position> = candidates
            .iter()
            .copied()
            .filter(|p| !view.cleaner.visited.contains(p))
            .collect();
        if let Some(target) = unvisited.choose(rng) {
            return Some(*target);
        }

        candidates.choose(rng).copied()
    }
}

impl Cleaner for PriorityCleaner {
    fn decide(&mut self, view: &EnvironmentView<'_>, rng: &mut StdRng) -> Action {
        let here = view.location();
        let battery = view.cleaner.battery;

        // 1. Clean the current cell
        if view.is_dirty(here) && !battery.is_empty() {
            return Action::Clean;
        }

        // 2. Head home before the charge runs out
        if view.needs_charge() && !view.at_charger() && !battery.is_empty() {
            return Self::move_toward_charger(view, rng).map_or(Action::Wait, Action::MoveTo);
        }

        // 3. Top up while parked on a charger
        if view.at_charger() && !battery.is_full() {
            return Action::Recharge;
        }

        // 4. Explore
        if !battery.is_empty() {
            return Self::explore(view, rng).map_or(Action::Wait, Action::MoveTo);
        }

        Action::Wait
    }
}

/// Baseline cleaner: same priorities, but it never looks for dirt and heads
/// home by stepping onto any neighbor that gets it closer.
#[derive(Debug, Default, Clone, Copy)]
pub struct WanderingCleaner;

impl WanderingCleaner {
    pub fn new() -> Self {
        Self
    }

    fn drift_toward_charger(view: &EnvironmentView<'_>, rng: &mut StdRng) -> Option<Position> {
        let home = view.cleaner.home_charger;
        let current = manhattan_distance(view.location(), home);
        let candidates = view.neighbors(view.location());
        let closer: Vec<Position> = candidates
            .iter()
            .copied()
            .filter(|p| manhattan_distance(*p, home) < current)
            .collect();

        if closer.is_empty() {
            candidates.choose(rng).copied()
        } else {
            closer.choose(rng).copied()
        }
    }
}

impl Cleaner for WanderingCleaner {
    fn decide(&mut self, view: &EnvironmentView<'_>, rng: &mut StdRng) -> Action {
        let here = view.location();
        let battery = view.cleaner.battery;

        if view.is_dirty(here) && !battery.is_empty() {
            return Action::Clean;
        }
        if view.needs_charge() && !view.at_charger() && !battery.is_empty() {
            return Self::drift_toward_charger(view, rng).map_or(Action::Wait, Action::MoveTo);
        }
        if view.at_charger() && !battery.is_full() {
            return Action::Recharge;
        }
        if !battery.is_empty() {
            return view
                .neighbors(here)
                .choose(rng)
                .copied()
                .map_or(Action::Wait, Action::MoveTo);
        }
        Action::Wait
    }
}
