use serde::{Deserialize, Serialize};

/// Charge of a fully charged battery.
pub const MAX_CHARGE: u32 = 100;

/// A bounded charge level in `[0, MAX_CHARGE]`.
///
/// Adjustments clamp silently instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Battery {
    level: u32,
}

impl Default for Battery {
    fn default() -> Self {
        Self::full()
    }
}

impl Battery {
    /// Creates a battery at `level`, clamped to `MAX_CHARGE`.
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(MAX_CHARGE),
        }
    }

    pub fn full() -> Self {
        Self { level: MAX_CHARGE }
    }

    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// An empty battery can neither move nor clean.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.level == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.level >= MAX_CHARGE
    }

    /// Drains `amount`, stopping at zero.
    pub fn consume(&mut self, amount: u32) {
        self.level = self.level.saturating_sub(amount);
    }

    /// Adds `amount`, stopping at `MAX_CHARGE`.
    pub fn recharge(&mut self, amount: u32) {
        self.level = self.level.saturating_add(amount).min(MAX_CHARGE);
    }
}
