//! Simulation settings.
//!
//! Everything can be loaded from a single TOML file with optional `[cleaning]`
//! and `[life]` tables. Missing keys fall back to the defaults below.

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::automaton::LifeMode;
use crate::map::{Neighborhood, Topology};

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("[{section}] grid of {width}x{height} exceeds {max} cells", max = MAX_CELLS)]
    GridTooLarge {
        section: &'static str,
        width: usize,
        height: usize,
    },
}

/// Largest grid a config file may ask for.
pub const MAX_CELLS: usize = 1 << 24;

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub cleaning: CleaningConfig,
    pub life: LifeConfig,
}

impl SimConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects grids too large to allocate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_grid("cleaning", self.cleaning.width, self.cleaning.height)?;
        check_grid("life", self.life.width, self.life.height)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn check_grid(section: &'static str, width: usize, height: usize) -> Result<(), ConfigError> {
    match width.checked_mul(height) {
        Some(cells) if cells <= MAX_CELLS => Ok(()),
        _ => Err(ConfigError::GridTooLarge {
            section,
            width,
            height,
        }),
    }
}

/// Clamps a probability into `[0, 1]`. NaN counts as zero.
pub(crate) fn unit_fraction(value: f64) -> f64 {
    if value.is_nan() {
        tracing::warn!("fraction is NaN, using 0");
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// The configured seed, or a freshly drawn one that gets logged so the run can be repeated.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        let seed = rand::rng().random();
        tracing::info!(seed, "no seed configured, drew one");
        seed
    })
}

/// Which cleaning simulation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// One cleaner and one charger fixed near the corner.
    SingleStation,
    /// Several cleaners, each starting on its own charger.
    #[default]
    MultiStation,
    /// One cleaner that wanders randomly instead of preferring dirt.
    Baseline,
}

impl Variant {
    /// Policy values each variant ships with.
    pub fn default_policy(&self) -> PolicyConfig {
        match self {
            Variant::SingleStation => PolicyConfig {
                low_threshold: 30,
                avoid_cleaners: false,
                ..PolicyConfig::default()
            },
            Variant::MultiStation => PolicyConfig {
                low_threshold: 10,
                avoid_cleaners: true,
                ..PolicyConfig::default()
            },
            Variant::Baseline => PolicyConfig {
                low_threshold: 20,
                avoid_cleaners: false,
                ..PolicyConfig::default()
            },
        }
    }

    /// Variants with a single charger placed at a fixed spot.
    pub fn has_fixed_station(&self) -> bool {
        !matches!(self, Variant::MultiStation)
    }
}

/// How to choose between equally good cells when heading to a charger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The first candidate in neighbor enumeration order.
    #[default]
    First,
    /// Uniformly among the candidates, drawn from the simulation RNG.
    Random,
}

/// Thresholds driving the cleaner's decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Head for the charger at or below this charge, whatever the distance.
    pub low_threshold: u32,
    /// Extra charge kept on top of the distance to the home charger.
    pub safety_margin: u32,
    /// Charge gained per tick spent on a charger.
    pub recharge_rate: u32,
    pub tie_break: TieBreak,
    /// Treat cells holding another cleaner as blocked.
    pub avoid_cleaners: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            low_threshold: 10,
            safety_margin: 5,
            recharge_rate: 5,
            tie_break: TieBreak::First,
            avoid_cleaners: true,
        }
    }
}

/// Policy fields given in the config file. Unset ones keep the variant's value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_margin: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recharge_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tie_break: Option<TieBreak>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avoid_cleaners: Option<bool>,
}

impl PolicyOverrides {
    pub fn apply(&self, base: PolicyConfig) -> PolicyConfig {
        PolicyConfig {
            low_threshold: self.low_threshold.unwrap_or(base.low_threshold),
            safety_margin: self.safety_margin.unwrap_or(base.safety_margin),
            recharge_rate: self.recharge_rate.unwrap_or(base.recharge_rate),
            tie_break: self.tie_break.unwrap_or(base.tie_break),
            avoid_cleaners: self.avoid_cleaners.unwrap_or(base.avoid_cleaners),
        }
    }
}

/// Cleaning world settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub variant: Variant,
    pub width: usize,
    pub height: usize,
    /// Only used by [`Variant::MultiStation`]; the other variants run one cleaner.
    pub num_agents: usize,
    /// Fraction of all cells that start dirty.
    pub dirty_percent: f64,
    /// Fraction of all cells turned into obstacles.
    pub obstacle_percent: f64,
    pub max_steps: u64,
    /// `None` draws a fresh seed at startup.
    pub seed: Option<u64>,
    pub topology: Topology,
    pub neighborhood: Neighborhood,
    /// Shuffle the cleaners' activation order every tick.
    pub shuffle_order: bool,
    /// Fields set here replace the variant's preset one by one.
    pub policy: PolicyOverrides,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            width: 10,
            height: 10,
            num_agents: 3,
            dirty_percent: 0.4,
            obstacle_percent: 0.1,
            max_steps: 500,
            seed: None,
            topology: Topology::Bounded,
            neighborhood: Neighborhood::Moore,
            shuffle_order: true,
            policy: PolicyOverrides::default(),
        }
    }
}

impl CleaningConfig {
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    /// The variant's preset with any configured fields applied on top.
    pub fn policy(&self) -> PolicyConfig {
        self.policy.apply(self.variant.default_policy())
    }

    /// Number of cleaners the variant asks for.
    pub fn requested_cleaners(&self) -> usize {
        match self.variant {
            Variant::MultiStation => self.num_agents,
            Variant::SingleStation | Variant::Baseline => 1,
        }
    }
}

/// Cellular automaton settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifeConfig {
    pub width: usize,
    pub height: usize,
    pub initial_fraction_alive: f64,
    pub mode: LifeMode,
    /// Wolfram code of the row rule.
    pub rule: u8,
    pub seed: Option<u64>,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            width: 50,
            height: 50,
            initial_fraction_alive: 0.2,
            mode: LifeMode::default(),
            rule: 90,
            seed: None,
        }
    }
}
