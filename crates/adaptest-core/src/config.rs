//! Engine constants and configuration loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CatError;

/// Tunable constants of the adaptive engine.
///
/// Every threshold used by estimation, selection and termination lives here
/// so that a deployment can retune the test without touching the algorithms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatConfig {
    /// Hard cap on answered items across all topics.
    pub max_questions_total: u32,
    /// Items every topic should receive before precision may stop the test.
    pub min_questions_per_topic: u32,
    /// Items after which a topic is no longer eligible for selection.
    pub max_questions_per_topic: u32,
    /// Standard error every topic must reach for a precision stop.
    pub standard_error_threshold: f64,
    /// Extra items beyond full coverage before the relaxed rule applies.
    pub relaxed_buffer: u32,
    /// Multiplier on `standard_error_threshold` for the relaxed mean-SE rule.
    pub relaxed_threshold_factor: f64,
    /// Lower bound of the ability scale.
    pub theta_min: f64,
    /// Upper bound of the ability scale.
    pub theta_max: f64,
    /// Careless-error probability; the upper asymptote is `1 - slip`.
    pub slip: f64,
    /// Guessing parameter for items that do not declare one.
    pub default_guessing: f64,
    /// Floor applied to estimated standard errors.
    pub min_standard_error: f64,
    /// Ceiling applied to estimated standard errors.
    pub max_standard_error: f64,
    /// Standard error reported for all-correct and all-incorrect histories.
    pub extreme_standard_error: f64,
    /// Bound on the empirical-logit fallback estimate.
    pub fallback_theta_bound: f64,
    /// Absolute tolerance on theta for the bounded optimizer.
    pub optimizer_tolerance: f64,
    /// Objective evaluations allowed per optimizer start.
    pub optimizer_max_iterations: u32,
    /// Re-estimate every topic after each answer instead of only the answered one.
    pub refresh_all_topics: bool,
}

impl Default for CatConfig {
    fn default() -> Self {
        Self {
            max_questions_total: 40,
            min_questions_per_topic: 3,
            max_questions_per_topic: 12,
            standard_error_threshold: 0.3,
            relaxed_buffer: 5,
            relaxed_threshold_factor: 1.2,
            theta_min: -4.0,
            theta_max: 4.0,
            slip: 0.05,
            default_guessing: 0.25,
            min_standard_error: 0.1,
            max_standard_error: 2.0,
            extreme_standard_error: 0.8,
            fallback_theta_bound: 3.0,
            optimizer_tolerance: 1e-8,
            optimizer_max_iterations: 100,
            refresh_all_topics: true,
        }
    }
}

impl CatConfig {
    /// Upper asymptote of the item characteristic curve.
    pub fn upper_asymptote(&self) -> f64 {
        1.0 - self.slip
    }

    /// Check that the constants are consistent with each other.
    pub fn validate(&self) -> Result<(), CatError> {
        let fail = |msg: String| Err(CatError::InvalidConfig(msg));

        if self.max_questions_total == 0 {
            return fail("max_questions_total must be at least 1".into());
        }
        if self.min_questions_per_topic > self.max_questions_per_topic {
            return fail(format!(
                "min_questions_per_topic ({}) exceeds max_questions_per_topic ({})",
                self.min_questions_per_topic, self.max_questions_per_topic
            ));
        }
        if !(self.theta_min.is_finite() && self.theta_max.is_finite())
            || self.theta_min >= self.theta_max
        {
            return fail(format!(
                "theta bounds [{}, {}] are not a finite, non-empty interval",
                self.theta_min, self.theta_max
            ));
        }
        if !(0.0..1.0).contains(&self.slip) {
            return fail(format!("slip must lie in [0, 1), got {}", self.slip));
        }
        if !(0.0..1.0).contains(&self.default_guessing)
            || self.default_guessing >= self.upper_asymptote()
        {
            return fail(format!(
                "default_guessing {} must lie in [0, {})",
                self.default_guessing,
                self.upper_asymptote()
            ));
        }
        if !(self.min_standard_error > 0.0 && self.min_standard_error <= self.max_standard_error)
        {
            return fail(format!(
                "standard error bounds [{}, {}] are inverted or non-positive",
                self.min_standard_error, self.max_standard_error
            ));
        }
        if self.standard_error_threshold <= 0.0 || self.relaxed_threshold_factor <= 0.0 {
            return fail("standard error thresholds must be positive".into());
        }
        if self.fallback_theta_bound <= 0.0 {
            return fail("fallback_theta_bound must be positive".into());
        }
        if self.optimizer_tolerance <= 0.0 {
            return fail("optimizer_tolerance must be positive".into());
        }

        Ok(())
    }
}

/// Defaults for batch simulations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Simulated sessions per true ability value.
    pub replications: u32,
    /// Seed for the examinee random streams.
    pub seed: u64,
    /// Maximum sessions simulated at once.
    pub parallelism: usize,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            replications: 20,
            seed: 42,
            parallelism: 4,
        }
    }
}

/// Top-level adaptest configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptestConfig {
    /// Engine constants.
    #[serde(default)]
    pub engine: CatConfig,
    /// Simulation defaults.
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./adaptest-results")
}

impl Default for AdaptestConfig {
    fn default() -> Self {
        Self {
            engine: CatConfig::default(),
            simulation: SimulationSettings::default(),
            output_dir: default_output_dir(),
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `adaptest.toml` in the current directory
/// 2. `~/.config/adaptest/config.toml`
///
/// Environment variable overrides: `ADAPTEST_SE_THRESHOLD`, `ADAPTEST_MAX_QUESTIONS`.
pub fn load_config() -> Result<AdaptestConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AdaptestConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("adaptest.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<AdaptestConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AdaptestConfig::default(),
    };

    apply_env_overrides(&mut config)?;
    config.engine.validate()?;

    Ok(config)
}

fn apply_env_overrides(config: &mut AdaptestConfig) -> Result<()> {
    if let Ok(value) = std::env::var("ADAPTEST_SE_THRESHOLD") {
        config.engine.standard_error_threshold = value
            .trim()
            .parse()
            .with_context(|| format!("invalid ADAPTEST_SE_THRESHOLD: '{value}'"))?;
    }
    if let Ok(value) = std::env::var("ADAPTEST_MAX_QUESTIONS") {
        config.engine.max_questions_total = value
            .trim()
            .parse()
            .with_context(|| format!("invalid ADAPTEST_MAX_QUESTIONS: '{value}'"))?;
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("adaptest"))
}
