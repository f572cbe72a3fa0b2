//! Conversion of ability estimates into reporting-friendly mastery scores.
//!
//! This transform only feeds reports and pathways; it never influences
//! item selection or termination.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::irt::sigmoid;

/// Upper end of the mastery scale.
pub const MASTERY_SCALE: u32 = 800;

/// Logistic slope applied to theta before scaling.
const MASTERY_SLOPE: f64 = 1.5;

/// Map `theta` onto `0..=scale`: `round(sigmoid(1.5 · clamp(θ, -4, 4)) · scale)`.
pub fn mastery_score(theta: f64, scale: u32) -> u32 {
    let theta = if theta.is_nan() { 0.0 } else { theta.clamp(-4.0, 4.0) };
    let raw = (sigmoid(MASTERY_SLOPE * theta) * scale as f64).round();
    raw.clamp(0.0, scale as f64) as u32
}

/// Coarse classification of a mastery score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryLevel {
    Weak,
    Partial,
    Strong,
}

impl fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasteryLevel::Weak => write!(f, "weak"),
            MasteryLevel::Partial => write!(f, "partial"),
            MasteryLevel::Strong => write!(f, "strong"),
        }
    }
}

/// Score boundaries between mastery levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasteryThresholds {
    /// Scores at or above this are at least `Partial`.
    pub partial: u32,
    /// Scores at or above this are `Strong`.
    pub strong: u32,
}

impl Default for MasteryThresholds {
    fn default() -> Self {
        Self {
            partial: 500,
            strong: 750,
        }
    }
}

impl MasteryThresholds {
    pub fn classify(&self, score: u32) -> MasteryLevel {
        if score >= self.strong {
            MasteryLevel::Strong
        } else if score >= self.partial {
            MasteryLevel::Partial
        } else {
            MasteryLevel::Weak
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_theta_is_midpoint() {
        assert_eq!(mastery_score(0.0, MASTERY_SCALE), 400);
    }

    #[test]
    fn score_is_clamped_to_scale() {
        assert_eq!(mastery_score(4.0, MASTERY_SCALE), 798);
        assert_eq!(mastery_score(100.0, MASTERY_SCALE), 798);
        assert_eq!(mastery_score(-100.0, MASTERY_SCALE), 2);
        assert_eq!(mastery_score(f64::NAN, MASTERY_SCALE), 400);
    }

    #[test]
    fn score_is_monotone() {
        let mut previous = 0;
        for step in -40..=40 {
            let score = mastery_score(step as f64 / 10.0, MASTERY_SCALE);
            assert!(score >= previous);
            previous = score;
        }
    }

    #[test]
    fn classify_uses_inclusive_lower_bounds() {
        let thresholds = MasteryThresholds::default();
        assert_eq!(thresholds.classify(499), MasteryLevel::Weak);
        assert_eq!(thresholds.classify(500), MasteryLevel::Partial);
        assert_eq!(thresholds.classify(749), MasteryLevel::Partial);
        assert_eq!(thresholds.classify(750), MasteryLevel::Strong);
    }
}
