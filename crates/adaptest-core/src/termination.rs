//! Stopping rules evaluated after every answer.
//!
//! Rules are checked in a fixed order and the first one that applies wins:
//! hard cap, coverage gate, precision, relaxed precision after a buffer.
//! The coverage gate overrides both precision rules.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CatConfig;
use crate::model::TopicAbility;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Total answers reached `max_questions_total`.
    HardCap,
    /// Every topic reached the standard-error threshold.
    PrecisionReached,
    /// Mean standard error reached the relaxed threshold after the buffer.
    RelaxedPrecision,
    /// No eligible item remained in any topic.
    ItemsExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StopReason::HardCap => "question limit reached",
            StopReason::PrecisionReached => "precision reached",
            StopReason::RelaxedPrecision => "relaxed precision reached",
            StopReason::ItemsExhausted => "no items left",
        };
        f.write_str(label)
    }
}

/// Why a session keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinueReason {
    /// At least one topic is below `min_questions_per_topic`.
    CoverageIncomplete,
    /// Coverage is complete but neither precision rule applies.
    PrecisionNotMet,
}

/// Outcome of one evaluation of the stopping rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue(ContinueReason),
    Terminate(StopReason),
}

impl Decision {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Decision::Terminate(_))
    }
}

/// Applies the ordered stopping rules to a session's topic abilities.
#[derive(Debug, Clone)]
pub struct TerminationPolicy {
    config: CatConfig,
}

impl TerminationPolicy {
    pub fn new(config: CatConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, abilities: &[TopicAbility]) -> Decision {
        let total: u32 = abilities.iter().map(|t| t.questions_answered).sum();

        if total >= self.config.max_questions_total {
            tracing::debug!("termination: hard cap reached ({total} answered)");
            return Decision::Terminate(StopReason::HardCap);
        }

        if let Some(uncovered) = abilities
            .iter()
            .find(|t| t.questions_answered < self.config.min_questions_per_topic)
        {
            tracing::debug!(
                "termination: topic '{}' has {} of {} required answers",
                uncovered.topic,
                uncovered.questions_answered,
                self.config.min_questions_per_topic
            );
            return Decision::Continue(ContinueReason::CoverageIncomplete);
        }

        if abilities.is_empty() {
            return Decision::Continue(ContinueReason::PrecisionNotMet);
        }

        let threshold = self.config.standard_error_threshold;
        if abilities.iter().all(|t| t.standard_error <= threshold) {
            tracing::debug!("termination: every topic at SE <= {threshold}");
            return Decision::Terminate(StopReason::PrecisionReached);
        }

        let buffer_target = abilities.len() as u64 * self.config.min_questions_per_topic as u64
            + self.config.relaxed_buffer as u64;
        let mean_se =
            abilities.iter().map(|t| t.standard_error).sum::<f64>() / abilities.len() as f64;
        let relaxed = threshold * self.config.relaxed_threshold_factor;
        if total as u64 >= buffer_target && mean_se <= relaxed {
            tracing::debug!("termination: mean SE {mean_se:.3} <= {relaxed:.3} after {total} answers");
            return Decision::Terminate(StopReason::RelaxedPrecision);
        }

        Decision::Continue(ContinueReason::PrecisionNotMet)
    }
}
