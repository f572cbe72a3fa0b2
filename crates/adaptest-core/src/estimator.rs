//! Maximum-likelihood ability estimation with a graceful fallback chain.
//!
//! Degenerate histories (empty, all correct, all incorrect) are answered
//! directly. Everything else is a bounded minimization of the negative
//! log-likelihood from several starting points; if no start converges the
//! estimate degrades to an empirical logit of the proportion correct.

use serde::{Deserialize, Serialize};

use crate::config::CatConfig;
use crate::irt::{negative_log_likelihood, standard_error};
use crate::model::ItemParams;
use crate::optimize::{minimize_bounded, BoundedOptions, Minimum};

/// Half-width of the search window around each optimizer start.
const START_WINDOW: f64 = 2.0;

/// Which branch of the estimator produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    /// No responses yet; the prior was returned unchanged.
    Prior,
    /// Every response was correct.
    Ceiling,
    /// Every response was incorrect.
    Floor,
    /// Converged maximum-likelihood estimate.
    MaximumLikelihood,
    /// Proportion-correct logit, used when optimization failed.
    EmpiricalLogit,
}

/// An ability estimate and its standard error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityEstimate {
    pub theta: f64,
    pub standard_error: f64,
    pub method: EstimationMethod,
}

impl AbilityEstimate {
    /// Returns `true` if the estimate came from the coarse fallback.
    pub fn is_degraded(&self) -> bool {
        self.method == EstimationMethod::EmpiricalLogit
    }
}

/// Estimates a latent ability from a binary response history.
#[derive(Debug, Clone)]
pub struct AbilityEstimator {
    config: CatConfig,
}

impl AbilityEstimator {
    pub fn new(config: CatConfig) -> Self {
        Self { config }
    }

    /// Estimate theta from `responses`, where `responses[i]` answers `items[i]`.
    ///
    /// The result depends only on the multiset of (response, item) pairs;
    /// `prior_theta` is returned for an empty history and seeds the first
    /// optimizer start otherwise. Never fails.
    pub fn estimate(
        &self,
        responses: &[bool],
        items: &[ItemParams],
        prior_theta: f64,
    ) -> AbilityEstimate {
        let n = responses.len().min(items.len());
        if responses.len() != items.len() {
            tracing::warn!(
                "response/item length mismatch ({} vs {}), using first {n}",
                responses.len(),
                items.len()
            );
        }
        let (responses, items) = (&responses[..n], &items[..n]);

        if n == 0 {
            return AbilityEstimate {
                theta: prior_theta,
                standard_error: 1.0,
                method: EstimationMethod::Prior,
            };
        }

        let correct = responses.iter().filter(|&&r| r).count();
        if correct == n {
            return AbilityEstimate {
                theta: self.config.theta_max,
                standard_error: self.config.extreme_standard_error,
                method: EstimationMethod::Ceiling,
            };
        }
        if correct == 0 {
            return AbilityEstimate {
                theta: self.config.theta_min,
                standard_error: self.config.extreme_standard_error,
                method: EstimationMethod::Floor,
            };
        }

        match self.maximize_likelihood(responses, items, prior_theta) {
            Some(best) => {
                let se = standard_error(best.x, items)
                    .clamp(self.config.min_standard_error, self.config.max_standard_error);
                tracing::debug!(
                    "MLE: {correct}/{n} correct, theta={:.3}, SE={se:.3}",
                    best.x
                );
                AbilityEstimate {
                    theta: best.x,
                    standard_error: se,
                    method: EstimationMethod::MaximumLikelihood,
                }
            }
            None => {
                let estimate = self.empirical_logit(correct, n);
                tracing::warn!(
                    "MLE did not converge from any start ({correct}/{n} correct), \
                     falling back to empirical logit theta={:.3}",
                    estimate.theta
                );
                estimate
            }
        }
    }

    /// Run the bounded optimizer from every start and keep the lowest
    /// negative log-likelihood among the converged attempts.
    ///
    /// Each start searches its own window of `START_WINDOW` either side, so
    /// different starts can settle in different local minima. The bracket
    /// endpoints are then compared against the best interior minimum.
    fn maximize_likelihood(
        &self,
        responses: &[bool],
        items: &[ItemParams],
        prior_theta: f64,
    ) -> Option<Minimum> {
        let options = BoundedOptions {
            tolerance: self.config.optimizer_tolerance,
            max_evaluations: self.config.optimizer_max_iterations,
        };
        let (lower, upper) = (self.config.theta_min, self.config.theta_max);
        let objective = |theta: f64| negative_log_likelihood(theta, responses, items);

        let mut best: Option<Minimum> = None;
        for start in [prior_theta, 0.0, -1.0, 1.0] {
            let center = if start.is_finite() {
                start.clamp(lower, upper)
            } else {
                0.0
            };
            let window_lower = (center - START_WINDOW).max(lower);
            let window_upper = (center + START_WINDOW).min(upper);
            match minimize_bounded(&objective, window_lower, window_upper, center, options) {
                Ok(found) => match best {
                    Some(current) if current.value <= found.value => {}
                    _ => best = Some(found),
                },
                Err(e) => {
                    tracing::debug!("optimizer start {start:.2} failed: {e}");
                }
            }
        }

        let mut best = best?;
        for bound in [lower, upper] {
            let value = objective(bound);
            if value < best.value {
                best = Minimum {
                    x: bound,
                    value,
                    evaluations: best.evaluations + 1,
                };
            }
        }
        Some(best)
    }

    fn empirical_logit(&self, correct: usize, total: usize) -> AbilityEstimate {
        let proportion = (correct as f64 / total as f64).clamp(0.01, 0.99);
        let bound = self.config.fallback_theta_bound;
        let theta = (proportion / (1.0 - proportion)).ln().clamp(-bound, bound);
        AbilityEstimate {
            theta,
            standard_error: 1.0,
            method: EstimationMethod::EmpiricalLogit,
        }
    }
}
