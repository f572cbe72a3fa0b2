//! Bounded one-dimensional minimization.
//!
//! Brent's method on a closed interval: parabolic interpolation with a
//! golden-section fallback. Unlike the textbook routine, the search starts
//! from a caller-supplied point so that several starts can be compared.

use thiserror::Error;

const GOLDEN_MEAN: f64 = 0.381_966_011_250_105_1;

/// Why a minimization attempt did not produce a usable minimum.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    /// The bracket is empty, inverted or not finite.
    #[error("invalid bounds [{lower}, {upper}]")]
    InvalidBounds { lower: f64, upper: f64 },

    /// The objective returned NaN, or never left infinity.
    #[error("objective is not finite at x={x}")]
    NonFinite { x: f64 },

    /// The iteration budget ran out before the bracket shrank to tolerance.
    #[error("no convergence after {iterations} evaluations")]
    MaxIterations { iterations: u32 },
}

/// A converged minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimum {
    pub x: f64,
    pub value: f64,
    /// Objective evaluations used.
    pub evaluations: u32,
}

/// Settings for [`minimize_bounded`].
#[derive(Debug, Clone, Copy)]
pub struct BoundedOptions {
    /// Absolute tolerance on `x`.
    pub tolerance: f64,
    /// Objective evaluations allowed before giving up.
    pub max_evaluations: u32,
}

impl Default for BoundedOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_evaluations: 100,
        }
    }
}

/// Minimize `f` on `[lower, upper]`, starting the search from `start`.
///
/// `start` is clamped into the bracket. Infinite objective values are
/// allowed (they simply lose every comparison); NaN aborts the attempt.
pub fn minimize_bounded<F>(
    f: F,
    lower: f64,
    upper: f64,
    start: f64,
    options: BoundedOptions,
) -> Result<Minimum, OptimizeError>
where
    F: Fn(f64) -> f64,
{
    if !(lower.is_finite() && upper.is_finite()) || lower >= upper {
        return Err(OptimizeError::InvalidBounds { lower, upper });
    }

    let sqrt_eps = f64::EPSILON.sqrt();
    let (mut a, mut b) = (lower, upper);

    let start = if start.is_finite() {
        start.clamp(lower, upper)
    } else {
        lower + GOLDEN_MEAN * (upper - lower)
    };

    // x: best point so far, w: second best, v: previous value of w.
    let mut x = start;
    let mut fx = f(x);
    let mut evaluations = 1u32;
    if fx.is_nan() {
        return Err(OptimizeError::NonFinite { x });
    }
    let (mut w, mut fw) = (x, fx);
    let (mut v, mut fv) = (x, fx);

    let mut step = 0.0f64;
    let mut prev_step = 0.0f64;

    let mut midpoint = 0.5 * (a + b);
    let mut tol1 = sqrt_eps * x.abs() + options.tolerance / 3.0;
    let mut tol2 = 2.0 * tol1;

    while (x - midpoint).abs() > tol2 - 0.5 * (b - a) {
        if evaluations >= options.max_evaluations {
            return Err(OptimizeError::MaxIterations {
                iterations: evaluations,
            });
        }

        let mut golden = true;

        if prev_step.abs() > tol1 {
            // Try a parabola through x, w and v.
            let r = (x - w) * (fx - fv);
            let q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            let mut q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let older = prev_step;
            prev_step = step;

            if p.abs() < (0.5 * q * older).abs() && p > q * (a - x) && p < q * (b - x) {
                step = p / q;
                let u = x + step;
                if (u - a) < tol2 || (b - u) < tol2 {
                    step = tol1 * sign_or_one(midpoint - x);
                }
                golden = false;
            }
        }

        if golden {
            prev_step = if x >= midpoint { a - x } else { b - x };
            step = GOLDEN_MEAN * prev_step;
        }

        let u = x + sign_or_one(step) * step.abs().max(tol1);
        let fu = f(u);
        evaluations += 1;
        if fu.is_nan() {
            return Err(OptimizeError::NonFinite { x: u });
        }

        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            fv = fw;
            w = x;
            fw = fx;
            x = u;
            fx = fu;
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                fv = fw;
                w = u;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }

        midpoint = 0.5 * (a + b);
        tol1 = sqrt_eps * x.abs() + options.tolerance / 3.0;
        tol2 = 2.0 * tol1;
    }

    if !fx.is_finite() {
        return Err(OptimizeError::NonFinite { x });
    }

    Ok(Minimum {
        x,
        value: fx,
        evaluations,
    })
}

#[inline]
fn sign_or_one(value: f64) -> f64 {
    if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}
