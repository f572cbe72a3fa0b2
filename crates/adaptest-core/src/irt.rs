//! Four-parameter logistic item response model.
//!
//! `p(θ) = c + (d - c) · σ(a(θ - b))`, with Fisher information
//! `I(θ) = p'(θ)² / (p(1 - p))`.

use crate::model::ItemParams;

/// Probability floor used when taking logarithms of response probabilities.
pub const EPSILON: f64 = 1e-10;

/// Numerically stable logistic function.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let exp_x = x.exp();
        exp_x / (1.0 + exp_x)
    }
}

/// Probability of a correct response at ability `theta`. Lies in `[c, d]`.
#[inline]
pub fn probability(theta: f64, a: f64, b: f64, c: f64, d: f64) -> f64 {
    c + (d - c) * sigmoid(a * (theta - b))
}

/// Fisher information of one item at `theta`.
///
/// Returns 0 instead of NaN or infinity when the item is saturated at
/// `theta` (`p(1 - p)` underflows) or the inputs are not finite.
pub fn information(theta: f64, a: f64, b: f64, c: f64, d: f64) -> f64 {
    let s = sigmoid(a * (theta - b));
    let p = c + (d - c) * s;
    let dp = a * (d - c) * s * (1.0 - s);
    let variance = p * (1.0 - p);

    if variance.is_nan() || variance <= 0.0 || !dp.is_finite() {
        return 0.0;
    }

    let info = dp * dp / variance;
    if info.is_finite() {
        info
    } else {
        0.0
    }
}

/// [`probability`] for resolved item parameters.
#[inline]
pub fn item_probability(theta: f64, item: &ItemParams) -> f64 {
    probability(theta, item.a, item.b, item.c, item.d)
}

/// [`information`] for resolved item parameters.
#[inline]
pub fn item_information(theta: f64, item: &ItemParams) -> f64 {
    information(theta, item.a, item.b, item.c, item.d)
}

/// Sum of item information over a set of administered items.
pub fn test_information(theta: f64, items: &[ItemParams]) -> f64 {
    items.iter().map(|item| item_information(theta, item)).sum()
}

/// Standard error of estimation: `1 / sqrt(test information)`.
///
/// Infinite when the items carry no information at `theta`.
pub fn standard_error(theta: f64, items: &[ItemParams]) -> f64 {
    let info = test_information(theta, items);
    if info > 0.0 {
        1.0 / info.sqrt()
    } else {
        f64::INFINITY
    }
}

/// Negative log-likelihood of a binary response pattern at `theta`.
///
/// `responses[i]` answers `items[i]`; extra entries on either side are ignored.
pub fn negative_log_likelihood(theta: f64, responses: &[bool], items: &[ItemParams]) -> f64 {
    -responses
        .iter()
        .zip(items)
        .map(|(&correct, item)| {
            let p = item_probability(theta, item).clamp(EPSILON, 1.0 - EPSILON);
            if correct {
                p.ln()
            } else {
                (1.0 - p).ln()
            }
        })
        .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_symmetry_and_extremes() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-15);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
        assert_eq!(sigmoid(-1000.0), 0.0);
        assert_eq!(sigmoid(1000.0), 1.0);
    }

    #[test]
    fn probability_at_difficulty_is_midpoint() {
        let p = probability(0.5, 1.3, 0.5, 0.2, 0.95);
        assert!((p - (0.2 + 0.75 * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn probability_stays_between_asymptotes() {
        for step in -80..=80 {
            let theta = step as f64 / 10.0;
            let p = probability(theta, 2.0, 0.3, 0.2, 0.95);
            assert!((0.2..=0.95).contains(&p), "p={p} at theta={theta}");
        }
    }

    #[test]
    fn probability_monotone_in_theta_for_2pl() {
        for &(a, b) in &[(0.5, -1.0), (1.0, 0.0), (2.5, 1.5)] {
            let mut previous = f64::NEG_INFINITY;
            for step in -40..=40 {
                let p = probability(step as f64 / 10.0, a, b, 0.0, 1.0);
                assert!(p >= previous);
                previous = p;
            }
        }
    }

    #[test]
    fn information_matches_closed_form_for_2pl() {
        // For c=0, d=1 the information reduces to a²·p·q.
        let (a, b, theta) = (1.7, 0.4, -0.3);
        let p = probability(theta, a, b, 0.0, 1.0);
        let expected = a * a * p * (1.0 - p);
        let got = information(theta, a, b, 0.0, 1.0);
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn information_is_zero_when_saturated() {
        let info = information(4.0, 3.0, -4.0, 0.0, 1.0);
        assert!(info >= 0.0);
        assert!(info.is_finite());

        let saturated = information(40.0, 3.0, -4.0, 0.0, 1.0);
        assert_eq!(saturated, 0.0);
    }

    #[test]
    fn information_handles_non_finite_input() {
        assert_eq!(information(f64::NAN, 1.0, 0.0, 0.2, 0.95), 0.0);
        assert_eq!(information(0.0, f64::INFINITY, 0.0, 0.2, 0.95), 0.0);
    }

    #[test]
    fn information_non_negative_across_grid() {
        for step in -40..=40 {
            let theta = step as f64 / 10.0;
            let info = information(theta, 1.2, 0.0, 0.25, 0.95);
            assert!(info >= 0.0);
        }
    }

    #[test]
    fn standard_error_shrinks_with_more_items() {
        let item = ItemParams::new(1.0, 0.0, 0.2, 0.95);
        let one = standard_error(0.0, &[item]);
        let four = standard_error(0.0, &[item; 4]);
        assert!(four < one);
        assert!((one / four - 2.0).abs() < 1e-9);
        assert!(standard_error(0.0, &[]).is_infinite());
    }

    #[test]
    fn likelihood_prefers_consistent_theta() {
        let items = [ItemParams::new(1.5, 0.0, 0.0, 1.0); 2];
        let nll_high = negative_log_likelihood(2.0, &[true, true], &items);
        let nll_low = negative_log_likelihood(-2.0, &[true, true], &items);
        assert!(nll_high < nll_low);
    }
}
