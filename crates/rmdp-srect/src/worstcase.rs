#![forbid(unsafe_code)]

//! Nature's side of the update: the distribution achieving the worst case
//! for a given per-action deviation.

use rmdp_runtime::{DISTRIBUTION_TOLERANCE, is_distribution};
use serde::{Deserialize, Serialize};

use crate::validation::{SrectError, SrectResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorstCase {
    pub distribution: Vec<f64>,
    /// `z · distribution`.
    pub value: f64,
}

/// Minimizes `z · p` over distributions `p` with `‖p − pbar‖₁ ≤ xi`.
///
/// Moves up to `xi / 2` mass onto the lowest-return outcome, taking it from
/// the highest-return outcomes first. Ties in `z` resolve to the lowest
/// index.
pub fn worstcase_l1(z: &[f64], pbar: &[f64], xi: f64) -> SrectResult<WorstCase> {
    if z.is_empty() || z.len() != pbar.len() {
        return Err(SrectError::ShapeMismatch {
            message: format!(
                "z has {} outcomes but pbar has {}; both must be non-empty",
                z.len(),
                pbar.len()
            ),
        });
    }
    if let Some(outcome) = z.iter().position(|v| !v.is_finite()) {
        return Err(SrectError::NonFiniteInput {
            message: format!("z[{outcome}] = {}", z[outcome]),
        });
    }
    if !is_distribution(pbar, DISTRIBUTION_TOLERANCE) {
        return Err(SrectError::InvalidDistribution {
            message: format!(
                "pbar must be non-negative and sum to 1, sums to {}",
                pbar.iter().sum::<f64>()
            ),
        });
    }
    if !xi.is_finite() || xi < 0.0 {
        return Err(SrectError::InvalidBudget { kappa: xi });
    }

    let mut order: Vec<usize> = (0..z.len()).collect();
    order.sort_by(|&a, &b| z[a].total_cmp(&z[b]).then(a.cmp(&b)));

    let mut distribution = pbar.to_vec();
    let lowest = order[0];
    let moved = (xi / 2.0).min(1.0 - distribution[lowest]).max(0.0);
    distribution[lowest] += moved;

    let mut remaining = moved;
    for &outcome in order.iter().skip(1).rev() {
        if remaining <= 0.0 {
            break;
        }
        let taken = remaining.min(distribution[outcome]);
        distribution[outcome] -= taken;
        remaining -= taken;
    }

    let value = z.iter().zip(&distribution).map(|(r, p)| r * p).sum();
    Ok(WorstCase {
        distribution,
        value,
    })
}

/// Applies [`worstcase_l1`] to every action with its own deviation budget.
///
/// `allocations` is typically [`SrectSolution::allocations`] of an unweighted
/// L1 solve; tiny negative values left by the solver are treated as zero.
///
/// [`SrectSolution::allocations`]: crate::SrectSolution::allocations
pub fn nature_response_l1(
    z: &[Vec<f64>],
    pbar: &[Vec<f64>],
    allocations: &[f64],
) -> SrectResult<Vec<WorstCase>> {
    if z.len() != pbar.len() || z.len() != allocations.len() {
        return Err(SrectError::ShapeMismatch {
            message: format!(
                "z has {} actions, pbar has {}, allocations has {}",
                z.len(),
                pbar.len(),
                allocations.len()
            ),
        });
    }
    z.iter()
        .zip(pbar)
        .zip(allocations)
        .map(|((z_row, p_row), &xi)| {
            let xi = if xi < 0.0 && xi >= -DISTRIBUTION_TOLERANCE {
                0.0
            } else {
                xi
            };
            worstcase_l1(z_row, p_row, xi)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_keeps_nominal() {
        let wc = worstcase_l1(&[4.0, 1.0], &[0.5, 0.5], 0.0).expect("valid");
        assert_eq!(wc.distribution, vec![0.5, 0.5]);
        assert!((wc.value - 2.5).abs() < 1e-12);
    }

    #[test]
    fn moves_half_budget_to_lowest_return() {
        let wc = worstcase_l1(&[1.0, 0.0], &[0.5, 0.5], 0.4).expect("valid");
        assert!((wc.distribution[0] - 0.3).abs() < 1e-12);
        assert!((wc.distribution[1] - 0.7).abs() < 1e-12);
        assert!((wc.value - 0.3).abs() < 1e-12);
    }

    #[test]
    fn drains_highest_returns_first() {
        let wc = worstcase_l1(&[3.0, 0.0, 5.0], &[0.4, 0.2, 0.4], 1.2).expect("valid");
        // 0.6 moves to outcome 1: all 0.4 from outcome 2, then 0.2 from outcome 0
        assert!((wc.distribution[0] - 0.2).abs() < 1e-12);
        assert!((wc.distribution[1] - 0.8).abs() < 1e-12);
        assert!(wc.distribution[2].abs() < 1e-12);
        assert!((wc.value - 0.6).abs() < 1e-12);
    }

    #[test]
    fn large_budget_collapses_onto_minimum() {
        let wc = worstcase_l1(&[2.0, 1.5, 7.0], &[0.2, 0.3, 0.5], 10.0).expect("valid");
        assert!((wc.value - 1.5).abs() < 1e-12);
        assert!((wc.distribution.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(matches!(
            worstcase_l1(&[1.0], &[0.5, 0.5], 0.1),
            Err(SrectError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            worstcase_l1(&[1.0, 0.0], &[0.5, 0.4], 0.1),
            Err(SrectError::InvalidDistribution { .. })
        ));
        assert!(matches!(
            worstcase_l1(&[1.0, 0.0], &[0.5, 0.5], -0.1),
            Err(SrectError::InvalidBudget { .. })
        ));
        assert!(matches!(
            worstcase_l1(&[f64::INFINITY, 0.0], &[0.5, 0.5], 0.1),
            Err(SrectError::NonFiniteInput { .. })
        ));
    }

    #[test]
    fn nature_response_clamps_solver_noise() {
        let z = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let pbar = vec![vec![0.5, 0.5], vec![0.5, 0.5]];
        let response = nature_response_l1(&z, &pbar, &[-1e-12, 0.2]).expect("valid");
        assert!((response[0].value - 0.5).abs() < 1e-12);
        assert!((response[1].value - 0.4).abs() < 1e-12);
        assert!(matches!(
            nature_response_l1(&z, &pbar, &[0.1]),
            Err(SrectError::ShapeMismatch { .. })
        ));
    }
}
