#![forbid(unsafe_code)]

use rmdp_runtime::{DISTRIBUTION_TOLERANCE, is_distribution};
use thiserror::Error;

pub type SrectResult<T> = Result<T, SrectError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SrectError {
    #[error("shape mismatch: {message}")]
    ShapeMismatch { message: String },
    #[error("invalid distribution: {message}")]
    InvalidDistribution { message: String },
    #[error("invalid budget: kappa must be finite and non-negative, got {kappa}")]
    InvalidBudget { kappa: f64 },
    #[error("invalid weight {value} at action {action}, outcome {outcome}")]
    InvalidWeight {
        action: usize,
        outcome: usize,
        value: f64,
    },
    #[error("non-finite input: {message}")]
    NonFiniteInput { message: String },
    #[error("LP is infeasible")]
    SolverInfeasible,
    #[error("LP is unbounded")]
    SolverUnbounded,
    #[error("LP backend error: {message}")]
    SolverError { message: String },
    #[error("solution certificate violated: {message}")]
    CertificateViolation { message: String },
}

impl SrectError {
    /// `true` for failures detected before any LP is built.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ShapeMismatch { .. }
                | Self::InvalidDistribution { .. }
                | Self::InvalidBudget { .. }
                | Self::InvalidWeight { .. }
                | Self::NonFiniteInput { .. }
        )
    }
}

/// Outcome counts per action of a validated problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrectShape {
    pub outcome_counts: Vec<usize>,
}

impl SrectShape {
    #[must_use]
    pub fn actions(&self) -> usize {
        self.outcome_counts.len()
    }

    /// Total number of (action, outcome) pairs.
    #[must_use]
    pub fn pairs(&self) -> usize {
        self.outcome_counts.iter().sum()
    }
}

/// Checks shapes, budget and distributions of one state's inputs.
///
/// Runs before any LP is built and has no side effects. Checks happen in a
/// fixed order: shapes, budget, finiteness of `z`, weights, rows of `pbar`,
/// then `policy_eval`.
pub fn validate(
    z: &[Vec<f64>],
    pbar: &[Vec<f64>],
    w: Option<&[Vec<f64>]>,
    kappa: f64,
    policy_eval: Option<&[f64]>,
) -> SrectResult<SrectShape> {
    let shape = validate_shapes(z, pbar, w, policy_eval)?;

    if !kappa.is_finite() || kappa < 0.0 {
        return Err(SrectError::InvalidBudget { kappa });
    }

    for (action, row) in z.iter().enumerate() {
        if let Some(outcome) = row.iter().position(|v| !v.is_finite()) {
            return Err(SrectError::NonFiniteInput {
                message: format!("z[{action}][{outcome}] = {}", row[outcome]),
            });
        }
    }

    if let Some(w) = w {
        for (action, row) in w.iter().enumerate() {
            if let Some(outcome) = row.iter().position(|v| !v.is_finite() || *v < 0.0) {
                return Err(SrectError::InvalidWeight {
                    action,
                    outcome,
                    value: row[outcome],
                });
            }
        }
    }

    for (action, row) in pbar.iter().enumerate() {
        if !is_distribution(row, DISTRIBUTION_TOLERANCE) {
            return Err(SrectError::InvalidDistribution {
                message: format!(
                    "pbar[{action}] must be non-negative and sum to 1, sums to {}",
                    row.iter().sum::<f64>()
                ),
            });
        }
    }

    if let Some(policy) = policy_eval
        && !is_distribution(policy, DISTRIBUTION_TOLERANCE)
    {
        return Err(SrectError::InvalidDistribution {
            message: format!(
                "policy_eval must be non-negative and sum to 1, sums to {}",
                policy.iter().sum::<f64>()
            ),
        });
    }

    Ok(shape)
}

fn validate_shapes(
    z: &[Vec<f64>],
    pbar: &[Vec<f64>],
    w: Option<&[Vec<f64>]>,
    policy_eval: Option<&[f64]>,
) -> SrectResult<SrectShape> {
    if z.is_empty() {
        return Err(SrectError::ShapeMismatch {
            message: "at least one action is required".to_owned(),
        });
    }
    if pbar.len() != z.len() {
        return Err(SrectError::ShapeMismatch {
            message: format!("z has {} actions but pbar has {}", z.len(), pbar.len()),
        });
    }
    for (action, (z_row, p_row)) in z.iter().zip(pbar).enumerate() {
        if z_row.len() != p_row.len() {
            return Err(SrectError::ShapeMismatch {
                message: format!(
                    "action {action}: z has {} outcomes but pbar has {}",
                    z_row.len(),
                    p_row.len()
                ),
            });
        }
        if z_row.is_empty() {
            return Err(SrectError::ShapeMismatch {
                message: format!("action {action} has no outcomes"),
            });
        }
    }
    if let Some(w) = w {
        if w.len() != pbar.len() {
            return Err(SrectError::ShapeMismatch {
                message: format!("w has {} actions but pbar has {}", w.len(), pbar.len()),
            });
        }
        for (action, (w_row, p_row)) in w.iter().zip(pbar).enumerate() {
            if w_row.len() != p_row.len() {
                return Err(SrectError::ShapeMismatch {
                    message: format!(
                        "action {action}: w has {} outcomes but pbar has {}",
                        w_row.len(),
                        p_row.len()
                    ),
                });
            }
        }
    }
    if let Some(policy) = policy_eval
        && policy.len() != z.len()
    {
        return Err(SrectError::ShapeMismatch {
            message: format!(
                "policy_eval has {} entries but there are {} actions",
                policy.len(),
                z.len()
            ),
        });
    }
    Ok(SrectShape {
        outcome_counts: pbar.iter().map(Vec::len).collect(),
    })
}
