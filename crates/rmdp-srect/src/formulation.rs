#![forbid(unsafe_code)]

//! Joint LP for the s-rectangular robust Bellman update.
//!
//! Both builders encode the decision maker's maximization over a randomized
//! policy `d` together with the dual of nature's inner minimization. Per
//! action `a` and outcome `s` the shared families are:
//!
//! - `x_a` free, the dual of nature's simplex constraint,
//! - `y+_{a,s}`, `y-_{a,s}` non-negative, splitting the dual of the
//!   deviation `p - pbar`,
//! - `lambda` non-negative, the price of the shared budget,
//! - `d_a` in `[0, 1]`, the policy.
//!
//! The objective is `Σ x_a − Σ pbar·(y+ − y−) − kappa·lambda` and every
//! pair carries `x_a − y+ + y− − z·d_a ≤ 0`. The norms differ only in how
//! `y±` is tied to `lambda`.

use rmdp_lp::{LpModel, LpModelError, Relation, Sense, VarId};
use serde::{Deserialize, Serialize};

use crate::validation::{SrectError, SrectResult};

/// Norm measuring nature's total deviation from `pbar`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SrectNorm {
    L1,
    Linf,
}

impl SrectNorm {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::L1 => "l1",
            Self::Linf => "linf",
        }
    }

    /// Role of the constraints whose duals are nature's budgets.
    #[must_use]
    pub const fn budget_role(self) -> SrectRole {
        match self {
            Self::L1 => SrectRole::Psi,
            Self::Linf => SrectRole::Theta,
        }
    }
}

/// Tag attached to every constraint family of the joint LP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SrectRole {
    /// `Σ d_a = 1`.
    Policy,
    /// `d_a = policy_eval[a]`.
    PolicyPin,
    Transition,
    /// L1 budget row, one per (action, outcome).
    Psi,
    /// L∞ budget row, one per action.
    Theta,
}

impl SrectRole {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::PolicyPin => "policy_pin",
            Self::Transition => "transition",
            Self::Psi => "psi",
            Self::Theta => "theta",
        }
    }
}

/// A built joint LP plus the handles needed to read the answer back.
#[derive(Debug, Clone)]
pub struct SrectFormulation {
    pub norm: SrectNorm,
    pub model: LpModel<SrectRole>,
    /// `d_a` per action.
    pub policy: Vec<VarId>,
    pub lambda: VarId,
    /// Weights of the budget rows, grouped by action in the order the rows
    /// were added: one entry per outcome for L1, a single entry for L∞.
    pub budget_weights: Vec<Vec<f64>>,
    pub pinned_policy: Option<Vec<f64>>,
    pub kappa: f64,
}

impl SrectFormulation {
    #[must_use]
    pub fn actions(&self) -> usize {
        self.policy.len()
    }

    /// Per-action weighted budget implied by the duals of the budget rows.
    ///
    /// Returns `None` when `budgets` does not hold one value per row.
    #[must_use]
    pub fn allocations(&self, budgets: &[f64]) -> Option<Vec<f64>> {
        let rows: usize = self.budget_weights.iter().map(Vec::len).sum();
        if budgets.len() != rows {
            return None;
        }
        let mut offset = 0;
        let allocations = self
            .budget_weights
            .iter()
            .map(|weights| {
                let share = weights
                    .iter()
                    .zip(&budgets[offset..offset + weights.len()])
                    .map(|(w, b)| w * b)
                    .sum();
                offset += weights.len();
                share
            })
            .collect();
        Some(allocations)
    }
}

fn model_error(err: LpModelError) -> SrectError {
    SrectError::SolverError {
        message: format!("formulation rejected by LP model: {err}"),
    }
}

/// Weight of action `a`'s L∞ budget row: `max_s w[a][s]`, or 1 without `w`.
#[must_use]
pub fn linf_action_weight(w: Option<&[Vec<f64>]>, action: usize) -> f64 {
    w.and_then(|rows| rows.get(action))
        .map_or(1.0, |row| row.iter().copied().fold(0.0, f64::max))
}

struct SharedFamilies {
    model: LpModel<SrectRole>,
    policy: Vec<VarId>,
    lambda: VarId,
    deviations: Vec<Vec<(VarId, VarId)>>,
}

/// Variables, objective, policy rows and transition rows common to both norms.
fn shared_families(
    z: &[Vec<f64>],
    pbar: &[Vec<f64>],
    kappa: f64,
    policy_eval: Option<&[f64]>,
) -> SrectResult<SharedFamilies> {
    let mut model = LpModel::new(Sense::Maximize);

    let policy = (0..z.len())
        .map(|_| model.add_variable(0.0, 1.0, 0.0))
        .collect::<Result<Vec<_>, _>>()
        .map_err(model_error)?;
    let values = (0..z.len())
        .map(|_| model.add_free(1.0))
        .collect::<Result<Vec<_>, _>>()
        .map_err(model_error)?;
    let lambda = model.add_nonneg(-kappa).map_err(model_error)?;

    let mut deviations = Vec::with_capacity(z.len());
    for p_row in pbar {
        let mut pairs = Vec::with_capacity(p_row.len());
        for &p in p_row {
            let plus = model.add_nonneg(-p).map_err(model_error)?;
            let minus = model.add_nonneg(p).map_err(model_error)?;
            pairs.push((plus, minus));
        }
        deviations.push(pairs);
    }

    match policy_eval {
        Some(pinned) => {
            for (&d, &target) in policy.iter().zip(pinned) {
                model
                    .add_constraint(
                        vec![(d, 1.0)],
                        Relation::Equal,
                        target,
                        Some(SrectRole::PolicyPin),
                    )
                    .map_err(model_error)?;
            }
        }
        None => {
            model
                .add_constraint(
                    policy.iter().map(|&d| (d, 1.0)).collect(),
                    Relation::Equal,
                    1.0,
                    Some(SrectRole::Policy),
                )
                .map_err(model_error)?;
        }
    }

    for (action, z_row) in z.iter().enumerate() {
        for (&(plus, minus), &value) in deviations[action].iter().zip(z_row) {
            model
                .add_constraint(
                    vec![
                        (values[action], 1.0),
                        (plus, -1.0),
                        (minus, 1.0),
                        (policy[action], -value),
                    ],
                    Relation::LessEq,
                    0.0,
                    Some(SrectRole::Transition),
                )
                .map_err(model_error)?;
        }
    }

    Ok(SharedFamilies {
        model,
        policy,
        lambda,
        deviations,
    })
}

/// Builds the L1 joint LP.
///
/// Budget rows are `−w[a][s]·lambda + y+ + y− ≤ 0` tagged
/// [`SrectRole::Psi`]. With `policy_eval` the policy is pinned row by row
/// instead of constrained to the simplex. Inputs are expected to have passed
/// [`validate`](crate::validate).
pub fn build_l1(
    z: &[Vec<f64>],
    pbar: &[Vec<f64>],
    w: Option<&[Vec<f64>]>,
    kappa: f64,
    policy_eval: Option<&[f64]>,
) -> SrectResult<SrectFormulation> {
    let SharedFamilies {
        mut model,
        policy,
        lambda,
        deviations,
    } = shared_families(z, pbar, kappa, policy_eval)?;

    let mut budget_weights = Vec::with_capacity(deviations.len());
    for (action, pairs) in deviations.iter().enumerate() {
        let mut weights = Vec::with_capacity(pairs.len());
        for (outcome, &(plus, minus)) in pairs.iter().enumerate() {
            let weight = w.map_or(1.0, |rows| rows[action][outcome]);
            model
                .add_constraint(
                    vec![(lambda, -weight), (plus, 1.0), (minus, 1.0)],
                    Relation::LessEq,
                    0.0,
                    Some(SrectRole::Psi),
                )
                .map_err(model_error)?;
            weights.push(weight);
        }
        budget_weights.push(weights);
    }

    Ok(SrectFormulation {
        norm: SrectNorm::L1,
        model,
        policy,
        lambda,
        budget_weights,
        pinned_policy: policy_eval.map(<[f64]>::to_vec),
        kappa,
    })
}

/// Builds the L∞ joint LP.
///
/// One budget row per action, `Σ_s (y+ + y−) − weight(a)·lambda ≤ 0`, tagged
/// [`SrectRole::Theta`], with `weight(a)` from [`linf_action_weight`]. The
/// policy is always constrained to the simplex.
pub fn build_linf(
    z: &[Vec<f64>],
    pbar: &[Vec<f64>],
    w: Option<&[Vec<f64>]>,
    kappa: f64,
) -> SrectResult<SrectFormulation> {
    let SharedFamilies {
        mut model,
        policy,
        lambda,
        deviations,
    } = shared_families(z, pbar, kappa, None)?;

    let mut budget_weights = Vec::with_capacity(deviations.len());
    for (action, pairs) in deviations.iter().enumerate() {
        let weight = linf_action_weight(w, action);
        let mut terms = Vec::with_capacity(2 * pairs.len() + 1);
        for &(plus, minus) in pairs {
            terms.push((plus, 1.0));
            terms.push((minus, 1.0));
        }
        terms.push((lambda, -weight));
        model
            .add_constraint(terms, Relation::LessEq, 0.0, Some(SrectRole::Theta))
            .map_err(model_error)?;
        budget_weights.push(vec![weight]);
    }

    Ok(SrectFormulation {
        norm: SrectNorm::Linf,
        model,
        policy,
        lambda,
        budget_weights,
        pinned_policy: None,
        kappa,
    })
}
