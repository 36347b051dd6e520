#![forbid(unsafe_code)]

use rmdp_lp::{LpSolution, LpStatus};
use rmdp_runtime::RuntimeMode;
use serde::{Deserialize, Serialize};

use crate::formulation::{SrectFormulation, SrectNorm, SrectRole};
use crate::validation::{SrectError, SrectResult};

/// Default tolerance of the Hardened-mode certificate.
pub const CERTIFICATE_TOLERANCE: f64 = 1e-6;

/// Robust value of one state together with the recovered policy and budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrectSolution {
    /// Worst-case expected return of the returned policy.
    pub objective: f64,
    /// Randomized policy over actions.
    pub policy: Vec<f64>,
    /// Duals of the budget rows: one per (action, outcome) for L1, one per
    /// action for L∞.
    pub budgets: Vec<f64>,
    pub norm: SrectNorm,
    /// Weighted budget nature spends on each action.
    pub allocations: Vec<f64>,
    pub iterations: usize,
}

impl SrectSolution {
    #[must_use]
    pub fn total_allocation(&self) -> f64 {
        self.allocations.iter().sum()
    }

    /// Index of the most likely action; ties go to the lowest index.
    #[must_use]
    pub fn greedy_action(&self) -> Option<usize> {
        self.policy
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (idx, &p)| match best {
                Some((_, q)) if q >= p => best,
                _ => Some((idx, p)),
            })
            .map(|(idx, _)| idx)
    }
}

/// Maps a backend outcome to a solution or to a solver error.
///
/// Non-optimal statuses are never approximated. In
/// [`RuntimeMode::Hardened`] the optimal answer is additionally checked
/// against [`verify_certificate`].
pub fn extract(
    formulation: &SrectFormulation,
    lp: &LpSolution<SrectRole>,
    mode: RuntimeMode,
    tolerance: f64,
) -> SrectResult<SrectSolution> {
    match lp.status {
        LpStatus::Optimal => {}
        LpStatus::Infeasible => return Err(SrectError::SolverInfeasible),
        LpStatus::Unbounded => return Err(SrectError::SolverUnbounded),
        LpStatus::Error => {
            return Err(SrectError::SolverError {
                message: lp
                    .message
                    .clone()
                    .unwrap_or_else(|| "unspecified backend failure".to_owned()),
            });
        }
    }

    let policy = formulation
        .policy
        .iter()
        .map(|&var| lp.value(var))
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| SrectError::SolverError {
            message: format!(
                "backend returned {} primal values for {} variables",
                lp.primal.len(),
                formulation.model.num_variables()
            ),
        })?;

    let budgets = lp.duals_for(formulation.norm.budget_role());
    let allocations = formulation
        .allocations(&budgets)
        .ok_or_else(|| SrectError::SolverError {
            message: format!(
                "backend returned {} budget duals, expected {}",
                budgets.len(),
                formulation.model.count_role(formulation.norm.budget_role())
            ),
        })?;

    let solution = SrectSolution {
        objective: lp.objective,
        policy,
        budgets,
        norm: formulation.norm,
        allocations,
        iterations: lp.iterations,
    };

    if mode.verifies_certificates() {
        verify_certificate(formulation, &solution, tolerance)?;
    }
    Ok(solution)
}

/// Post-solve checks applied in Hardened mode.
///
/// The policy must be a distribution (and reproduce a pinned policy), every
/// budget must be non-negative and the allocations must fit in kappa, all up
/// to `tolerance`.
pub fn verify_certificate(
    formulation: &SrectFormulation,
    solution: &SrectSolution,
    tolerance: f64,
) -> SrectResult<()> {
    let violation = |message: String| {
        tracing::warn!(norm = formulation.norm.as_str(), "{message}");
        Err(SrectError::CertificateViolation { message })
    };

    if !solution.objective.is_finite() {
        return violation(format!("objective is {}", solution.objective));
    }
    if let Some((idx, p)) = solution
        .policy
        .iter()
        .enumerate()
        .find(|(_, p)| p.is_nan() || **p < -tolerance)
    {
        return violation(format!("policy[{idx}] = {p} is negative"));
    }
    let mass: f64 = solution.policy.iter().sum();
    if (mass - 1.0).abs() > tolerance {
        return violation(format!("policy sums to {mass}"));
    }
    if let Some(pinned) = &formulation.pinned_policy
        && let Some((idx, (got, want))) = solution
            .policy
            .iter()
            .zip(pinned)
            .enumerate()
            .find(|(_, (got, want))| (**got - **want).abs() > tolerance)
    {
        return violation(format!("policy[{idx}] = {got} but was pinned to {want}"));
    }
    if let Some((idx, b)) = solution
        .budgets
        .iter()
        .enumerate()
        .find(|(_, b)| b.is_nan() || **b < -tolerance)
    {
        return violation(format!("budget[{idx}] = {b} is negative"));
    }
    let spent = solution.total_allocation();
    if spent > formulation.kappa + tolerance {
        return violation(format!(
            "allocations sum to {spent}, above kappa = {}",
            formulation.kappa
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::build_l1;

    fn formulation() -> SrectFormulation {
        let z = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let pbar = vec![vec![0.5, 0.5], vec![0.5, 0.5]];
        build_l1(&z, &pbar, None, 0.4, None).expect("build")
    }

    fn optimal(
        f: &SrectFormulation,
        policy: [f64; 2],
        budgets: [f64; 4],
    ) -> LpSolution<SrectRole> {
        let mut primal = vec![0.0; f.model.num_variables()];
        for (var, p) in f.policy.iter().zip(policy) {
            primal[var.index()] = p;
        }
        let mut psi = budgets.into_iter();
        let duals = f
            .model
            .constraints()
            .iter()
            .map(|c| {
                if c.role == Some(SrectRole::Psi) {
                    psi.next().unwrap_or(0.0)
                } else {
                    0.0
                }
            })
            .collect();
        LpSolution::optimal(&f.model, 0.4, primal, duals, 9)
    }

    #[test]
    fn status_maps_to_error_variants() {
        let f = formulation();
        let cases = [
            (LpStatus::Infeasible, SrectError::SolverInfeasible),
            (LpStatus::Unbounded, SrectError::SolverUnbounded),
            (
                LpStatus::Error,
                SrectError::SolverError {
                    message: "boom".to_owned(),
                },
            ),
        ];
        for (status, expected) in cases {
            let lp = LpSolution::failed(status, 3, "boom");
            let err = extract(&f, &lp, RuntimeMode::Strict, CERTIFICATE_TOLERANCE)
                .expect_err("non-optimal status");
            assert_eq!(err, expected);
        }
    }

    #[test]
    fn optimal_solution_reads_policy_and_psi_duals() {
        let f = formulation();
        let lp = optimal(&f, [0.5, 0.5], [0.1, 0.1, 0.1, 0.1]);
        let solution =
            extract(&f, &lp, RuntimeMode::Hardened, CERTIFICATE_TOLERANCE).expect("optimal");
        assert_eq!(solution.policy, vec![0.5, 0.5]);
        assert_eq!(solution.budgets, vec![0.1, 0.1, 0.1, 0.1]);
        assert!((solution.allocations[0] - 0.2).abs() < 1e-12);
        assert!((solution.total_allocation() - 0.4).abs() < 1e-12);
        assert_eq!(solution.norm, SrectNorm::L1);
        assert_eq!(solution.iterations, 9);
        assert_eq!(solution.greedy_action(), Some(0));
    }

    #[test]
    fn strict_mode_passes_raw_output_through() {
        let f = formulation();
        let lp = optimal(&f, [0.7, 0.7], [0.5, 0.5, 0.5, 0.5]);
        let solution = extract(&f, &lp, RuntimeMode::Strict, CERTIFICATE_TOLERANCE)
            .expect("strict does not check");
        assert_eq!(solution.policy, vec![0.7, 0.7]);
    }

    #[test]
    fn hardened_mode_rejects_non_distribution_policy() {
        let f = formulation();
        let lp = optimal(&f, [0.7, 0.7], [0.1, 0.1, 0.1, 0.1]);
        let err = extract(&f, &lp, RuntimeMode::Hardened, CERTIFICATE_TOLERANCE)
            .expect_err("policy sums to 1.4");
        assert!(matches!(err, SrectError::CertificateViolation { .. }));
    }

    #[test]
    fn hardened_mode_rejects_overspent_budget() {
        let f = formulation();
        let lp = optimal(&f, [0.5, 0.5], [0.2, 0.2, 0.2, 0.2]);
        let err = extract(&f, &lp, RuntimeMode::Hardened, CERTIFICATE_TOLERANCE)
            .expect_err("0.8 > kappa");
        assert!(matches!(err, SrectError::CertificateViolation { .. }));
    }

    #[test]
    fn hardened_mode_rejects_negative_budget() {
        let f = formulation();
        let lp = optimal(&f, [0.5, 0.5], [0.1, -0.01, 0.1, 0.1]);
        let err = extract(&f, &lp, RuntimeMode::Hardened, CERTIFICATE_TOLERANCE)
            .expect_err("negative dual");
        assert!(matches!(err, SrectError::CertificateViolation { .. }));
    }

    #[test]
    fn hardened_mode_checks_pinned_policy() {
        let z = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let pbar = vec![vec![0.5, 0.5], vec![0.5, 0.5]];
        let f = build_l1(&z, &pbar, None, 0.4, Some(&[1.0, 0.0])).expect("build");
        let lp = optimal(&f, [0.5, 0.5], [0.1, 0.1, 0.1, 0.1]);
        let err = extract(&f, &lp, RuntimeMode::Hardened, CERTIFICATE_TOLERANCE)
            .expect_err("pin not reproduced");
        assert!(matches!(err, SrectError::CertificateViolation { .. }));
    }

    #[test]
    fn truncated_backend_output_is_solver_error() {
        let f = formulation();
        let mut lp = optimal(&f, [0.5, 0.5], [0.1, 0.1, 0.1, 0.1]);
        lp.primal.truncate(1);
        let err = extract(&f, &lp, RuntimeMode::Strict, CERTIFICATE_TOLERANCE)
            .expect_err("missing primal values");
        assert!(matches!(err, SrectError::SolverError { .. }));
    }

    #[test]
    fn greedy_action_prefers_lowest_index_on_ties() {
        let solution = SrectSolution {
            objective: 0.0,
            policy: vec![0.25, 0.5, 0.25, 0.0],
            budgets: Vec::new(),
            norm: SrectNorm::Linf,
            allocations: Vec::new(),
            iterations: 0,
        };
        assert_eq!(solution.greedy_action(), Some(1));
        let tied = SrectSolution {
            policy: vec![0.5, 0.5],
            ..solution
        };
        assert_eq!(tied.greedy_action(), Some(0));
    }
}
