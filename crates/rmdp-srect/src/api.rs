#![forbid(unsafe_code)]

use rmdp_lp::{DenseSimplex, LpBackend, SimplexOptions};
use rmdp_runtime::{RuntimeMode, SolveEvidenceEntry, SolveEvidenceLedger, SolveOutcome};
use serde::{Deserialize, Serialize};

use crate::extract::{CERTIFICATE_TOLERANCE, SrectSolution, extract};
use crate::formulation::{SrectNorm, build_l1, build_linf};
use crate::validation::{SrectError, SrectResult, SrectShape, validate};

/// Inputs for one state, borrowed from the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SrectProblem<'a> {
    /// Returns per action and outcome, `r + gamma * v` of the successor.
    pub z: &'a [Vec<f64>],
    /// Nominal transition probabilities, same shape as `z`.
    pub pbar: &'a [Vec<f64>],
    pub kappa: f64,
    /// Budget weights, same shape as `pbar`; all ones when absent.
    pub weights: Option<&'a [Vec<f64>]>,
    /// Fixed policy to evaluate instead of optimizing. L1 only.
    pub policy_eval: Option<&'a [f64]>,
}

impl<'a> SrectProblem<'a> {
    #[must_use]
    pub const fn new(z: &'a [Vec<f64>], pbar: &'a [Vec<f64>], kappa: f64) -> Self {
        Self {
            z,
            pbar,
            kappa,
            weights: None,
            policy_eval: None,
        }
    }

    #[must_use]
    pub const fn with_weights(mut self, weights: &'a [Vec<f64>]) -> Self {
        self.weights = Some(weights);
        self
    }

    #[must_use]
    pub const fn with_policy_eval(mut self, policy: &'a [f64]) -> Self {
        self.policy_eval = Some(policy);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SrectOptions {
    pub mode: RuntimeMode,
    /// Used by the entry points that build their own [`DenseSimplex`].
    pub simplex: SimplexOptions,
    pub certificate_tolerance: f64,
}

impl Default for SrectOptions {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::Strict,
            simplex: SimplexOptions::default(),
            certificate_tolerance: CERTIFICATE_TOLERANCE,
        }
    }
}

/// Robust Bellman update with the L1 ambiguity set.
///
/// Uses the built-in [`DenseSimplex`] backend and default options.
pub fn solve_srect_l1(
    z: &[Vec<f64>],
    pbar: &[Vec<f64>],
    kappa: f64,
    w: Option<&[Vec<f64>]>,
    policy_eval: Option<&[f64]>,
) -> SrectResult<SrectSolution> {
    let problem = SrectProblem {
        z,
        pbar,
        kappa,
        weights: w,
        policy_eval,
    };
    solve_srect_default(SrectNorm::L1, &problem)
}

/// Robust Bellman update with the L∞ ambiguity set.
///
/// Uses the built-in [`DenseSimplex`] backend and default options.
pub fn solve_srect_linf(
    z: &[Vec<f64>],
    pbar: &[Vec<f64>],
    kappa: f64,
    w: Option<&[Vec<f64>]>,
) -> SrectResult<SrectSolution> {
    let problem = SrectProblem {
        z,
        pbar,
        kappa,
        weights: w,
        policy_eval: None,
    };
    solve_srect_default(SrectNorm::Linf, &problem)
}

fn solve_srect_default(
    norm: SrectNorm,
    problem: &SrectProblem<'_>,
) -> SrectResult<SrectSolution> {
    let options = SrectOptions::default();
    solve_srect(&DenseSimplex::new(options.simplex), norm, problem, &options)
}

/// Validate, build, solve and extract with any [`LpBackend`].
///
/// Nothing is retained between calls; the LP model is dropped before this
/// returns.
pub fn solve_srect<B: LpBackend>(
    backend: &B,
    norm: SrectNorm,
    problem: &SrectProblem<'_>,
    options: &SrectOptions,
) -> SrectResult<SrectSolution> {
    attempt(backend, norm, problem, options).result
}

/// [`solve_srect`], then append one entry describing the call to `ledger`.
///
/// The entry is recorded for successful, rejected and failed calls alike.
pub fn solve_srect_with_evidence<B: LpBackend>(
    backend: &B,
    norm: SrectNorm,
    problem: &SrectProblem<'_>,
    options: &SrectOptions,
    ledger: &mut SolveEvidenceLedger,
) -> SrectResult<SrectSolution> {
    let Attempt {
        shape,
        iterations,
        result,
    } = attempt(backend, norm, problem, options);

    let (outcome, objective, detail) = match &result {
        Ok(solution) => (SolveOutcome::Solved, Some(solution.objective), String::new()),
        Err(err) if err.is_validation() => (SolveOutcome::Rejected, None, err.to_string()),
        Err(err) => (SolveOutcome::Failed, None, err.to_string()),
    };
    ledger.record(SolveEvidenceEntry {
        operation: format!("srect_{}", norm.as_str()),
        mode: options.mode,
        actions: problem.z.len(),
        outcomes: shape.as_ref().map_or(0, SrectShape::pairs),
        kappa: problem.kappa,
        outcome,
        objective,
        iterations,
        detail,
    });
    result
}

struct Attempt {
    shape: Option<SrectShape>,
    iterations: usize,
    result: SrectResult<SrectSolution>,
}

fn attempt<B: LpBackend>(
    backend: &B,
    norm: SrectNorm,
    problem: &SrectProblem<'_>,
    options: &SrectOptions,
) -> Attempt {
    let rejected = |err: SrectError| Attempt {
        shape: None,
        iterations: 0,
        result: Err(err),
    };

    if norm == SrectNorm::Linf && problem.policy_eval.is_some() {
        return rejected(SrectError::ShapeMismatch {
            message: "policy_eval is only supported with the L1 norm".to_owned(),
        });
    }
    let shape = match validate(
        problem.z,
        problem.pbar,
        problem.weights,
        problem.kappa,
        problem.policy_eval,
    ) {
        Ok(shape) => shape,
        Err(err) => return rejected(err),
    };

    let built = match norm {
        SrectNorm::L1 => build_l1(
            problem.z,
            problem.pbar,
            problem.weights,
            problem.kappa,
            problem.policy_eval,
        ),
        SrectNorm::Linf => build_linf(problem.z, problem.pbar, problem.weights, problem.kappa),
    };
    let formulation = match built {
        Ok(formulation) => formulation,
        Err(err) => {
            return Attempt {
                shape: Some(shape),
                iterations: 0,
                result: Err(err),
            };
        }
    };

    tracing::debug!(
        norm = norm.as_str(),
        actions = shape.actions(),
        pairs = shape.pairs(),
        kappa = problem.kappa,
        variables = formulation.model.num_variables(),
        constraints = formulation.model.num_constraints(),
        "solving s-rectangular update"
    );
    let lp = backend.solve(&formulation.model);
    let result = extract(&formulation, &lp, options.mode, options.certificate_tolerance);
    match &result {
        Ok(solution) => tracing::debug!(
            norm = norm.as_str(),
            objective = solution.objective,
            iterations = solution.iterations,
            "s-rectangular update solved"
        ),
        Err(err) => tracing::warn!(norm = norm.as_str(), status = ?lp.status, "{err}"),
    }

    Attempt {
        shape: Some(shape),
        iterations: lp.iterations,
        result,
    }
}
