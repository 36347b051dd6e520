#![forbid(unsafe_code)]

//! s-rectangular robust Bellman update for a single MDP state.
//!
//! Nature perturbs the transitions of every action at once under one shared
//! L1 or L∞ budget; the decision maker answers with a randomized policy. The
//! update is one LP combining the policy maximization with the dual of
//! nature's minimization, solved through any [`rmdp_lp::LpBackend`].

pub mod api;
pub mod extract;
pub mod formulation;
pub mod validation;
pub mod worstcase;

pub use api::{
    SrectOptions, SrectProblem, solve_srect, solve_srect_l1, solve_srect_linf,
    solve_srect_with_evidence,
};
pub use extract::{CERTIFICATE_TOLERANCE, SrectSolution, extract, verify_certificate};
pub use formulation::{
    SrectFormulation, SrectNorm, SrectRole, build_l1, build_linf, linf_action_weight,
};
pub use validation::{SrectError, SrectResult, SrectShape, validate};
pub use worstcase::{WorstCase, nature_response_l1, worstcase_l1};
