#![forbid(unsafe_code)]

//! Small continuous LP capability for the robust Bellman solvers.
//!
//! | Module     | Contents                                                 |
//! |------------|----------------------------------------------------------|
//! | `model`    | [`LpModel`] with role-tagged constraints                 |
//! | `solution` | [`LpSolution`], [`LpStatus`], dual lookup by role        |
//! | `simplex`  | [`DenseSimplex`] backend and its [`SimplexOptions`]      |

pub mod model;
pub mod simplex;
pub mod solution;

pub use model::{
    ConstraintId, LinearConstraint, LpModel, LpModelError, Relation, Sense, VarId, Variable,
};
pub use simplex::{DenseSimplex, SimplexOptions};
pub use solution::{LpSolution, LpStatus};

/// Anything that can solve a continuous [`LpModel`].
///
/// Implementations must report one of the four [`LpStatus`] values and, on
/// [`LpStatus::Optimal`], one primal value per variable and one shadow price
/// per constraint.
pub trait LpBackend {
    fn solve<R: Copy + Eq>(&self, model: &LpModel<R>) -> LpSolution<R>;
}
