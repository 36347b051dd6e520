#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::model::{ConstraintId, LpModel, VarId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Error,
}

/// Result reported by an [`LpBackend`](crate::LpBackend).
///
/// `primal` and `duals` are empty unless the status is [`LpStatus::Optimal`].
/// A dual value is the shadow price of its constraint: the change of the
/// optimal objective (in the model's own sense) per unit increase of the
/// constraint's right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution<R> {
    pub status: LpStatus,
    pub objective: f64,
    pub primal: Vec<f64>,
    pub duals: Vec<f64>,
    pub roles: Vec<Option<R>>,
    pub iterations: usize,
    pub message: Option<String>,
}

impl<R: Copy + Eq> LpSolution<R> {
    /// A non-optimal outcome carrying no values.
    #[must_use]
    pub fn failed(status: LpStatus, iterations: usize, message: impl Into<String>) -> Self {
        Self {
            status,
            objective: f64::NAN,
            primal: Vec::new(),
            duals: Vec::new(),
            roles: Vec::new(),
            iterations,
            message: Some(message.into()),
        }
    }

    /// An optimal outcome; roles are copied from `model` so duals can be
    /// grouped by tag after the model is dropped.
    #[must_use]
    pub fn optimal(
        model: &LpModel<R>,
        objective: f64,
        primal: Vec<f64>,
        duals: Vec<f64>,
        iterations: usize,
    ) -> Self {
        Self {
            status: LpStatus::Optimal,
            objective,
            primal,
            duals,
            roles: model.constraints().iter().map(|c| c.role).collect(),
            iterations,
            message: None,
        }
    }

    #[must_use]
    pub fn is_optimal(&self) -> bool {
        self.status == LpStatus::Optimal
    }

    #[must_use]
    pub fn value(&self, var: VarId) -> Option<f64> {
        self.primal.get(var.index()).copied()
    }

    #[must_use]
    pub fn dual(&self, constraint: ConstraintId) -> Option<f64> {
        self.duals.get(constraint.index()).copied()
    }

    /// Duals of every constraint tagged `role`, in insertion order.
    #[must_use]
    pub fn duals_for(&self, role: R) -> Vec<f64> {
        self.roles
            .iter()
            .zip(&self.duals)
            .filter(|(tag, _)| **tag == Some(role))
            .map(|(_, dual)| *dual)
            .collect()
    }
}
