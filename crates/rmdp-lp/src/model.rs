#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Handle to a variable inside an [`LpModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

impl VarId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Handle to a constraint inside an [`LpModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub(crate) usize);

impl ConstraintId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    #[default]
    Maximize,
    Minimize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    LessEq,
    Equal,
    GreaterEq,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Variable {
    pub lower: f64,
    pub upper: f64,
    pub objective: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint<R> {
    pub terms: Vec<(VarId, f64)>,
    pub relation: Relation,
    pub rhs: f64,
    pub role: Option<R>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LpModelError {
    #[error("variable bounds are empty: lower={lower}, upper={upper}")]
    EmptyBounds { lower: f64, upper: f64 },
    #[error("unknown variable index {index} (model has {len} variables)")]
    UnknownVariable { index: usize, len: usize },
    #[error("non-finite coefficient: {message}")]
    NonFiniteCoefficient { message: String },
}

/// A continuous linear program whose constraints can carry a role tag `R`.
///
/// Tags let callers read back groups of dual values without relying on the
/// order in which constraints were added.
#[derive(Debug, Clone, PartialEq)]
pub struct LpModel<R> {
    sense: Sense,
    variables: Vec<Variable>,
    constraints: Vec<LinearConstraint<R>>,
}

impl<R: Copy + Eq> LpModel<R> {
    #[must_use]
    pub fn new(sense: Sense) -> Self {
        Self {
            sense,
            variables: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Adds a variable with bounds `[lower, upper]`; either side may be infinite.
    pub fn add_variable(
        &mut self,
        lower: f64,
        upper: f64,
        objective: f64,
    ) -> Result<VarId, LpModelError> {
        if lower.is_nan()
            || upper.is_nan()
            || lower > upper
            || lower == f64::INFINITY
            || upper == f64::NEG_INFINITY
        {
            return Err(LpModelError::EmptyBounds { lower, upper });
        }
        if !objective.is_finite() {
            return Err(LpModelError::NonFiniteCoefficient {
                message: format!("objective coefficient {objective}"),
            });
        }
        self.variables.push(Variable {
            lower,
            upper,
            objective,
        });
        Ok(VarId(self.variables.len() - 1))
    }

    /// Free variable, `(-inf, +inf)`.
    pub fn add_free(&mut self, objective: f64) -> Result<VarId, LpModelError> {
        self.add_variable(f64::NEG_INFINITY, f64::INFINITY, objective)
    }

    /// Non-negative variable, `[0, +inf)`.
    pub fn add_nonneg(&mut self, objective: f64) -> Result<VarId, LpModelError> {
        self.add_variable(0.0, f64::INFINITY, objective)
    }

    pub fn add_constraint(
        &mut self,
        terms: Vec<(VarId, f64)>,
        relation: Relation,
        rhs: f64,
        role: Option<R>,
    ) -> Result<ConstraintId, LpModelError> {
        if let Some((var, _)) = terms.iter().find(|(v, _)| v.0 >= self.variables.len()) {
            return Err(LpModelError::UnknownVariable {
                index: var.0,
                len: self.variables.len(),
            });
        }
        if !rhs.is_finite() || terms.iter().any(|(_, c)| !c.is_finite()) {
            return Err(LpModelError::NonFiniteCoefficient {
                message: format!("constraint {} (rhs={rhs})", self.constraints.len()),
            });
        }
        self.constraints.push(LinearConstraint {
            terms,
            relation,
            rhs,
            role,
        });
        Ok(ConstraintId(self.constraints.len() - 1))
    }

    #[must_use]
    pub const fn sense(&self) -> Sense {
        self.sense
    }

    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    #[must_use]
    pub fn constraints(&self) -> &[LinearConstraint<R>] {
        &self.constraints
    }

    #[must_use]
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    #[must_use]
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Number of constraints tagged with `role`.
    #[must_use]
    pub fn count_role(&self, role: R) -> usize {
        self.constraints
            .iter()
            .filter(|c| c.role == Some(role))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tag {
        Budget,
    }

    #[test]
    fn rejects_empty_bounds() {
        let mut model = LpModel::<Tag>::new(Sense::Maximize);
        let err = model
            .add_variable(1.0, 0.0, 0.0)
            .expect_err("lower > upper must fail");
        assert!(matches!(err, LpModelError::EmptyBounds { .. }));
        assert!(model.add_variable(f64::INFINITY, f64::INFINITY, 0.0).is_err());
        assert!(model.add_variable(f64::NAN, 1.0, 0.0).is_err());
    }

    #[test]
    fn rejects_unknown_variable_in_constraint() {
        let mut model = LpModel::<Tag>::new(Sense::Minimize);
        let x = model.add_nonneg(1.0).expect("variable");
        let err = model
            .add_constraint(vec![(x, 1.0), (VarId(3), 1.0)], Relation::LessEq, 1.0, None)
            .expect_err("dangling variable must fail");
        assert_eq!(err, LpModelError::UnknownVariable { index: 3, len: 1 });
    }

    #[test]
    fn rejects_non_finite_coefficients() {
        let mut model = LpModel::<Tag>::new(Sense::Minimize);
        let x = model.add_nonneg(1.0).expect("variable");
        assert!(
            model
                .add_constraint(vec![(x, f64::NAN)], Relation::Equal, 1.0, None)
                .is_err()
        );
        assert!(
            model
                .add_constraint(vec![(x, 1.0)], Relation::Equal, f64::INFINITY, None)
                .is_err()
        );
        assert!(model.add_free(f64::INFINITY).is_err());
    }

    #[test]
    fn counts_constraints_by_role() {
        let mut model = LpModel::new(Sense::Maximize);
        let x = model.add_free(1.0).expect("variable");
        model
            .add_constraint(vec![(x, 1.0)], Relation::LessEq, 1.0, Some(Tag::Budget))
            .expect("constraint");
        model
            .add_constraint(vec![(x, 2.0)], Relation::LessEq, 3.0, None)
            .expect("constraint");
        let id = model
            .add_constraint(vec![(x, 1.0)], Relation::GreaterEq, -1.0, Some(Tag::Budget))
            .expect("constraint");
        assert_eq!(id.index(), 2);
        assert_eq!(model.count_role(Tag::Budget), 2);
        assert_eq!(model.num_constraints(), 3);
        assert_eq!(model.num_variables(), 1);
    }
}
