#![forbid(unsafe_code)]

//! Runtime mode shared by every solver entry point.

use serde::{Deserialize, Serialize};

/// Operational mode governing how much the solvers trust their own output.
///
/// - **Strict**: return exactly what the LP backend reports once the status is
///   optimal.
/// - **Hardened**: additionally verify a post-solve certificate (policy is a
///   distribution, budgets are non-negative and within kappa) and fail closed
///   when it does not hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeMode {
    #[default]
    Strict,
    Hardened,
}

impl RuntimeMode {
    #[must_use]
    pub const fn verifies_certificates(self) -> bool {
        matches!(self, Self::Hardened)
    }
}
