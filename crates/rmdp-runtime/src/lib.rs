#![forbid(unsafe_code)]

//! Shared runtime pieces for the rmdp solvers.
//!
//! ## Module layout
//!
//! | Module     | Contents                                                  |
//! |------------|-----------------------------------------------------------|
//! | `mode`     | [`RuntimeMode`] enum (Strict / Hardened)                  |
//! | `evidence` | [`SolveEvidenceLedger`], [`SolveEvidenceEntry`]           |
//!
//! The crate root also carries the tolerance-based assertion helpers used by
//! the test suites of the other crates.

pub mod evidence;
pub mod mode;

pub use evidence::{SolveEvidenceEntry, SolveEvidenceLedger, SolveOutcome};
pub use mode::RuntimeMode;

/// Tolerance used when checking that a vector is a probability distribution.
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// `true` when every entry is non-negative and finite and the entries sum to
/// one within `tolerance`. An empty slice is not a distribution.
#[must_use]
pub fn is_distribution(values: &[f64], tolerance: f64) -> bool {
    if values.is_empty() {
        return false;
    }
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return false;
    }
    (values.iter().sum::<f64>() - 1.0).abs() <= tolerance
}

// ═══════════════════════════════════════════════════════════════════
// Test helpers
// ═══════════════════════════════════════════════════════════════════

/// Panics unless `actual` is within `atol + rtol * |expected|` of `expected`.
pub fn assert_close(actual: f64, expected: f64, atol: f64, rtol: f64) {
    let tol = atol + rtol * expected.abs();
    assert!(
        (actual - expected).abs() <= tol,
        "assert_close failed: actual={actual} expected={expected} diff={} tol={tol}",
        (actual - expected).abs()
    );
}

/// Element-wise [`assert_close`] with a length check.
pub fn assert_close_slice(actual: &[f64], expected: &[f64], atol: f64, rtol: f64) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "assert_close_slice: length mismatch: actual={} expected={}",
        actual.len(),
        expected.len()
    );
    for (idx, (a, e)) in actual.iter().zip(expected).enumerate() {
        let tol = atol + rtol * e.abs();
        assert!(
            (a - e).abs() <= tol,
            "assert_close_slice[{idx}]: actual={a} expected={e} tol={tol}"
        );
    }
}

/// Panics unless every entry is `>= -tolerance` and the sum is within
/// `tolerance` of one. Solver output may carry tiny negative noise, so this is
/// looser than [`is_distribution`].
pub fn assert_distribution(values: &[f64], tolerance: f64) {
    assert!(!values.is_empty(), "assert_distribution: empty vector");
    for (idx, v) in values.iter().enumerate() {
        assert!(
            *v >= -tolerance,
            "assert_distribution[{idx}]: negative entry {v}"
        );
    }
    let sum = values.iter().sum::<f64>();
    assert!(
        (sum - 1.0).abs() <= tolerance,
        "assert_distribution: entries sum to {sum}"
    );
}
