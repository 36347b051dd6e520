#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rmdp_lp::DenseSimplex;
use rmdp_runtime::RuntimeMode;
use rmdp_srect::{SrectNorm, SrectOptions, SrectProblem, solve_srect};

#[derive(Debug, Arbitrary)]
struct SolveInput {
    linf: bool,
    hardened: bool,
    kappa_steps: u8,
    /// (return, nominal mass) per outcome, per action.
    actions: Vec<Vec<(i8, u8)>>,
}

fuzz_target!(|input: SolveInput| {
    let mut z = Vec::new();
    let mut pbar = Vec::new();
    for row in input.actions.iter().take(4) {
        let row: Vec<_> = row.iter().take(4).collect();
        let mass: f64 = row.iter().map(|(_, m)| f64::from(*m) + 1.0).sum();
        if row.is_empty() {
            continue;
        }
        z.push(row.iter().map(|(r, _)| f64::from(*r) / 16.0).collect::<Vec<_>>());
        pbar.push(
            row.iter()
                .map(|(_, m)| (f64::from(*m) + 1.0) / mass)
                .collect::<Vec<_>>(),
        );
    }
    if z.is_empty() {
        return;
    }

    let norm = if input.linf {
        SrectNorm::Linf
    } else {
        SrectNorm::L1
    };
    let options = SrectOptions {
        mode: if input.hardened {
            RuntimeMode::Hardened
        } else {
            RuntimeMode::Strict
        },
        ..SrectOptions::default()
    };
    let kappa = f64::from(input.kappa_steps) / 32.0;
    let problem = SrectProblem::new(&z, &pbar, kappa);
    if let Ok(solution) = solve_srect(&DenseSimplex::default(), norm, &problem, &options) {
        assert!(solution.objective.is_finite());
        assert_eq!(solution.policy.len(), z.len());
    }
});
