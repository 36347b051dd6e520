#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rmdp_srect::validate;

#[derive(Debug, Arbitrary)]
struct ValidateInput {
    z: Vec<Vec<f64>>,
    pbar: Vec<Vec<f64>>,
    weights: Option<Vec<Vec<f64>>>,
    kappa: f64,
    policy_eval: Option<Vec<f64>>,
}

fn clip(rows: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    rows.into_iter()
        .take(8)
        .map(|row| row.into_iter().take(8).collect())
        .collect()
}

fuzz_target!(|input: ValidateInput| {
    let z = clip(input.z);
    let pbar = clip(input.pbar);
    let weights = input.weights.map(clip);
    let result = validate(
        &z,
        &pbar,
        weights.as_deref(),
        input.kappa,
        input.policy_eval.as_deref(),
    );
    match result {
        Ok(shape) => {
            assert_eq!(shape.actions(), z.len());
            assert!(input.kappa.is_finite() && input.kappa >= 0.0);
        }
        Err(err) => assert!(
            err.is_validation(),
            "validation produced a solver error: {err:?}"
        ),
    }
});
