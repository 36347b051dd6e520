//! Scenario and property tests for the dense simplex backend.
//!
//! Reproduce a property failure: `PROPTEST_SEED=<seed> cargo test -p rmdp-lp --test lp_scenarios`

use proptest::prelude::*;
use rmdp_lp::{DenseSimplex, LpBackend, LpModel, LpStatus, Relation, Sense};
use rmdp_runtime::{assert_close, assert_close_slice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Link,
    Capacity,
}

#[test]
fn beale_cycling_example_terminates() {
    let mut model = LpModel::<Role>::new(Sense::Minimize);
    let x4 = model.add_nonneg(-0.75).expect("x4");
    let x5 = model.add_nonneg(20.0).expect("x5");
    let x6 = model.add_nonneg(-0.5).expect("x6");
    let x7 = model.add_nonneg(6.0).expect("x7");
    model
        .add_constraint(
            vec![(x4, 0.25), (x5, -8.0), (x6, -1.0), (x7, 9.0)],
            Relation::LessEq,
            0.0,
            None,
        )
        .expect("row 1");
    model
        .add_constraint(
            vec![(x4, 0.5), (x5, -12.0), (x6, -0.5), (x7, 3.0)],
            Relation::LessEq,
            0.0,
            None,
        )
        .expect("row 2");
    model
        .add_constraint(vec![(x6, 1.0)], Relation::LessEq, 1.0, None)
        .expect("row 3");

    let solution = DenseSimplex::default().solve(&model);
    assert_eq!(solution.status, LpStatus::Optimal);
    assert_close(solution.objective, -1.25, 1e-9, 0.0);
}

#[test]
fn infeasible_model_is_reported() {
    let mut model = LpModel::<Role>::new(Sense::Maximize);
    let x = model.add_nonneg(1.0).expect("x");
    let y = model.add_nonneg(1.0).expect("y");
    model
        .add_constraint(vec![(x, 1.0), (y, 1.0)], Relation::LessEq, -1.0, None)
        .expect("row");
    let solution = DenseSimplex::default().solve(&model);
    assert_eq!(solution.status, LpStatus::Infeasible);
    assert!(solution.primal.is_empty());
    assert!(solution.duals_for(Role::Link).is_empty());
}

#[test]
fn unbounded_model_is_reported() {
    let mut model = LpModel::<Role>::new(Sense::Maximize);
    let x = model.add_nonneg(1.0).expect("x");
    let y = model.add_nonneg(0.0).expect("y");
    model
        .add_constraint(vec![(x, 1.0), (y, -1.0)], Relation::LessEq, 1.0, None)
        .expect("row");
    let solution = DenseSimplex::default().solve(&model);
    assert_eq!(solution.status, LpStatus::Unbounded);
}

#[test]
fn free_and_lower_bounded_variables_with_equality() {
    // min x + y, x - y = 1, x free, y >= -2 -> x = -1, y = -2
    let mut model = LpModel::new(Sense::Minimize);
    let x = model.add_free(1.0).expect("x");
    let y = model
        .add_variable(-2.0, f64::INFINITY, 1.0)
        .expect("y");
    let link = model
        .add_constraint(
            vec![(x, 1.0), (y, -1.0)],
            Relation::Equal,
            1.0,
            Some(Role::Link),
        )
        .expect("link");
    let solution = DenseSimplex::default().solve(&model);
    assert!(solution.is_optimal());
    assert_close(solution.objective, -3.0, 1e-9, 0.0);
    assert_close_slice(&solution.primal, &[-1.0, -2.0], 1e-9, 0.0);
    assert_close(solution.dual(link).unwrap_or(f64::NAN), 1.0, 1e-9, 0.0);
}

#[test]
fn variable_upper_bounds_bind_before_constraint() {
    let mut model = LpModel::new(Sense::Maximize);
    let x = model.add_variable(0.0, 1.0, 1.0).expect("x");
    let y = model.add_variable(0.0, 2.0, 1.0).expect("y");
    let cap = model
        .add_constraint(
            vec![(x, 1.0), (y, 1.0)],
            Relation::LessEq,
            5.0,
            Some(Role::Capacity),
        )
        .expect("cap");
    let solution = DenseSimplex::default().solve(&model);
    assert!(solution.is_optimal());
    assert_close(solution.objective, 3.0, 1e-9, 0.0);
    assert_close(solution.dual(cap).unwrap_or(f64::NAN), 0.0, 1e-9, 0.0);
    // variable bounds stay implicit and carry no reported dual
    assert_eq!(solution.duals.len(), 1);
}

#[test]
fn upper_bounded_only_variable_without_constraints() {
    let mut model = LpModel::<Role>::new(Sense::Maximize);
    let x = model
        .add_variable(f64::NEG_INFINITY, 3.0, 1.0)
        .expect("x");
    let solution = DenseSimplex::default().solve(&model);
    assert!(solution.is_optimal());
    assert_close(solution.value(x).unwrap_or(f64::NAN), 3.0, 1e-12, 0.0);
}

#[test]
fn fixed_variable_is_respected() {
    let mut model = LpModel::new(Sense::Maximize);
    let x = model.add_variable(0.25, 0.25, 1.0).expect("x");
    let y = model.add_nonneg(2.0).expect("y");
    let cap = model
        .add_constraint(
            vec![(x, 1.0), (y, 1.0)],
            Relation::LessEq,
            1.0,
            Some(Role::Capacity),
        )
        .expect("cap");
    let solution = DenseSimplex::default().solve(&model);
    assert!(solution.is_optimal());
    assert_close(solution.value(x).unwrap_or(f64::NAN), 0.25, 1e-12, 0.0);
    assert_close(solution.value(y).unwrap_or(f64::NAN), 0.75, 1e-9, 0.0);
    assert_close(solution.objective, 1.75, 1e-9, 0.0);
    assert_close(solution.dual(cap).unwrap_or(f64::NAN), 2.0, 1e-9, 0.0);
}

fn knapsack_value(values: &[f64], caps: &[f64], budget: f64) -> f64 {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    let mut remaining = budget;
    let mut total = 0.0;
    for i in order {
        let take = caps[i].min(remaining);
        total += values[i] * take;
        remaining -= take;
    }
    total
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn fractional_knapsack_matches_greedy(
        items in prop::collection::vec((0.1f64..10.0, 0.1f64..5.0), 1..6),
        budget in 0.1f64..20.0,
    ) {
        let values: Vec<f64> = items.iter().map(|(v, _)| *v).collect();
        let caps: Vec<f64> = items.iter().map(|(_, c)| *c).collect();

        let mut model = LpModel::new(Sense::Maximize);
        let vars: Vec<_> = items
            .iter()
            .map(|(v, c)| model.add_variable(0.0, *c, *v).expect("item"))
            .collect();
        let cap = model
            .add_constraint(
                vars.iter().map(|&v| (v, 1.0)).collect(),
                Relation::LessEq,
                budget,
                Some(Role::Capacity),
            )
            .expect("capacity");

        let solution = DenseSimplex::default().solve(&model);
        prop_assert_eq!(solution.status, LpStatus::Optimal);
        let expected = knapsack_value(&values, &caps, budget);
        prop_assert!((solution.objective - expected).abs() < 1e-7,
            "objective {} vs greedy {}", solution.objective, expected);

        // strong duality: b*y + sum u_i * max(c_i - y, 0) equals the optimum
        let y = solution.dual(cap).unwrap_or(f64::NAN);
        prop_assert!(y >= -1e-9, "capacity dual must be non-negative, got {y}");
        let dual_value = budget * y
            + values
                .iter()
                .zip(&caps)
                .map(|(v, c)| c * (v - y).max(0.0))
                .sum::<f64>();
        prop_assert!((dual_value - expected).abs() < 1e-6,
            "dual objective {dual_value} vs primal {expected}");
    }
}
