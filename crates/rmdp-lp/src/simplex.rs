#![forbid(unsafe_code)]

//! Two-phase bounded-variable dense tableau simplex.
//!
//! The model is rewritten into standard form `min c'x, Ax = b, 0 <= x <= u`:
//! bounded variables are shifted or mirrored onto `[0, u]`, free variables
//! are split, and inequality rows get a slack column. Finite upper bounds
//! stay implicit: a column at its upper bound is complemented (`u - x`)
//! instead of carrying an extra row.
//!
//! A row whose slack already forms a unit column starts with the slack in
//! the basis; every other row gets an artificial. The starting unit column
//! of each row, read off the final tableau, is a column of the basis inverse
//! and yields that row's dual value.
//!
//! The last tableau row holds the reduced costs and is updated by every
//! pivot, and repriced from scratch before optimality is declared. Pricing
//! takes the most negative reduced cost and falls back to Bland's rule
//! after a run of degenerate steps. The ratio test takes the exact minimum
//! ratio and only breaks exact ties.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::LpBackend;
use crate::model::{LpModel, Relation, Sense};
use crate::solution::{LpSolution, LpStatus};

/// Entries smaller than this are flushed to zero during a pivot.
const DROP_TOLERANCE: f64 = 1e-13;

/// Steps at most this long count as degenerate.
const DEGENERATE_STEP: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimplexOptions {
    /// Pivots and bound flips, summed over both phases.
    pub max_iterations: usize,
    pub pivot_tolerance: f64,
    /// Reduced costs above `-optimality_tolerance` count as optimal.
    pub optimality_tolerance: f64,
    pub feasibility_tolerance: f64,
    /// Consecutive degenerate steps before pricing switches to Bland's rule.
    pub degenerate_pivot_limit: usize,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50_000,
            pivot_tolerance: 1e-9,
            optimality_tolerance: 1e-9,
            feasibility_tolerance: 1e-7,
            degenerate_pivot_limit: 32,
        }
    }
}

/// Dense simplex backend. Holds only its options; every call to
/// [`LpBackend::solve`] builds and drops its own tableau.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DenseSimplex {
    options: SimplexOptions,
}

impl DenseSimplex {
    #[must_use]
    pub const fn new(options: SimplexOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub const fn options(&self) -> SimplexOptions {
        self.options
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnMap {
    /// `x = lower + x'`
    Shifted { col: usize, lower: f64 },
    /// `x = upper - x'`
    Mirrored { col: usize, upper: f64 },
    /// `x = x+ - x-`
    Split { pos: usize, neg: usize },
}

impl ColumnMap {
    fn recover(self, standard: &[f64]) -> f64 {
        match self {
            Self::Shifted { col, lower } => lower + standard[col],
            Self::Mirrored { col, upper } => upper - standard[col],
            Self::Split { pos, neg } => standard[pos] - standard[neg],
        }
    }
}

#[derive(Debug)]
struct Tableau {
    /// `(m + 1) x (width + 1)`: constraint rows then the reduced-cost row,
    /// columns then the basic values.
    matrix: DMatrix<f64>,
    basis: Vec<usize>,
    /// Upper bound of each standard-form column, `inf` when absent.
    upper: Vec<f64>,
    /// Columns currently standing for `upper - x`.
    flipped: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    /// The entering column reaches its own upper bound first.
    Flip { length: f64 },
    /// The basic column of `row` leaves, at its upper bound when `to_upper`.
    Pivot { row: usize, to_upper: bool, length: f64 },
}

impl Step {
    const fn length(self) -> f64 {
        match self {
            Self::Flip { length } | Self::Pivot { length, .. } => length,
        }
    }
}

impl Tableau {
    fn rows(&self) -> usize {
        self.basis.len()
    }

    fn rhs(&self) -> usize {
        self.matrix.ncols() - 1
    }

    fn cost(&self, costs: &[f64], col: usize) -> f64 {
        if self.flipped[col] {
            -costs[col]
        } else {
            costs[col]
        }
    }

    fn reduced_cost(&self, col: usize) -> f64 {
        self.matrix[(self.rows(), col)]
    }

    /// Rewrites the reduced-cost row from `costs` and the current basis.
    fn price(&mut self, costs: &[f64]) {
        let m = self.rows();
        let rhs = self.rhs();
        let priced: Vec<(usize, f64)> = self
            .basis
            .iter()
            .enumerate()
            .map(|(row, &col)| (row, self.cost(costs, col)))
            .filter(|&(_, cost)| cost != 0.0)
            .collect();
        for col in 0..=rhs {
            let base = if col == rhs { 0.0 } else { self.cost(costs, col) };
            let dot: f64 = priced
                .iter()
                .map(|&(row, cost)| cost * self.matrix[(row, col)])
                .sum();
            self.matrix[(m, col)] = base - dot;
        }
        for &col in &self.basis {
            self.matrix[(m, col)] = 0.0;
        }
    }

    fn basic_objective(&self, costs: &[f64]) -> f64 {
        let rhs = self.rhs();
        self.basis
            .iter()
            .enumerate()
            .map(|(row, &col)| self.cost(costs, col) * self.matrix[(row, rhs)])
            .sum()
    }

    /// Gauss-Jordan step on `(row, col)`, reduced-cost row included. Only the
    /// nonzero columns of the pivot row are touched.
    fn pivot(&mut self, row: usize, col: usize) {
        let width = self.matrix.ncols();
        let pivot = self.matrix[(row, col)];
        let mut support = Vec::new();
        for c in 0..width {
            let value = self.matrix[(row, c)] / pivot;
            let value = if value.abs() < DROP_TOLERANCE { 0.0 } else { value };
            self.matrix[(row, c)] = value;
            if value != 0.0 && c != col {
                support.push(c);
            }
        }
        self.matrix[(row, col)] = 1.0;
        for r in 0..self.matrix.nrows() {
            if r == row {
                continue;
            }
            let factor = self.matrix[(r, col)];
            if factor == 0.0 {
                continue;
            }
            for &c in &support {
                let value = self.matrix[(r, c)] - factor * self.matrix[(row, c)];
                self.matrix[(r, c)] = if value.abs() < DROP_TOLERANCE { 0.0 } else { value };
            }
            self.matrix[(r, col)] = 0.0;
        }
        self.basis[row] = col;
    }

    /// Substitutes `upper - x` for the nonbasic column `col`.
    fn flip_nonbasic(&mut self, col: usize) {
        let rhs = self.rhs();
        let upper = self.upper[col];
        for r in 0..self.matrix.nrows() {
            let coef = self.matrix[(r, col)];
            if coef != 0.0 {
                self.matrix[(r, rhs)] -= coef * upper;
                self.matrix[(r, col)] = -coef;
            }
        }
        self.flipped[col] = !self.flipped[col];
    }

    /// Substitutes `upper - x` for the column basic in `row`.
    fn flip_basic(&mut self, row: usize) {
        let rhs = self.rhs();
        let col = self.basis[row];
        for c in 0..rhs {
            if c != col {
                self.matrix[(row, c)] = -self.matrix[(row, c)];
            }
        }
        self.matrix[(row, rhs)] = self.upper[col] - self.matrix[(row, rhs)];
        self.flipped[col] = !self.flipped[col];
    }

    /// Longest step `entering` can take before a basic column or the
    /// entering column itself hits a bound. `None` means unbounded.
    fn ratio_test(&self, entering: usize, tol: f64, bland: bool) -> Option<Step> {
        let rhs = self.rhs();
        // (row, ratio, |pivot|, to_upper)
        let mut best: Option<(usize, f64, f64, bool)> = None;
        for row in 0..self.rows() {
            let coef = self.matrix[(row, entering)];
            let value = self.matrix[(row, rhs)];
            let basic_upper = self.upper[self.basis[row]];
            let (ratio, to_upper) = if coef > tol {
                (value.max(0.0) / coef, false)
            } else if coef < -tol && basic_upper.is_finite() {
                ((basic_upper - value).max(0.0) / -coef, true)
            } else {
                continue;
            };
            let better = match best {
                None => true,
                Some((best_row, best_ratio, best_pivot, _)) => {
                    ratio < best_ratio
                        || (ratio == best_ratio
                            && if bland {
                                self.basis[row] < self.basis[best_row]
                            } else {
                                coef.abs() > best_pivot
                            })
                }
            };
            if better {
                best = Some((row, ratio, coef.abs(), to_upper));
            }
        }
        let own = self.upper[entering];
        match best {
            Some((_, ratio, _, _)) if own < ratio => Some(Step::Flip { length: own }),
            Some((row, length, _, to_upper)) => Some(Step::Pivot {
                row,
                to_upper,
                length,
            }),
            None if own.is_finite() => Some(Step::Flip { length: own }),
            None => None,
        }
    }

    /// Standard-form values with complemented columns undone.
    fn values(&self) -> Vec<f64> {
        let rhs = self.rhs();
        let mut standard = vec![0.0; rhs];
        for (row, &col) in self.basis.iter().enumerate() {
            standard[col] = self.matrix[(row, rhs)];
        }
        for (col, value) in standard.iter_mut().enumerate() {
            if self.flipped[col] {
                *value = self.upper[col] - *value;
            }
        }
        standard
    }
}

#[derive(Debug)]
struct StandardForm {
    tableau: Tableau,
    /// Minimization costs of the `n` structural and slack columns.
    costs: Vec<f64>,
    columns: Vec<ColumnMap>,
    /// `-1` where a row was negated to make its rhs non-negative.
    row_signs: Vec<f64>,
    /// Column holding each row's unit entry in the starting basis.
    unit_columns: Vec<usize>,
    n: usize,
    artificials: usize,
}

impl StandardForm {
    fn build<R: Copy + Eq>(model: &LpModel<R>) -> Self {
        let sense_sign = match model.sense() {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        };

        let mut costs = Vec::new();
        let mut upper = Vec::new();
        let mut columns = Vec::with_capacity(model.num_variables());
        for var in model.variables() {
            let cost = sense_sign * var.objective;
            if var.lower.is_finite() {
                columns.push(ColumnMap::Shifted {
                    col: costs.len(),
                    lower: var.lower,
                });
                costs.push(cost);
                upper.push(var.upper - var.lower);
            } else if var.upper.is_finite() {
                columns.push(ColumnMap::Mirrored {
                    col: costs.len(),
                    upper: var.upper,
                });
                costs.push(-cost);
                upper.push(f64::INFINITY);
            } else {
                let pos = costs.len();
                columns.push(ColumnMap::Split { pos, neg: pos + 1 });
                costs.extend([cost, -cost]);
                upper.extend([f64::INFINITY; 2]);
            }
        }

        // row coefficients over structural columns, rhs, slack sign
        let constraints = model.constraints();
        let m = constraints.len();
        let mut rows: Vec<(Vec<(usize, f64)>, f64, Option<f64>)> = Vec::with_capacity(m);
        for constraint in constraints {
            let mut terms = Vec::with_capacity(constraint.terms.len() + 1);
            let mut rhs = constraint.rhs;
            for &(var, coef) in &constraint.terms {
                match columns[var.index()] {
                    ColumnMap::Shifted { col, lower } => {
                        terms.push((col, coef));
                        rhs -= coef * lower;
                    }
                    ColumnMap::Mirrored { col, upper } => {
                        terms.push((col, -coef));
                        rhs -= coef * upper;
                    }
                    ColumnMap::Split { pos, neg } => {
                        terms.push((pos, coef));
                        terms.push((neg, -coef));
                    }
                }
            }
            let slack = match constraint.relation {
                Relation::LessEq => Some(1.0),
                Relation::GreaterEq => Some(-1.0),
                Relation::Equal => None,
            };
            rows.push((terms, rhs, slack));
        }

        let structural = costs.len();
        let slacks = rows.iter().filter(|(_, _, slack)| slack.is_some()).count();
        let n = structural + slacks;
        let row_signs: Vec<f64> = rows
            .iter()
            .map(|(_, rhs, _)| if *rhs < 0.0 { -1.0 } else { 1.0 })
            .collect();
        let artificials = rows
            .iter()
            .zip(&row_signs)
            .filter(|((_, _, slack), sign)| slack.is_none_or(|s| s * **sign < 0.0))
            .count();
        let width = n + artificials;

        let mut matrix = DMatrix::<f64>::zeros(m + 1, width + 1);
        let mut unit_columns = Vec::with_capacity(m);
        let mut slack_col = structural;
        let mut artificial_col = n;
        for (row, ((terms, rhs, slack), &sign)) in rows.iter().zip(&row_signs).enumerate() {
            for &(col, coef) in terms {
                matrix[(row, col)] += sign * coef;
            }
            matrix[(row, width)] = sign * rhs;
            let mut unit = None;
            if let Some(slack) = slack {
                matrix[(row, slack_col)] = sign * slack;
                if sign * slack > 0.0 {
                    unit = Some(slack_col);
                }
                slack_col += 1;
            }
            let unit = unit.unwrap_or_else(|| {
                artificial_col += 1;
                artificial_col - 1
            });
            matrix[(row, unit)] = 1.0;
            unit_columns.push(unit);
        }

        costs.resize(width, 0.0);
        upper.resize(width, f64::INFINITY);
        Self {
            tableau: Tableau {
                matrix,
                basis: unit_columns.clone(),
                upper,
                flipped: vec![false; width],
            },
            costs,
            columns,
            row_signs,
            unit_columns,
            n,
            artificials,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseStop {
    Unbounded,
    IterationLimit,
}

impl DenseSimplex {
    /// Steps until no column below `entering_limit` has a negative reduced
    /// cost under `costs`.
    fn run_phase(
        &self,
        tableau: &mut Tableau,
        costs: &[f64],
        entering_limit: usize,
        iterations: &mut usize,
    ) -> Result<(), PhaseStop> {
        let optimality = self.options.optimality_tolerance;
        tableau.price(costs);
        let mut freshly_priced = true;
        let mut degenerate = 0usize;
        loop {
            let bland = degenerate >= self.options.degenerate_pivot_limit;
            let mut candidates =
                (0..entering_limit).filter(|&col| tableau.reduced_cost(col) < -optimality);
            let entering = if bland {
                candidates.next()
            } else {
                candidates.min_by(|&a, &b| {
                    tableau
                        .reduced_cost(a)
                        .total_cmp(&tableau.reduced_cost(b))
                })
            };
            let Some(entering) = entering else {
                if freshly_priced {
                    return Ok(());
                }
                tableau.price(costs);
                freshly_priced = true;
                continue;
            };
            if *iterations >= self.options.max_iterations {
                return Err(PhaseStop::IterationLimit);
            }
            let Some(step) = tableau.ratio_test(entering, self.options.pivot_tolerance, bland)
            else {
                return Err(PhaseStop::Unbounded);
            };

            match step {
                Step::Flip { .. } => tableau.flip_nonbasic(entering),
                Step::Pivot { row, to_upper, .. } => {
                    if to_upper {
                        tableau.flip_basic(row);
                    }
                    tableau.pivot(row, entering);
                }
            }
            *iterations += 1;
            freshly_priced = false;
            if step.length() <= DEGENERATE_STEP {
                degenerate += 1;
            } else {
                degenerate = 0;
            }
        }
    }

    /// Replaces artificials still basic at level zero after phase one by
    /// structural columns. Rows with no structural entry are redundant and
    /// keep their artificial, which can never re-enter.
    fn drive_out_artificials(&self, tableau: &mut Tableau, n: usize) {
        let rhs = tableau.rhs();
        for row in 0..tableau.rows() {
            if tableau.basis[row] < n {
                continue;
            }
            let candidate = (0..n)
                .filter(|&col| tableau.matrix[(row, col)].abs() > self.options.pivot_tolerance)
                .max_by(|&a, &b| {
                    tableau.matrix[(row, a)]
                        .abs()
                        .total_cmp(&tableau.matrix[(row, b)].abs())
                });
            if let Some(col) = candidate {
                tableau.matrix[(row, rhs)] = 0.0;
                tableau.pivot(row, col);
            }
        }
    }
}

impl LpBackend for DenseSimplex {
    fn solve<R: Copy + Eq>(&self, model: &LpModel<R>) -> LpSolution<R> {
        let StandardForm {
            mut tableau,
            costs,
            columns,
            row_signs,
            unit_columns,
            n,
            artificials,
        } = StandardForm::build(model);
        let m = tableau.rows();
        let rhs = tableau.rhs();
        let mut iterations = 0usize;

        if artificials > 0 {
            let scale = 1.0
                + (0..m)
                    .map(|row| tableau.matrix[(row, rhs)].abs())
                    .fold(0.0, f64::max);
            let mut phase_one = vec![0.0; n + artificials];
            phase_one[n..].fill(1.0);
            if let Err(stop) = self.run_phase(&mut tableau, &phase_one, n, &mut iterations) {
                let message = match stop {
                    PhaseStop::IterationLimit => "iteration limit reached in phase one",
                    PhaseStop::Unbounded => "phase one reported an unbounded ray",
                };
                tracing::warn!(rows = m, columns = n, iterations, "{message}");
                return LpSolution::failed(LpStatus::Error, iterations, message);
            }

            let infeasibility = tableau.basic_objective(&phase_one);
            if infeasibility > self.options.feasibility_tolerance * scale {
                tracing::debug!(rows = m, columns = n, iterations, infeasibility, "lp infeasible");
                return LpSolution::failed(
                    LpStatus::Infeasible,
                    iterations,
                    format!("phase one residual {infeasibility:e}"),
                );
            }
            self.drive_out_artificials(&mut tableau, n);
        }

        if let Err(stop) = self.run_phase(&mut tableau, &costs, n, &mut iterations) {
            return match stop {
                PhaseStop::Unbounded => {
                    tracing::debug!(rows = m, columns = n, iterations, "lp unbounded");
                    LpSolution::failed(LpStatus::Unbounded, iterations, "objective is unbounded")
                }
                PhaseStop::IterationLimit => {
                    tracing::warn!(rows = m, columns = n, iterations, "iteration limit reached");
                    LpSolution::failed(
                        LpStatus::Error,
                        iterations,
                        "iteration limit reached in phase two",
                    )
                }
            };
        }

        let standard = tableau.values();
        let primal: Vec<f64> = columns.iter().map(|map| map.recover(&standard)).collect();
        let objective = model
            .variables()
            .iter()
            .zip(&primal)
            .map(|(var, value)| var.objective * value)
            .sum();

        // y' = c_B' B^-1, one unit column of the starting basis per row; undo
        // the row negation and the max -> min rewrite to get shadow prices.
        let sense_sign = match model.sense() {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        };
        let duals = unit_columns
            .iter()
            .zip(&row_signs)
            .map(|(&unit, sign)| {
                let y: f64 = tableau
                    .basis
                    .iter()
                    .enumerate()
                    .map(|(row, &col)| tableau.cost(&costs, col) * tableau.matrix[(row, unit)])
                    .sum();
                sense_sign * sign * y
            })
            .collect();

        tracing::debug!(rows = m, columns = n, iterations, objective, "lp optimal");
        LpSolution::optimal(model, objective, primal, duals, iterations)
    }
}
