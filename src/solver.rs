//! MILP backends behind a common [`Solver`] trait.
//!
//! Backends receive a fully built [`Model`] and hand back an [`Assignment`].
//! Infeasible and unbounded models are reported through [`Status`]; they are
//! never retried or relaxed here.

use good_lp::Solution as LpSolution;
use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, SolutionStatus, SolverModel,
    Variable, WithTimeLimit, variable, variables,
};
use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{Model, Row, RowSense, VariableKind};
use crate::types::SolverOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Optimal,
    Feasible,
    Infeasible,
    Unbounded,
}

impl From<SolutionStatus> for Status {
    /// Solutions cut short by a time or gap limit are feasible but unproven.
    fn from(status: SolutionStatus) -> Self {
        match status {
            SolutionStatus::Optimal => Status::Optimal,
            SolutionStatus::TimeLimit | SolutionStatus::GapLimit => Status::Feasible,
        }
    }
}

/// Column values and objective returned by a backend.
///
/// `values` is empty and `objective` is `None` unless the status carries a
/// solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub status: Status,
    pub values: Vec<f64>,
    pub objective: Option<f64>,
}

impl Assignment {
    fn without_solution(status: Status) -> Self {
        Assignment {
            status,
            values: Vec::new(),
            objective: None,
        }
    }
}

pub trait Solver {
    fn name(&self) -> &'static str;

    /// Minimise `model`'s objective subject to its rows and bounds.
    fn solve(&self, model: &Model, options: &SolverOptions) -> Result<Assignment>;
}

/// Look up a backend compiled into this build.
pub fn backend(name: &str) -> Option<Box<dyn Solver>> {
    match name {
        #[cfg(feature = "microlp")]
        "microlp" => Some(Box::new(MicroLpSolver)),
        #[cfg(feature = "cbc")]
        "cbc" => Some(Box::new(CbcSolver)),
        _ => None,
    }
}

/// Names accepted by [`backend`].
pub fn backends() -> Vec<&'static str> {
    let mut names = Vec::new();
    if cfg!(feature = "microlp") {
        names.push("microlp");
    }
    if cfg!(feature = "cbc") {
        names.push("cbc");
    }
    names
}

/// The first backend compiled into this build.
pub fn default_backend() -> Result<Box<dyn Solver>> {
    backends()
        .first()
        .and_then(|name| backend(name))
        .ok_or_else(|| {
            Error::Solver("no solver backend enabled; build with `microlp` or `cbc`".into())
        })
}

/// Pure-Rust backend.
#[cfg(feature = "microlp")]
#[derive(Debug, Default, Clone, Copy)]
pub struct MicroLpSolver;

#[cfg(feature = "microlp")]
impl Solver for MicroLpSolver {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn solve(&self, model: &Model, options: &SolverOptions) -> Result<Assignment> {
        let (problem_vars, columns) = init_columns(model);
        let objective = create_objective(model, &columns);
        let lp = problem_vars
            .minimise(objective)
            .using(good_lp::solvers::microlp::microlp);
        let lp = add_rows(lp, &model.rows, &columns);
        let lp = limit_time(lp, options);
        resolve(lp.solve(), model, &columns)
    }
}

/// COIN-OR CBC backend.
#[cfg(feature = "cbc")]
#[derive(Debug, Default, Clone, Copy)]
pub struct CbcSolver;

#[cfg(feature = "cbc")]
impl Solver for CbcSolver {
    fn name(&self) -> &'static str {
        "cbc"
    }

    fn solve(&self, model: &Model, options: &SolverOptions) -> Result<Assignment> {
        let (problem_vars, columns) = init_columns(model);
        let objective = create_objective(model, &columns);
        #[allow(unused_mut)]
        let mut lp = problem_vars
            .minimise(objective)
            .using(good_lp::solvers::coin_cbc::coin_cbc);
        #[cfg(not(debug_assertions))]
        lp.set_parameter("loglevel", "0");
        let lp = add_rows(lp, &model.rows, &columns);
        let lp = limit_time(lp, options);
        resolve(lp.solve(), model, &columns)
    }
}

/// Declare one good_lp variable per model column, in column order.
fn init_columns(model: &Model) -> (ProblemVariables, Vec<Variable>) {
    let mut problem_vars = variables!();
    let columns = model
        .variables
        .iter()
        .map(|spec| {
            let definition = variable().min(spec.lower).max(spec.upper);
            let definition = match spec.kind {
                VariableKind::Binary => definition.integer(),
                VariableKind::Continuous => definition,
            };
            problem_vars.add(definition)
        })
        .collect();
    (problem_vars, columns)
}

fn create_objective(model: &Model, columns: &[Variable]) -> Expression {
    model
        .objective
        .iter()
        .zip(columns)
        .filter(|&(&coef, _)| coef != 0.0)
        .fold(Expression::from(0.0), |sum, (&coef, &column)| {
            sum + column * coef
        })
}

fn row_constraint(row: &Row, columns: &[Variable]) -> Constraint {
    let lhs = row
        .terms
        .iter()
        .fold(Expression::from(0.0), |sum, &(col, coef)| {
            sum + columns[col] * coef
        });
    match row.sense {
        RowSense::Le => lhs.leq(row.rhs),
        RowSense::Eq => lhs.eq(row.rhs),
        RowSense::Ge => lhs.geq(row.rhs),
    }
}

fn add_rows<M: SolverModel>(model: M, rows: &[Row], columns: &[Variable]) -> M {
    rows.iter()
        .fold(model, |m, row| m.with(row_constraint(row, columns)))
}

fn limit_time<M: WithTimeLimit>(model: M, options: &SolverOptions) -> M {
    match options.time_limit {
        Some(seconds) => model.with_time_limit(seconds),
        None => model,
    }
}

fn resolve<S: LpSolution>(
    result: std::result::Result<S, ResolutionError>,
    model: &Model,
    columns: &[Variable],
) -> Result<Assignment> {
    match result {
        Ok(solution) => Ok(create_assignment(&solution, model, columns)),
        Err(ResolutionError::Infeasible) => Ok(Assignment::without_solution(Status::Infeasible)),
        Err(ResolutionError::Unbounded) => Ok(Assignment::without_solution(Status::Unbounded)),
        Err(other) => {
            warn!(error = %other, "solver stopped without a solution");
            Err(Error::Solver(other.to_string()))
        }
    }
}

/// Read back every column. Binary columns are snapped to 0 or 1 so that
/// callers can test activation with exact comparisons.
fn create_assignment(
    solution: &impl LpSolution,
    model: &Model,
    columns: &[Variable],
) -> Assignment {
    let values: Vec<f64> = model
        .variables
        .iter()
        .zip(columns)
        .map(|(spec, &column)| {
            let value = solution.value(column);
            let value = match spec.kind {
                VariableKind::Binary => value.round(),
                VariableKind::Continuous => value,
            };
            value.clamp(spec.lower, spec.upper)
        })
        .collect();
    let objective = model.objective_value(&values);

    Assignment {
        status: solution.status().into(),
        values,
        objective: Some(objective),
    }
}
