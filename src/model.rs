//! Solver-independent MILP formulation.
//!
//! Columns are laid out as `x[0..n]` (activation, binary) followed by
//! `y[i][j]` row-major (fraction of client `i` served by facility `j`).

use tracing::debug;

use crate::cost::CostMatrix;
use crate::types::{CapacityMode, Client, Facility, Formulation};

/// Problem size, shared by every stage that has to index columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub clients: usize,
    pub facilities: usize,
}

impl Dimensions {
    pub fn activation(&self, facility: usize) -> usize {
        facility
    }

    pub fn allocation(&self, client: usize, facility: usize) -> usize {
        self.facilities + client * self.facilities + facility
    }

    pub fn variable_count(&self) -> usize {
        self.facilities + self.clients * self.facilities
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Binary,
    Continuous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSense {
    Le,
    Eq,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Capacity,
    Coverage,
    Linking,
    Tolerance,
    Rate,
}

/// A sparse linear row: `sum(coef * column) <sense> rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub name: String,
    pub family: Family,
    pub terms: Vec<(usize, f64)>,
    pub sense: RowSense,
    pub rhs: f64,
}

impl Row {
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(col, coef)| coef * values[col]).sum()
    }

    pub fn is_satisfied(&self, values: &[f64], eps: f64) -> bool {
        let lhs = self.activity(values);
        match self.sense {
            RowSense::Le => lhs <= self.rhs + eps,
            RowSense::Ge => lhs >= self.rhs - eps,
            RowSense::Eq => (lhs - self.rhs).abs() <= eps,
        }
    }
}

/// Whether every client must be fully served.
///
/// Decided from aggregate totals before the model is built: when total
/// capacity covers total demand coverage rows are equalities, otherwise they
/// are upper bounds and tolerance rows give each client a floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageMode {
    Exact,
    Bounded,
}

impl CoverageMode {
    pub fn select(total_demand: f64, total_capacity: f64) -> Self {
        if total_demand <= total_capacity {
            CoverageMode::Exact
        } else {
            CoverageMode::Bounded
        }
    }

    pub fn for_instance(facilities: &[Facility], clients: &[Client]) -> Self {
        let demand: f64 = clients.iter().map(|c| c.demand).sum();
        let capacity: f64 = facilities.iter().map(|f| f.capacity).sum();
        Self::select(demand, capacity)
    }
}

/// A fully specified minimisation model.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub dimensions: Dimensions,
    pub coverage: CoverageMode,
    pub variables: Vec<Variable>,
    pub objective: Vec<f64>,
    pub rows: Vec<Row>,
}

impl Model {
    pub fn with(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }

    pub fn rows_in(&self, family: Family) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(move |row| row.family == family)
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.iter().zip(values).map(|(c, v)| c * v).sum()
    }

    /// Rows and bounds that `values` breaks by more than `eps`.
    pub fn violations(&self, values: &[f64], eps: f64) -> Vec<String> {
        let bounds = self
            .variables
            .iter()
            .zip(values)
            .filter(|&(var, &v)| v < var.lower - eps || v > var.upper + eps)
            .map(|(var, v)| format!("{} = {v} outside [{}, {}]", var.name, var.lower, var.upper));
        let rows = self
            .rows
            .iter()
            .filter(|row| !row.is_satisfied(values, eps))
            .map(|row| format!("{} violated (activity {})", row.name, row.activity(values)));
        bounds.chain(rows).collect()
    }
}

/// Assemble the model for one instance.
pub fn build(
    facilities: &[Facility],
    clients: &[Client],
    costs: &CostMatrix,
    formulation: &Formulation,
) -> Model {
    let dims = Dimensions {
        clients: clients.len(),
        facilities: facilities.len(),
    };
    let coverage = CoverageMode::for_instance(facilities, clients);

    let model = init_variables(dims, coverage, facilities, clients, costs);

    let model = constrain_capacities(model, facilities, clients, formulation.capacity);
    let model = constrain_coverage(model, clients);
    let model = match formulation.capacity {
        CapacityMode::Coupled => model,
        CapacityMode::Decoupled => constrain_linking(model, facilities, clients),
    };
    let model = match coverage {
        CoverageMode::Exact => model,
        CoverageMode::Bounded => constrain_tolerances(model, clients),
    };
    let model = if formulation.rate_rows {
        constrain_rates(model, facilities, clients)
    } else {
        model
    };

    debug!(
        variables = model.variables.len(),
        rows = model.rows.len(),
        coverage = ?model.coverage,
        capacity = ?formulation.capacity,
        "built model"
    );
    model
}

fn init_variables(
    dims: Dimensions,
    coverage: CoverageMode,
    facilities: &[Facility],
    clients: &[Client],
    costs: &CostMatrix,
) -> Model {
    let mut variables = Vec::with_capacity(dims.variable_count());
    let mut objective = Vec::with_capacity(dims.variable_count());

    for facility in facilities {
        variables.push(Variable {
            name: format!("x[{}]", facility.id),
            kind: VariableKind::Binary,
            lower: 0.0,
            upper: 1.0,
        });
        objective.push(facility.cost);
    }

    for (i, client) in clients.iter().enumerate() {
        for (j, facility) in facilities.iter().enumerate() {
            // Pairs without a finite value can never be served
            let upper = if costs.is_excluded(i, j) { 0.0 } else { 1.0 };
            variables.push(Variable {
                name: format!("y[{},{}]", client.id, facility.id),
                kind: VariableKind::Continuous,
                lower: 0.0,
                upper,
            });
            objective.push(costs.objective_coefficient(i, j));
        }
    }

    Model {
        dimensions: dims,
        coverage,
        variables,
        objective,
        rows: Vec::new(),
    }
}

/// A facility cannot deliver more than its capacity, and nothing unless active
/// in the coupled form.
fn constrain_capacities(
    model: Model,
    facilities: &[Facility],
    clients: &[Client],
    mode: CapacityMode,
) -> Model {
    let dims = model.dimensions;
    facilities.iter().enumerate().fold(model, |m, (j, facility)| {
        let mut terms: Vec<(usize, f64)> = clients
            .iter()
            .enumerate()
            .map(|(i, client)| (dims.allocation(i, j), client.demand))
            .collect();

        let rhs = match mode {
            CapacityMode::Coupled => {
                terms.push((dims.activation(j), -facility.capacity));
                0.0
            }
            CapacityMode::Decoupled => facility.capacity,
        };

        m.with(Row {
            name: format!("capacity[{}]", facility.id),
            family: Family::Capacity,
            terms,
            sense: RowSense::Le,
            rhs,
        })
    })
}

fn client_total(dims: Dimensions, client: usize) -> Vec<(usize, f64)> {
    (0..dims.facilities)
        .map(|j| (dims.allocation(client, j), 1.0))
        .collect()
}

/// Each client receives at most its full demand, exactly its full demand
/// when capacity suffices.
fn constrain_coverage(model: Model, clients: &[Client]) -> Model {
    let dims = model.dimensions;
    let sense = match model.coverage {
        CoverageMode::Exact => RowSense::Eq,
        CoverageMode::Bounded => RowSense::Le,
    };
    clients.iter().enumerate().fold(model, |m, (i, client)| {
        m.with(Row {
            name: format!("coverage[{}]", client.id),
            family: Family::Coverage,
            terms: client_total(dims, i),
            sense,
            rhs: 1.0,
        })
    })
}

/// No supply can come from a closed facility: `y[i][j] - x[j] <= 0`.
fn constrain_linking(model: Model, facilities: &[Facility], clients: &[Client]) -> Model {
    let dims = model.dimensions;
    clients.iter().enumerate().fold(model, |m, (i, client)| {
        facilities.iter().enumerate().fold(m, |m2, (j, facility)| {
            m2.with(Row {
                name: format!("link[{},{}]", client.id, facility.id),
                family: Family::Linking,
                terms: vec![(dims.allocation(i, j), 1.0), (dims.activation(j), -1.0)],
                sense: RowSense::Le,
                rhs: 0.0,
            })
        })
    })
}

/// Under scarcity every client still gets at least its tolerance.
fn constrain_tolerances(model: Model, clients: &[Client]) -> Model {
    let dims = model.dimensions;
    clients.iter().enumerate().fold(model, |m, (i, client)| {
        m.with(Row {
            name: format!("tolerance[{}]", client.id),
            family: Family::Tolerance,
            terms: client_total(dims, i),
            sense: RowSense::Ge,
            rhs: client.tolerance(),
        })
    })
}

fn constrain_rates(model: Model, facilities: &[Facility], clients: &[Client]) -> Model {
    let dims = model.dimensions;
    clients.iter().enumerate().fold(model, |m, (i, client)| {
        facilities.iter().enumerate().fold(m, |m2, (j, facility)| {
            m2.with(Row {
                name: format!("rate[{},{}]", client.id, facility.id),
                family: Family::Rate,
                terms: vec![(dims.allocation(i, j), 1.0)],
                sense: RowSense::Le,
                rhs: 1.0,
            })
        })
    })
}
