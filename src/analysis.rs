//! Turn raw column values into loads, utilisation and totals.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::model::{CoverageMode, Model};
use crate::solver::{Assignment, Status};
use crate::types::{Client, CostPolicy, Facility};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TotalKind {
    Cost,
    Profit,
}

/// The headline figure: the objective for cost-framed policies, its negation
/// for gain-framed ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Total {
    pub kind: TotalKind,
    pub value: f64,
}

impl Total {
    pub fn new(policy: CostPolicy, objective: f64) -> Self {
        match policy {
            CostPolicy::Activation | CostPolicy::Network => Total {
                kind: TotalKind::Cost,
                value: objective,
            },
            CostPolicy::ClientGain | CostPolicy::Transport => Total {
                kind: TotalKind::Profit,
                value: -objective,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FacilityUsage {
    pub id: String,
    pub active: bool,
    pub load: f64,
    pub utilization: f64,
    /// Fraction of each served client's demand handled here.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub serves: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientService {
    pub id: String,
    pub demand: f64,
    pub delivered: f64,
    pub coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Report {
    pub status: Status,
    pub objective: f64,
    pub total: Total,
    pub delivered: f64,
    /// Delivered load over total capacity.
    pub capacity_utilization: f64,
    /// Delivered load over total demand.
    pub coverage: f64,
    pub facilities: Vec<FacilityUsage>,
    pub clients: Vec<ClientService>,
    /// `load[i][j]`: demand units of client `i` served by facility `j`.
    pub load: Vec<Vec<f64>>,
}

impl Report {
    pub fn active_facilities(&self) -> impl Iterator<Item = &FacilityUsage> {
        self.facilities.iter().filter(|f| f.active)
    }
}

/// Demand the coverage rows force the solver to serve.
pub fn required_service(clients: &[Client], coverage: CoverageMode) -> f64 {
    match coverage {
        CoverageMode::Exact => clients.iter().map(|c| c.demand).sum(),
        CoverageMode::Bounded => clients.iter().map(|c| c.tolerance() * c.demand).sum(),
    }
}

pub fn analyze(
    facilities: &[Facility],
    clients: &[Client],
    policy: CostPolicy,
    model: &Model,
    assignment: &Assignment,
) -> Result<Report> {
    match assignment.status {
        Status::Infeasible => {
            return Err(Error::Infeasible {
                required: required_service(clients, model.coverage),
                capacity: facilities.iter().map(|f| f.capacity).sum(),
            });
        }
        Status::Unbounded => return Err(Error::Unbounded),
        Status::Optimal | Status::Feasible => {}
    }
    let objective = assignment
        .objective
        .ok_or_else(|| Error::Solver("backend returned a solution without an objective".into()))?;

    let dims = model.dimensions;
    let values = &assignment.values;
    if values.len() != dims.variable_count() {
        return Err(Error::Solver(format!(
            "backend returned {} values for {} columns",
            values.len(),
            dims.variable_count()
        )));
    }

    // Activation is binary: anything other than exactly 0 is an open facility
    let active: Vec<bool> = (0..dims.facilities)
        .map(|j| values[dims.activation(j)] != 0.0)
        .collect();

    let load: Vec<Vec<f64>> = clients
        .iter()
        .enumerate()
        .map(|(i, client)| {
            (0..dims.facilities)
                .map(|j| {
                    if active[j] {
                        values[dims.allocation(i, j)] * client.demand
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect();

    let facility_usage = facilities
        .iter()
        .enumerate()
        .map(|(j, facility)| {
            let served: f64 = load.iter().map(|row| row[j]).sum();
            let serves = clients
                .iter()
                .enumerate()
                .filter(|&(i, _)| load[i][j] > 0.0)
                .map(|(i, client)| (client.id.clone(), values[dims.allocation(i, j)]))
                .collect();
            FacilityUsage {
                id: facility.id.clone(),
                active: active[j],
                load: served,
                utilization: served / facility.capacity,
                serves,
            }
        })
        .collect();

    let client_service = clients
        .iter()
        .zip(&load)
        .map(|(client, row)| {
            let delivered: f64 = row.iter().sum();
            ClientService {
                id: client.id.clone(),
                demand: client.demand,
                delivered,
                coverage: delivered / client.demand,
            }
        })
        .collect();

    let delivered: f64 = load.iter().flatten().sum();
    let total_capacity: f64 = facilities.iter().map(|f| f.capacity).sum();
    let total_demand: f64 = clients.iter().map(|c| c.demand).sum();

    Ok(Report {
        status: assignment.status,
        objective,
        total: Total::new(policy, objective),
        delivered,
        capacity_utilization: delivered / total_capacity,
        coverage: delivered / total_demand,
        facilities: facility_usage,
        clients: client_service,
        load,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost;
    use crate::model;
    use crate::types::Formulation;
    use float_eq::assert_float_eq;

    fn instance() -> (Vec<Facility>, Vec<Client>) {
        let facilities = vec![
            Facility {
                id: "a".into(),
                capacity: 10.0,
                cost: 5.0,
            },
            Facility {
                id: "b".into(),
                capacity: 5.0,
                cost: 8.0,
            },
        ];
        let clients = vec![
            Client {
                id: "c".into(),
                demand: 6.0,
                gain: 0.0,
                tolerance: Some(0.5),
                origin: None,
            },
            Client {
                id: "d".into(),
                demand: 4.0,
                gain: 0.0,
                tolerance: None,
                origin: None,
            },
        ];
        (facilities, clients)
    }

    fn solved(values: Vec<f64>, objective: f64) -> Assignment {
        Assignment {
            status: Status::Optimal,
            values,
            objective: Some(objective),
        }
    }

    #[test]
    fn loads_and_utilization() {
        let (facilities, clients) = instance();
        let q = cost::client_gain(&facilities, &clients);
        let m = model::build(&facilities, &clients, &q, &Formulation::default());
        // x = [1, 1], y = [[0.5, 0.5], [1, 0]]
        let assignment = solved(vec![1.0, 1.0, 0.5, 0.5, 1.0, 0.0], 13.0);

        let report =
            analyze(&facilities, &clients, CostPolicy::ClientGain, &m, &assignment).unwrap();
        assert_eq!(report.load, vec![vec![3.0, 3.0], vec![4.0, 0.0]]);
        assert_float_eq!(report.facilities[0].load, 7.0, abs <= 1e-12);
        assert_float_eq!(report.facilities[0].utilization, 0.7, abs <= 1e-12);
        assert_float_eq!(report.facilities[1].utilization, 0.6, abs <= 1e-12);
        assert_float_eq!(report.delivered, 10.0, abs <= 1e-12);
        assert_float_eq!(report.capacity_utilization, 10.0 / 15.0, abs <= 1e-12);
        assert_float_eq!(report.coverage, 1.0, abs <= 1e-12);
        assert_eq!(report.facilities[1].serves.len(), 1);
        assert_eq!(report.facilities[1].serves["c"], 0.5);
        assert_eq!(report.total.kind, TotalKind::Profit);
        assert_eq!(report.total.value, -13.0);
    }

    #[test]
    fn closed_facility_reports_no_load() {
        let (facilities, clients) = instance();
        let q = cost::activation(&facilities, &clients);
        let m = model::build(&facilities, &clients, &q, &Formulation::default());
        // residual allocation on the closed facility b is ignored
        let assignment = solved(vec![1.0, 0.0, 1.0, 1e-9, 1.0, 0.0], 55.0);

        let report =
            analyze(&facilities, &clients, CostPolicy::Activation, &m, &assignment).unwrap();
        assert!(report.facilities[0].active);
        assert!(!report.facilities[1].active);
        assert_eq!(report.facilities[1].load, 0.0);
        assert!(report.facilities[1].serves.is_empty());
        assert_eq!(report.active_facilities().count(), 1);
        assert_eq!(report.total.kind, TotalKind::Cost);
        assert_eq!(report.total.value, 55.0);
        assert_eq!(report.clients[0].coverage, 1.0);
    }

    #[test]
    fn infeasible_carries_required_service() {
        let (facilities, mut clients) = instance();
        clients[0].demand = 30.0;
        let q = cost::activation(&facilities, &clients);
        let m = model::build(&facilities, &clients, &q, &Formulation::default());
        assert_eq!(m.coverage, CoverageMode::Bounded);

        let assignment = Assignment {
            status: Status::Infeasible,
            values: Vec::new(),
            objective: None,
        };
        let err =
            analyze(&facilities, &clients, CostPolicy::Activation, &m, &assignment).unwrap_err();
        match err {
            Error::Infeasible { required, capacity } => {
                assert_eq!(required, 15.0);
                assert_eq!(capacity, 15.0);
            }
            other => panic!("expected infeasible, got {other:?}"),
        }
    }

    #[test]
    fn unbounded_and_short_solutions_are_errors() {
        let (facilities, clients) = instance();
        let q = cost::activation(&facilities, &clients);
        let m = model::build(&facilities, &clients, &q, &Formulation::default());

        let unbounded = Assignment {
            status: Status::Unbounded,
            values: Vec::new(),
            objective: None,
        };
        assert!(matches!(
            analyze(&facilities, &clients, CostPolicy::Activation, &m, &unbounded),
            Err(Error::Unbounded)
        ));

        let short = solved(vec![1.0], 5.0);
        assert!(matches!(
            analyze(&facilities, &clients, CostPolicy::Activation, &m, &short),
            Err(Error::Solver(_))
        ));
    }
}
