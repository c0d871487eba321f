pub mod analysis;
pub mod cost;
pub mod error;
pub mod generator;
pub mod model;
pub mod network;
pub mod solver;
pub mod types;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info};

pub use analysis::Report;
pub use error::{Error, Result};
pub use model::Model;
pub use solver::Solver;
pub use types::{CapacityMode, Client, CostPolicy, Facility, Formulation, SolverOptions};

use cost::CostMatrix;

/// A single facility location instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub facilities: Vec<Facility>,
    pub clients: Vec<Client>,
    pub cost: CostPolicy,
    /// `transport[i][j]`: unit transport cost from facility `j` to client `i`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Vec<Vec<f64>>>,
    /// Adjacency matrix over facility nodes, `0` meaning no edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub formulation: Formulation,
    #[serde(default)]
    pub solver: SolverOptions,
}

impl Problem {
    /// Reject malformed entities before anything is built.
    pub fn validate(&self) -> Result<()> {
        if self.facilities.is_empty() {
            return Err(Error::invalid("at least one facility is required"));
        }
        if self.clients.is_empty() {
            return Err(Error::invalid("at least one client is required"));
        }
        check_unique_ids("facility", self.facilities.iter().map(|f| f.id.as_str()))?;
        check_unique_ids("client", self.clients.iter().map(|c| c.id.as_str()))?;

        for facility in &self.facilities {
            if !(facility.capacity.is_finite() && facility.capacity > 0.0) {
                return Err(Error::invalid(format!(
                    "facility '{}' has capacity {}; capacity must be positive",
                    facility.id, facility.capacity
                )));
            }
            if !facility.cost.is_finite() {
                return Err(Error::invalid(format!(
                    "facility '{}' has a non-finite cost",
                    facility.id
                )));
            }
        }

        for client in &self.clients {
            if !(client.demand.is_finite() && client.demand > 0.0) {
                return Err(Error::invalid(format!(
                    "client '{}' has demand {}; demand must be positive",
                    client.id, client.demand
                )));
            }
            if !client.gain.is_finite() {
                return Err(Error::invalid(format!(
                    "client '{}' has a non-finite gain",
                    client.id
                )));
            }
            if let Some(tolerance) = client.tolerance {
                if !(0.0..=1.0).contains(&tolerance) {
                    return Err(Error::invalid(format!(
                        "client '{}' has tolerance {tolerance}; tolerance must be in [0, 1]",
                        client.id
                    )));
                }
            }
            if self.cost == CostPolicy::Network {
                match client.origin {
                    Some(origin) if origin < self.facilities.len() => {}
                    Some(origin) => {
                        return Err(Error::invalid(format!(
                            "client '{}' has origin node {origin}, but only {} nodes exist",
                            client.id,
                            self.facilities.len()
                        )));
                    }
                    None => {
                        return Err(Error::invalid(format!(
                            "client '{}' needs an origin node under the network policy",
                            client.id
                        )));
                    }
                }
            }
        }

        if let Some(limit) = self.solver.time_limit {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(Error::invalid(
                    "solver time-limit must be a positive number of seconds",
                ));
            }
        }
        Ok(())
    }

    /// Derive the value matrix for the active cost policy.
    pub fn cost_matrix(&self) -> Result<CostMatrix> {
        let distances = match (self.cost, &self.network) {
            (CostPolicy::Network, Some(adjacency)) => Some(network::shortest_paths(adjacency)?),
            _ => None,
        };
        cost::build(
            self.cost,
            &self.facilities,
            &self.clients,
            self.transport.as_deref(),
            distances.as_ref(),
        )
    }

    /// Validate, derive costs and assemble the model.
    pub fn build_model(&self) -> Result<Model> {
        self.validate()?;
        let costs = self.cost_matrix()?;
        Ok(model::build(
            &self.facilities,
            &self.clients,
            &costs,
            &self.formulation,
        ))
    }

    /// Solve with the default backend.
    pub fn solve(&self) -> Result<Report> {
        let solver = solver::default_backend()?;
        self.solve_with(solver.as_ref())
    }

    pub fn solve_with(&self, solver: &dyn Solver) -> Result<Report> {
        info!(
            cost = %self.cost,
            facilities = self.facilities.len(),
            clients = self.clients.len(),
            "solving instance"
        );
        let model = self.build_model()?;

        let started = Instant::now();
        let assignment = solver.solve(&model, &self.solver)?;
        info!(
            backend = solver.name(),
            status = ?assignment.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "solver finished"
        );

        let report = analysis::analyze(
            &self.facilities,
            &self.clients,
            self.cost,
            &model,
            &assignment,
        )?;
        debug!(
            objective = report.objective,
            active = report.active_facilities().count(),
            "analyzed solution"
        );
        Ok(report)
    }
}

fn check_unique_ids<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(Error::invalid(format!("duplicate {kind} id '{id}'")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CoverageMode;
    use crate::solver::Assignment;
    use float_eq::assert_float_eq;
    use std::fs::{read_dir, read_to_string};
    use std::path::Path;

    /// What a fixture pins down about its optimum.
    #[derive(Debug, Deserialize)]
    struct Expected {
        #[serde(default)]
        objective: Option<f64>,
        #[serde(default)]
        total: Option<f64>,
        #[serde(default)]
        active: Option<Vec<String>>,
        #[serde(default)]
        delivered: Option<f64>,
        #[serde(default)]
        infeasible: bool,
    }

    const EPS: f64 = 1e-6;

    /// Invariants every reported solution must satisfy.
    fn check_invariants(
        problem: &Problem,
        model: &Model,
        assignment: &Assignment,
        report: &Report,
    ) {
        let broken = model.violations(&assignment.values, EPS);
        assert!(broken.is_empty(), "violated rows: {broken:?}");

        for (client, service) in problem.clients.iter().zip(&report.clients) {
            assert!(service.coverage >= -EPS, "{}", client.id);
            assert!(service.coverage <= 1.0 + EPS, "{}", client.id);
            match model.coverage {
                CoverageMode::Exact => {
                    assert_float_eq!(service.coverage, 1.0, abs <= EPS)
                }
                CoverageMode::Bounded => {
                    assert!(service.coverage >= client.tolerance() - EPS, "{}", client.id)
                }
            }
        }
        for (facility, usage) in problem.facilities.iter().zip(&report.facilities) {
            assert!(usage.load <= facility.capacity + EPS, "{}", facility.id);
            if !usage.active {
                assert_eq!(usage.load, 0.0, "{}", facility.id);
            }
        }
        let total_capacity: f64 = problem.facilities.iter().map(|f| f.capacity).sum();
        assert!(report.delivered <= total_capacity + EPS);
    }

    fn run_test_file(test_file: &Path) {
        println!("Running test for file: {:?}", test_file);

        let failure_message = format!("Failed to read test file: {}", test_file.display());
        let yaml_content = read_to_string(test_file).expect(&failure_message);

        // The instance comes first, the expectations after the "expected:" marker
        let parts: Vec<&str> = yaml_content.split("expected:").collect();

        let failure_message = format!("Failed to parse input YAML: {}", test_file.display());
        let input_yaml = parts.first().expect("No input found in test file").trim();
        let problem: Problem = serde_yaml::from_str(input_yaml).expect(&failure_message);

        let failure_message = format!("Failed to parse expected YAML: {}", test_file.display());
        let expected_yaml = parts.get(1).expect(&failure_message);
        let expected: Expected = serde_yaml::from_str(expected_yaml).expect(&failure_message);

        let model = problem.build_model().expect("Failed to build model");
        let assignment = solver::default_backend()
            .and_then(|solver| solver.solve(&model, &problem.solver))
            .expect("Solver backend failed");
        let result = analysis::analyze(
            &problem.facilities,
            &problem.clients,
            problem.cost,
            &model,
            &assignment,
        );

        if expected.infeasible {
            assert!(
                matches!(result, Err(Error::Infeasible { .. })),
                "{}: expected infeasible, got {:?}",
                test_file.display(),
                result
            );
            return;
        }

        let failure_message = format!("Failed to solve test file: {}", test_file.display());
        let report = result.expect(&failure_message);
        println!("received: {}", serde_yaml::to_string(&report).unwrap());

        check_invariants(&problem, &model, &assignment, &report);

        if let Some(objective) = expected.objective {
            assert_float_eq!(report.objective, objective, abs <= EPS);
        }
        if let Some(total) = expected.total {
            assert_float_eq!(report.total.value, total, abs <= EPS);
        }
        if let Some(delivered) = expected.delivered {
            assert_float_eq!(report.delivered, delivered, abs <= EPS);
        }
        if let Some(active) = expected.active {
            let received: Vec<String> = report.active_facilities().map(|f| f.id.clone()).collect();
            assert_eq!(active, received, "{}", test_file.display());
        }
    }

    #[test]
    fn run_all_test_files() {
        // Read all files from the test_data directory
        let test_data_dir = Path::new("test_data");
        let mut entries: Vec<_> = read_dir(test_data_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.is_file() && path.extension().map(|ext| ext == "yaml").unwrap_or(false)
            })
            .collect();

        // Sort paths lexically by filename
        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        for path in entries {
            run_test_file(&path);
        }
    }

    fn scenario_a() -> Problem {
        serde_yaml::from_str(
            r#"
facilities:
  - { id: a, capacity: 10, cost: 5 }
  - { id: b, capacity: 5, cost: 8 }
clients:
  - { id: c, demand: 10 }
cost: client-gain
"#,
        )
        .unwrap()
    }

    #[test]
    fn validation_rejects_malformed_instances() {
        let mut problem = scenario_a();
        problem.facilities[1].capacity = 0.0;
        assert!(matches!(problem.validate(), Err(Error::InvalidInstance(_))));

        let mut problem = scenario_a();
        problem.clients[0].demand = -1.0;
        assert!(problem.validate().is_err());

        let mut problem = scenario_a();
        problem.clients[0].tolerance = Some(1.5);
        assert!(problem.validate().is_err());

        let mut problem = scenario_a();
        problem.facilities[1].id = "a".into();
        assert!(problem.validate().is_err());

        let mut problem = scenario_a();
        problem.cost = CostPolicy::Network;
        problem.network = Some(vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
        problem.clients[0].origin = Some(2);
        assert!(problem.validate().is_err());
        problem.clients[0].origin = None;
        assert!(problem.validate().is_err());
        problem.clients[0].origin = Some(1);
        assert!(problem.validate().is_ok());

        let mut problem = scenario_a();
        problem.clients.clear();
        assert!(problem.validate().is_err());
    }

    #[test]
    fn missing_policy_inputs_fail_before_solving() {
        let mut problem = scenario_a();
        problem.cost = CostPolicy::Transport;
        assert!(matches!(problem.build_model(), Err(Error::InvalidInstance(_))));

        problem.cost = CostPolicy::Network;
        problem.clients[0].origin = Some(0);
        assert!(matches!(problem.build_model(), Err(Error::InvalidInstance(_))));
    }

    #[test]
    fn unreachable_nodes_break_exact_coverage_without_scarcity() {
        let problem: Problem = serde_yaml::from_str(
            r#"
facilities:
  - { id: n0, capacity: 10, cost: 1 }
  - { id: n1, capacity: 10, cost: 1 }
clients:
  - { id: p, demand: 15, origin: 0 }
cost: network
network: [[0, 0], [0, 0]]
"#,
        )
        .unwrap();
        assert_eq!(problem.build_model().unwrap().coverage, CoverageMode::Exact);

        match problem.solve() {
            Err(Error::Infeasible { required, capacity }) => {
                assert_float_eq!(required, 15.0, abs <= EPS);
                assert_float_eq!(capacity, 20.0, abs <= EPS);
                assert!(required <= capacity);
            }
            other => panic!("expected infeasible, got {other:?}"),
        }
    }

    #[test]
    fn scarce_tolerances_report_required_above_capacity() {
        let mut problem = scenario_a();
        problem.cost = CostPolicy::Activation;
        problem.facilities.truncate(1);
        problem.facilities[0].capacity = 5.0;
        problem.clients[0].tolerance = Some(0.8);

        match problem.solve() {
            Err(Error::Infeasible { required, capacity }) => {
                assert_float_eq!(required, 8.0, abs <= EPS);
                assert!(required > capacity);
            }
            other => panic!("expected infeasible, got {other:?}"),
        }
    }

    #[test]
    fn report_serializes_to_yaml() {
        let report = scenario_a().solve().unwrap();
        let yaml = serde_yaml::to_string(&report).unwrap();
        assert!(yaml.contains("status: optimal"));
        assert!(yaml.contains("capacity-utilization"));
        assert!(yaml.contains("kind: profit"));
    }
}
