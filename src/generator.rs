//! Random instance synthesis.
//!
//! Generation is kept apart from model construction: the output is a plain
//! [`Problem`] that can be serialised, inspected, and solved like a literal
//! instance.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Client, CostPolicy, Facility, Formulation, SolverOptions};
use crate::Problem;

/// Inclusive integer range, written `[min, max]` in YAML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span(pub u32, pub u32);

impl Span {
    fn range(self, field: &str) -> Result<RangeInclusive<u32>> {
        if self.0 > self.1 {
            return Err(Error::invalid(format!(
                "generator range {field} is empty: [{}, {}]",
                self.0, self.1
            )));
        }
        Ok(self.0..=self.1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GeneratorConfig {
    pub cost: CostPolicy,
    pub facilities: Span,
    pub capacity: Span,
    pub facility_cost: Span,
    pub clients: Span,
    pub demand: Span,
    pub gain: Span,
    /// Draw a uniform tolerance in `[0, 1)` for each client.
    pub random_tolerance: bool,
    /// Transport cost per unit for every pair (transport policy).
    pub transport: Span,
    /// Probability that two facility nodes share an edge (network policy).
    pub edge_probability: f64,
    pub edge_weight: Span,
    pub formulation: Formulation,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            cost: CostPolicy::Activation,
            facilities: Span(5, 15),
            capacity: Span(4, 8),
            facility_cost: Span(10, 50),
            clients: Span(2, 5),
            demand: Span(5, 30),
            gain: Span(0, 0),
            random_tolerance: true,
            transport: Span(10, 60),
            edge_probability: 0.8,
            edge_weight: Span(1, 100),
            formulation: Formulation::default(),
        }
    }
}

/// Produces reproducible instances from a seed.
pub struct Generator {
    config: GeneratorConfig,
    rng: StdRng,
}

impl Generator {
    pub fn new(config: GeneratorConfig, seed: u64) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.edge_probability) {
            return Err(Error::invalid(format!(
                "edge-probability must be in [0, 1], got {}",
                config.edge_probability
            )));
        }
        if config.capacity.0 == 0 || config.demand.0 == 0 {
            return Err(Error::invalid("capacity and demand ranges must start above 0"));
        }
        if config.facilities.0 == 0 || config.clients.0 == 0 {
            return Err(Error::invalid("facility and client counts must start above 0"));
        }
        Ok(Generator {
            config,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    fn draw(&mut self, span: Span, field: &str) -> Result<u32> {
        Ok(self.rng.gen_range(span.range(field)?))
    }

    pub fn generate(&mut self) -> Result<Problem> {
        let config = self.config.clone();
        let n = self.draw(config.facilities, "facilities")? as usize;
        let m = self.draw(config.clients, "clients")? as usize;

        let facilities = (0..n)
            .map(|j| -> Result<Facility> {
                Ok(Facility {
                    id: j.to_string(),
                    capacity: self.draw(config.capacity, "capacity")?.into(),
                    cost: self.draw(config.facility_cost, "facility-cost")?.into(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let network = match config.cost {
            CostPolicy::Network => Some(self.network(n)?),
            _ => None,
        };

        let clients = (0..m)
            .map(|i| -> Result<Client> {
                let tolerance = config.random_tolerance.then(|| self.rng.r#gen::<f64>());
                let origin = network.as_ref().map(|_| self.rng.gen_range(0..n));
                Ok(Client {
                    id: i.to_string(),
                    demand: self.draw(config.demand, "demand")?.into(),
                    gain: self.draw(config.gain, "gain")?.into(),
                    tolerance,
                    origin,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let transport = match config.cost {
            CostPolicy::Transport => Some(
                (0..m)
                    .map(|_| {
                        (0..n)
                            .map(|_| -> Result<f64> {
                                Ok(self.draw(config.transport, "transport")?.into())
                            })
                            .collect::<Result<Vec<f64>>>()
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            _ => None,
        };

        debug!(facilities = n, clients = m, cost = %config.cost, "generated instance");
        Ok(Problem {
            facilities,
            clients,
            cost: config.cost,
            transport,
            network,
            formulation: config.formulation,
            solver: SolverOptions::default(),
        })
    }

    /// Symmetric adjacency matrix with random edges; 0 means no edge.
    fn network(&mut self, n: usize) -> Result<Vec<Vec<f64>>> {
        let mut adjacency = vec![vec![0.0; n]; n];
        for a in 0..n {
            for b in a + 1..n {
                if self.rng.gen_bool(self.config.edge_probability) {
                    let weight: f64 = self.draw(self.config.edge_weight, "edge-weight")?.into();
                    adjacency[a][b] = weight;
                    adjacency[b][a] = weight;
                }
            }
        }
        Ok(adjacency)
    }
}
