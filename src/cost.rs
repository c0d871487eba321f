//! Per-(client, facility) value matrices.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::network::DistanceMatrix;
use crate::types::{Client, CostPolicy, Facility};

/// Whether a matrix entry is earned or paid when the pair is fully served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sense {
    Gain,
    Cost,
}

/// Dense `clients x facilities` matrix `q`.
///
/// A non-finite entry marks a pair that can never be served (its client's
/// origin cannot reach the facility).
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    pub sense: Sense,
    facilities: usize,
    values: Vec<f64>,
}

impl CostMatrix {
    fn from_fn(
        sense: Sense,
        clients: usize,
        facilities: usize,
        f: impl Fn(usize, usize) -> f64,
    ) -> Self {
        let values = (0..clients)
            .flat_map(|i| (0..facilities).map(move |j| (i, j)))
            .map(|(i, j)| f(i, j))
            .collect();
        CostMatrix {
            sense,
            facilities,
            values,
        }
    }

    pub fn get(&self, client: usize, facility: usize) -> f64 {
        self.values[client * self.facilities + facility]
    }

    pub fn is_excluded(&self, client: usize, facility: usize) -> bool {
        !self.get(client, facility).is_finite()
    }

    /// Coefficient of `y[client][facility]` in a minimised objective.
    pub fn objective_coefficient(&self, client: usize, facility: usize) -> f64 {
        if self.is_excluded(client, facility) {
            return 0.0;
        }
        match self.sense {
            Sense::Gain => -self.get(client, facility),
            Sense::Cost => self.get(client, facility),
        }
    }
}

/// Activation policy: `q[i][j] = -(cost[j] * demand[i])`.
pub fn activation(facilities: &[Facility], clients: &[Client]) -> CostMatrix {
    CostMatrix::from_fn(Sense::Gain, clients.len(), facilities.len(), |i, j| {
        -(facilities[j].cost * clients[i].demand)
    })
}

/// Client-gain policy: `q[i][j] = gain[i] * demand[i]` for every `j`.
pub fn client_gain(facilities: &[Facility], clients: &[Client]) -> CostMatrix {
    CostMatrix::from_fn(Sense::Gain, clients.len(), facilities.len(), |i, _| {
        clients[i].gain * clients[i].demand
    })
}

/// Transport policy: `q[i][j] = (gain[i] - transport[i][j]) * demand[i]`.
pub fn transport(
    facilities: &[Facility],
    clients: &[Client],
    transport: &[Vec<f64>],
) -> Result<CostMatrix> {
    if transport.len() != clients.len()
        || transport.iter().any(|row| row.len() != facilities.len())
    {
        return Err(Error::invalid(format!(
            "transport matrix must be {} x {} (clients x facilities)",
            clients.len(),
            facilities.len()
        )));
    }
    if transport.iter().flatten().any(|t| !t.is_finite()) {
        return Err(Error::invalid("transport costs must be finite"));
    }

    Ok(CostMatrix::from_fn(
        Sense::Gain,
        clients.len(),
        facilities.len(),
        |i, j| (clients[i].gain - transport[i][j]) * clients[i].demand,
    ))
}

/// Network policy: `q[i][j] = (cost[j] + distance[origin(i)][j]) * demand[i]`.
///
/// Unreachable pairs stay infinite.
pub fn network(
    facilities: &[Facility],
    clients: &[Client],
    distances: &DistanceMatrix,
) -> Result<CostMatrix> {
    if distances.len() != facilities.len() {
        return Err(Error::invalid(format!(
            "network has {} nodes but there are {} facilities",
            distances.len(),
            facilities.len()
        )));
    }
    let origins = clients
        .iter()
        .map(|client| match client.origin {
            Some(origin) if origin < facilities.len() => Ok(origin),
            Some(origin) => Err(Error::invalid(format!(
                "client '{}' has origin node {origin}, but only {} nodes exist",
                client.id,
                facilities.len()
            ))),
            None => Err(Error::invalid(format!(
                "client '{}' has no origin node",
                client.id
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CostMatrix::from_fn(
        Sense::Cost,
        clients.len(),
        facilities.len(),
        |i, j| (facilities[j].cost + distances.get(origins[i], j)) * clients[i].demand,
    ))
}

/// Build the matrix for `policy`.
pub fn build(
    policy: CostPolicy,
    facilities: &[Facility],
    clients: &[Client],
    transport_costs: Option<&[Vec<f64>]>,
    distances: Option<&DistanceMatrix>,
) -> Result<CostMatrix> {
    match policy {
        CostPolicy::Activation => Ok(activation(facilities, clients)),
        CostPolicy::ClientGain => Ok(client_gain(facilities, clients)),
        CostPolicy::Transport => {
            let matrix = transport_costs
                .ok_or_else(|| Error::invalid("transport policy requires a transport matrix"))?;
            transport(facilities, clients, matrix)
        }
        CostPolicy::Network => {
            let distances = distances
                .ok_or_else(|| Error::invalid("network policy requires a network"))?;
            network(facilities, clients, distances)
        }
    }
}
