use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supply point: a server or facility that can serve up to `capacity`
/// units of demand once activated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub capacity: f64,
    /// Activation cost. In the activation and network policies it is also the
    /// unit cost of every demand unit the facility processes.
    pub cost: f64,
}

/// A demand point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub demand: f64,
    /// Revenue per unit of demand served.
    #[serde(default)]
    pub gain: f64,
    /// Minimum fraction of `demand` that must be served when capacity is scarce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    /// Index of the facility node the client's data starts on (network policy only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<usize>,
}

impl Client {
    pub fn tolerance(&self) -> f64 {
        self.tolerance.unwrap_or(0.0)
    }
}

/// How the per-(client, facility) value matrix is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CostPolicy {
    /// Serving costs `facility.cost` per demand unit.
    #[default]
    Activation,
    /// Every served unit earns `client.gain`, wherever it is served.
    ClientGain,
    /// Every served unit earns `client.gain` minus the transport cost of the pair.
    Transport,
    /// Serving costs `facility.cost` plus the shortest-path distance from the
    /// client's origin node, per demand unit.
    Network,
}

impl CostPolicy {
    pub const ALL: [CostPolicy; 4] = [
        CostPolicy::Activation,
        CostPolicy::ClientGain,
        CostPolicy::Transport,
        CostPolicy::Network,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CostPolicy::Activation => "activation",
            CostPolicy::ClientGain => "client-gain",
            CostPolicy::Transport => "transport",
            CostPolicy::Network => "network",
        }
    }
}

impl fmt::Display for CostPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CostPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CostPolicy::ALL
            .into_iter()
            .find(|policy| policy.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = CostPolicy::ALL.iter().map(|p| p.as_str()).collect();
                format!("unknown cost policy '{s}', expected one of {}", known.join(", "))
            })
    }
}

/// Whether capacity rows also tie load to activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapacityMode {
    /// `sum_i d_i * y_ij - S_j * x_j <= 0`
    #[default]
    Coupled,
    /// `sum_i d_i * y_ij <= S_j` plus one linking row `y_ij <= x_j` per pair.
    Decoupled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Formulation {
    #[serde(default)]
    pub capacity: CapacityMode,
    /// Emit `y_ij <= 1` as explicit rows instead of relying on the column bound.
    #[serde(default)]
    pub rate_rows: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SolverOptions {
    /// Wall-clock limit in seconds, for backends that support one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_policy_parses_its_own_names() {
        for policy in CostPolicy::ALL {
            assert_eq!(policy.as_str().parse::<CostPolicy>(), Ok(policy));
        }
        assert!("transit".parse::<CostPolicy>().is_err());
    }

    #[test]
    fn client_defaults() {
        let client: Client = serde_yaml::from_str("{ id: c, demand: 3 }").unwrap();
        assert_eq!(client.gain, 0.0);
        assert_eq!(client.tolerance(), 0.0);
        assert_eq!(client.origin, None);
    }

    #[test]
    fn formulation_uses_kebab_case() {
        let formulation: Formulation =
            serde_yaml::from_str("{ capacity: decoupled, rate-rows: true }").unwrap();
        assert_eq!(formulation.capacity, CapacityMode::Decoupled);
        assert!(formulation.rate_rows);
    }
}
