use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The instance failed validation before any model was built.
    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    /// The solver proved that no assignment satisfies the constraint system.
    ///
    /// `required` is the demand the coverage rows force to be served, so a
    /// caller can tell genuine scarcity (`required > capacity`) from a
    /// formulation problem.
    #[error("model is infeasible: {required:.2} units must be served, {capacity:.2} available")]
    Infeasible { required: f64, capacity: f64 },

    #[error("model is unbounded")]
    Unbounded,

    #[error("solver failed: {0}")]
    Solver(String),

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidInstance(reason.into())
    }
}
