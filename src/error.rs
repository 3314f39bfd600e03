use thiserror::Error;

/// Malformed configuration, raised before any simulation runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("vocabulary needs at least start and end actions, got {0}")]
    VocabularyTooSmall(usize),

    #[error("action at position {0} has a blank name")]
    BlankAction(usize),

    #[error("action '{0}' appears more than once in the vocabulary")]
    DuplicateAction(String),

    #[error("model '{model}': expected {expected}x{expected} matrix, row {row} has {actual} columns")]
    DimensionMismatch {
        model: String,
        expected: usize,
        row: usize,
        actual: usize,
    },

    #[error("model '{model}': expected {expected} rows, got {actual}")]
    RowCountMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("model '{model}': entry ({row}, {col}) = {value} is not a valid probability")]
    InvalidProbability {
        model: String,
        row: usize,
        col: usize,
        value: f64,
    },

    #[error("model '{model}': row {row} sums to {sum}, expected 1")]
    RowSum { model: String, row: usize, sum: f64 },

    #[error("model '{model}': row {row} transitions back into the start action")]
    StartReentered { model: String, row: usize },

    #[error("model '{model}': start row allows an empty session but empty sessions are disabled")]
    EmptySessionForbidden { model: String },

    #[error("{what}: {expected} entries expected, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("at least one user class must be configured")]
    EmptyClasses,

    #[error("{what} sum to {sum}, expected 1")]
    DistributionSum { what: &'static str, sum: f64 },

    #[error("{what} = {value} is outside [0, 1]")]
    ProbabilityOutOfRange { what: &'static str, value: f64 },

    #[error("fraud is enabled but no fraud models are configured")]
    NoFraudModels,

    #[error("{0} must be greater than zero")]
    ZeroCount(&'static str),
}

/// Failure of a single chain simulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("session did not reach the end action within {max_steps} steps")]
    SessionTooLong { max_steps: usize },
}

/// Failure of a whole generation run.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("generation cancelled")]
    Cancelled,

    #[error("generation worker failed: {0}")]
    Worker(String),
}

/// Tolerance used for every "sums to one" check.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Check that `value` lies in [0, 1].
pub fn check_probability(what: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::ProbabilityOutOfRange { what, value })
    }
}

/// Check that a list of probabilities forms a discrete distribution.
pub fn check_distribution(what: &'static str, probabilities: &[f64]) -> Result<(), ValidationError> {
    for &p in probabilities {
        check_probability(what, p)?;
    }
    let sum: f64 = probabilities.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(ValidationError::DistributionSum { what, sum });
    }
    Ok(())
}
