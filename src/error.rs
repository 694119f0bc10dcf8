use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Invalid index parameter {name} = {value}")]
    InvalidIndexParameter { name: String, value: f64 },

    #[error("Custom weights must sum to 1.0 (current sum is {sum:.6})")]
    InvalidWeights { sum: f64 },

    #[error("Weight for '{key}' is negative ({value})")]
    NegativeWeight { key: String, value: f64 },

    #[error("Custom weight references unknown group '{key}'")]
    UnknownWeightKey { key: String },

    #[error("No historical data available to derive a baseline year")]
    NoHistoricalData,

    #[error("Import header is missing required column '{0}'")]
    MissingColumn(String),

    #[error("Invalid month {0}: must be between 1 and 12")]
    InvalidMonth(u32),

    #[error("Scenario '{name}' is locked; create a new draft to change it")]
    ScenarioLocked { name: String },

    #[error("Persistence failure (retryable: {retryable}): {message}")]
    Persistence { message: String, retryable: bool },

    #[error("Allocation mismatch at {level}: expected {expected}, got {actual}")]
    AllocationMismatch {
        level: String,
        expected: i64,
        actual: i64,
    },

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PlanError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlanError::Persistence { retryable: true, .. })
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;
