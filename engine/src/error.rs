use thiserror::Error;

use plan::model::AdmissionError;
use plan::params::ConfigError;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed market payload; the tick was dropped for the instrument.
    #[error("payload rejected: {0}")]
    Parse(#[from] market::ParseError),

    #[error("plan admission failed: {0}")]
    Admission(#[from] AdmissionError),

    #[error("invalid parameters for plan '{plan_id}': {source}")]
    PlanConfig {
        plan_id: String,
        #[source]
        source: ConfigError,
    },

    #[error("plan '{0}' is already registered")]
    DuplicatePlan(String),
}
