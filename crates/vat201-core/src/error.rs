use thiserror::Error;

#[derive(Debug, Error)]
pub enum VatEngineError {
    #[error("Invalid configuration: {field} — {reason}")]
    Configuration { field: String, reason: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("State violation: {entity} in state {from} does not allow {attempted}")]
    StateViolation {
        entity: String,
        from: String,
        attempted: String,
    },

    #[error("Validation failure: {0}")]
    Validation(String),

    #[error("Concurrent generation conflict for period {period}")]
    Conflict { period: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for VatEngineError {
    fn from(e: serde_json::Error) -> Self {
        VatEngineError::Serialization(e.to_string())
    }
}
