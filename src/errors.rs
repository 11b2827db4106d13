use thiserror::Error;

use crate::entity::Entity;

/// Error type for kvgraph operations.
#[derive(Debug, Error)]
pub enum KvGraphError {
    #[error("store error: {0}")]
    StoreError(String),
    #[error("schema error: {0}")]
    SchemaError(String),
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("validation failed: {}", reasons.join(", "))]
    ValidationFailed {
        entity: Box<Entity>,
        reasons: Vec<String>,
    },
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("cannot combine keys: {0}")]
    CannotCombineKeys(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("data flow error: {0}")]
    DataFlowError(String),
    #[error("callback aborted: {0}")]
    CallbackAborted(String),
}

impl KvGraphError {
    pub fn store<T: Into<String>>(msg: T) -> Self {
        KvGraphError::StoreError(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        KvGraphError::SchemaError(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        KvGraphError::NotFound(msg.into())
    }

    pub fn validation(entity: Entity, reasons: Vec<String>) -> Self {
        KvGraphError::ValidationFailed {
            entity: Box::new(entity),
            reasons,
        }
    }

    pub fn invalid_query<T: Into<String>>(msg: T) -> Self {
        KvGraphError::InvalidQuery(msg.into())
    }

    pub fn cannot_combine<T: Into<String>>(msg: T) -> Self {
        KvGraphError::CannotCombineKeys(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        KvGraphError::InvalidInput(msg.into())
    }

    pub fn data_flow<T: Into<String>>(msg: T) -> Self {
        KvGraphError::DataFlowError(msg.into())
    }

    pub fn callback<T: Into<String>>(msg: T) -> Self {
        KvGraphError::CallbackAborted(msg.into())
    }

    /// True for the sharding signal that callers answer with an unbatched fallback.
    pub fn is_cannot_combine(&self) -> bool {
        matches!(self, KvGraphError::CannotCombineKeys(_))
    }
}
