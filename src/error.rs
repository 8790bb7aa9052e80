use thiserror::Error;

/// Why an observation could not be handed to the agent.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// The ingestion queue is full; back off or retry.
    #[error("ingestion queue is full")]
    Saturated,
    /// The agent has been shut down.
    #[error("agent is shut down")]
    Closed,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("gauge `{name}` has non-finite value {value}")]
    NonFiniteGauge { name: String, value: f64 },
    /// A batch handed to a transport is never empty.
    #[error("empty batch")]
    Empty,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
