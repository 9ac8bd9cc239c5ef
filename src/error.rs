use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Invalid value: {0}")]
    Validation(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    /// Operation attempted in the wrong lifecycle phase.
    #[error("{0}")]
    State(String),

    /// An entry was routed to a month bucket it does not belong to.
    #[error("Entry month {entry} does not match bucket month {bucket}")]
    Mismatch { entry: NaiveDate, bucket: NaiveDate },

    #[error("{context}")]
    Persistence {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid data document")]
    Codec(#[from] serde_json::Error),
}

impl PlanError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn persistence(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Persistence {
            context: context.into(),
            source,
        }
    }

    /// Validation and lifecycle errors can be shown to the user and retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::UnknownCategory(_) | Self::UnknownScenario(_) | Self::State(_)
        )
    }
}
