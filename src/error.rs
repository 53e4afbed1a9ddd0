//! Error taxonomy for schedule generation.
//!
//! Failures fall into three buckets:
//! - Client-correctable: missing inputs, unresolvable flair ids.
//! - Retryable: generation backend failures and store failures. Nothing is
//!   retried internally — retry policy belongs to the caller.
//! - Defects: merge invariant violations. Never swallowed, never mapped to a
//!   default empty schedule.

use serde::Serialize;
use thiserror::Error;

use crate::db::DbError;

/// Failures from the external generation backend. One kind, three reasons;
/// all are recoverable by caller retry with backoff.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The call itself failed (network, auth, quota).
    #[error("generation backend unavailable: {0}")]
    Upstream(String),

    /// The backend answered with no payload.
    #[error("generation backend returned an empty response")]
    EmptyResponse,

    /// The payload did not parse as the declared schedule schema, even after
    /// stripping prose and code fencing.
    #[error("generation response did not match the schedule schema: {0}")]
    Malformed(String),
}

/// Top-level error for the schedule generation flow.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("a description or at least one flair id is required")]
    InvalidRequest,

    #[error("none of the supplied flair ids could be resolved")]
    NoFlairData,

    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The merge engine produced an arrangement violating its own invariants.
    /// This is a defect in the implementation, not a legitimate end state.
    #[error("merge invariant violated: {0}")]
    MergeAssertion(String),

    #[error("schedule store failure: {0}")]
    Store(#[from] DbError),
}

impl SchedulerError {
    /// Whether the caller may reasonably retry the whole request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchedulerError::Generation(_) | SchedulerError::Store(_)
        )
    }

    /// Stable machine-readable discriminant for API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerError::InvalidRequest => "invalid_request",
            SchedulerError::NoFlairData => "no_flair_data",
            SchedulerError::Generation(GenerationError::Upstream(_)) => "upstream_unavailable",
            SchedulerError::Generation(GenerationError::EmptyResponse) => "empty_response",
            SchedulerError::Generation(GenerationError::Malformed(_)) => "malformed_response",
            SchedulerError::MergeAssertion(_) => "merge_assertion",
            SchedulerError::Store(_) => "store",
        }
    }

    /// Message safe to show to the end user. Store and assertion failures
    /// stay opaque; their detail is logged where they occur.
    pub fn user_message(&self) -> String {
        match self {
            SchedulerError::InvalidRequest | SchedulerError::NoFlairData => self.to_string(),
            SchedulerError::Generation(_) => {
                "Schedule generation failed. Please try again.".to_string()
            }
            SchedulerError::MergeAssertion(_) | SchedulerError::Store(_) => {
                "Something went wrong on our side. Please try again later.".to_string()
            }
        }
    }
}

/// Serializable error body for the public request/response boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub kind: String,
    pub message: String,
    pub can_retry: bool,
}

impl From<&SchedulerError> for ApiError {
    fn from(err: &SchedulerError) -> Self {
        if matches!(
            err,
            SchedulerError::MergeAssertion(_) | SchedulerError::Store(_)
        ) {
            log::error!("internal failure surfaced as opaque API error: {}", err);
        }
        ApiError {
            kind: err.kind().to_string(),
            message: err.user_message(),
            can_retry: err.is_retryable(),
        }
    }
}
