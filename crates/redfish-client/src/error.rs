//! # Client Errors
//!
//! This module defines the common error type used throughout the client.
//! By centralizing error definitions, we ensure consistent error handling
//! across navigation, dispatch and job monitoring.
//!
//! The variants split into two families with different propagation rules:
//!
//! - Configuration/programming errors (`NotFound`, `InconsistentDispatch`,
//!   `MalformedTypeAnnotation`) surface immediately and are never retried.
//! - Operational errors: `RemoteFault` carries the service's structured
//!   error envelope for caller inspection; `TransientIo` is retryable but
//!   only the job monitor retries it; `Timeout` records which bound fired.

use crate::transport::ErrorEnvelope;

/// Which deadline fired for a [`Error::Timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutScope {
    /// The per-step (single poll pass) bound.
    Step,
    /// The overall operation deadline.
    Overall,
}

impl std::fmt::Display for TimeoutScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutScope::Step => write!(f, "step"),
            TimeoutScope::Overall => write!(f, "overall"),
        }
    }
}

/// Errors that can occur while navigating resources or driving jobs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No dispatch match, a missing field, or an absent collection member.
    #[error("not found: {0}")]
    NotFound(String),

    /// Type-based and route-based resolution selected different handlers.
    #[error("dispatch disagreement: type selects {type_based}, route selects {route_based}")]
    InconsistentDispatch {
        type_based: &'static str,
        route_based: &'static str,
    },

    /// The service answered with a structured error envelope.
    #[error("remote fault: {0}")]
    RemoteFault(ErrorEnvelope),

    /// A deadline was exceeded.
    #[error("{scope} deadline exceeded")]
    Timeout { scope: TimeoutScope },

    /// A retryable network or 5xx condition reported by the transport.
    #[error("transient I/O failure: {0}")]
    TransientIo(String),

    /// A type annotation that does not follow `#Resource[.Version].Term`.
    #[error("malformed type annotation: {0:?}")]
    MalformedTypeAnnotation(String),
}

impl Error {
    /// True for errors the job monitor may retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientIo(_))
    }
}
