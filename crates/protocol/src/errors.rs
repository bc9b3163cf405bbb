//! Error taxonomy for the BReact client.
//!
//! [`BReactError`] is the only error type that crosses a public API boundary.
//! Transport adapters convert their native failures into
//! [`BReactError::Client`] so callers never see `reqwest` (or any other
//! transport) error types.
//!
//! Errors propagate unchanged from the transport through the orchestrator and
//! registry up to the caller. Nothing here is retried automatically.

use thiserror::Error;

use crate::ServiceId;

/// Coarse classification of a [`BReactError`].
///
/// Useful for logging and for callers that want to branch on the kind of
/// failure without matching on variant fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or invalid configuration; fatal to the calling operation.
    Configuration,
    /// A single HTTP call failed (status, connection, timeout, or decoding).
    Transport,
    /// The requested service has no known definition.
    NotFound,
    /// The remote job finished with an `"error"` status.
    Execution,
}

/// Errors produced by the BReact client.
#[derive(Debug, Error)]
pub enum BReactError {
    /// The client is misconfigured, or a component was used before it was
    /// wired to a client.
    ///
    /// Produced by: configuration resolution (missing API key, bad URL,
    /// invalid timeout), the service registry when no client reference is
    /// bound, and service wrappers whose client has been dropped.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A single HTTP call failed: non-2xx status, connection failure, or
    /// timeout.
    ///
    /// Carries the message of the underlying cause.
    #[error("Client error: {message}")]
    Client {
        /// Description of the transport failure.
        message: String,
    },

    /// A successful HTTP response body did not match the expected wire type.
    #[error("Invalid {context} response: {message}")]
    InvalidResponse {
        /// What was being decoded (e.g. `"submission"`, `"poll"`).
        context: &'static str,
        /// The decoder's error message.
        message: String,
    },

    /// No definition is known for the requested service.
    #[error("Service '{service_id}' not found")]
    ServiceNotFound {
        /// The service that was requested.
        service_id: ServiceId,
    },

    /// The remote job reached the terminal `"error"` status.
    ///
    /// Carries the backend-supplied error message, or `"Unknown error"` when
    /// the backend sent none.
    #[error("Service execution failed: {message}")]
    ServiceExecution {
        /// The error reported by the backend.
        message: String,
    },
}

impl BReactError {
    /// Builds a [`BReactError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Builds a [`BReactError::Client`].
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    /// Builds a [`BReactError::InvalidResponse`] from a decoder error.
    pub fn invalid_response(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            context,
            message: err.to_string(),
        }
    }

    /// Returns the coarse category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Client { .. } | Self::InvalidResponse { .. } => ErrorCategory::Transport,
            Self::ServiceNotFound { .. } => ErrorCategory::NotFound,
            Self::ServiceExecution { .. } => ErrorCategory::Execution,
        }
    }
}
