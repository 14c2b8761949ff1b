//! Error types for connection lifecycle management.

use crate::connection::ConnectionState;

/// Errors raised while configuring, initializing or using a connection.
///
/// `Configuration`, `Authentication` and `Construction` are the causes a
/// connection can fail with during `init`; they always reach the caller wrapped
/// in [`ConnectionError::Init`] so the lifecycle controller sees one failure per
/// `init` call. Messages never contain credential material.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Invalid or unknown configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Credentials could not be resolved.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// The client factory or endpoint builder failed to produce a client.
    #[error("client construction failed: {0}")]
    Construction(String),

    /// The client was requested before `init` or after teardown.
    #[error("{service} connection is not initialized")]
    NotInitialized {
        /// Service the connection is bound to.
        service: &'static str,
    },

    /// A lifecycle transition was requested from a state that does not allow it.
    #[error("cannot {operation} {service} connection while it is {state}")]
    InvalidState {
        /// Service the connection is bound to.
        service: &'static str,
        /// The rejected lifecycle operation.
        operation: &'static str,
        /// State the connection was in.
        state: ConnectionState,
    },

    /// `init` failed; the cause is available as the error source.
    #[error("failed to initialize {service} connection")]
    Init {
        /// Service the connection is bound to.
        service: &'static str,
        /// The underlying failure.
        #[source]
        source: Box<ConnectionError>,
    },
}

impl ConnectionError {
    /// The innermost error, looking through [`ConnectionError::Init`] wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &ConnectionError {
        match self {
            Self::Init { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Failure reported by a client while shutting down.
///
/// Never propagated out of `stop`/`close`: the connection logs it and discards
/// the handle anyway.
#[derive(Debug, thiserror::Error)]
#[error("{service} client shutdown failed: {message}")]
pub struct ShutdownError {
    /// Service the client belonged to.
    pub service: &'static str,
    /// Description of the failure.
    pub message: String,
}

impl ShutdownError {
    /// Create a new shutdown error.
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

/// Convenience result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;
