//! Service error types.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors from starting or running the HTTP server.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The configured bind address is not a socket address.
    #[error("invalid bind address: {addr}")]
    InvalidAddress { addr: String },

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Convenience result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
