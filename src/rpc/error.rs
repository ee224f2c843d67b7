//! Transport-level failures.
//!
//! Remote application errors are not represented here; they come back as
//! [`crate::rpc::Reply::Error`].

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    /// Dialing the socket endpoint failed (initial connect or reconnect).
    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The persistent connection was closed by the peer or is unusable.
    #[error("connection is shut down")]
    Shutdown,

    #[error("i/o error: {0}")]
    Io(#[source] io::Error),

    #[error("cannot encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// The response could not be decoded as a JSON-RPC envelope.
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("response id {got} does not match request id {expected}")]
    IdMismatch { expected: u64, got: String },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP status >= 400, with the raw response dumped for diagnostics.
    #[error("received non json response\n{0}")]
    Status(String),
}

impl RpcError {
    /// Classify an I/O failure on the socket. Peer-initiated closes become
    /// [`RpcError::Shutdown`] so the reconnect policy can pick them up.
    pub fn from_socket_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => RpcError::Shutdown,
            _ => RpcError::Io(err),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, RpcError::Shutdown)
    }

    /// Whether an interactive session should stop after this failure.
    /// Only a socket that is still gone after the reconnect ends it. Other
    /// failures spoil one call; a socket that failed mid-exchange is already
    /// marked closed and gets re-dialed by the next call.
    pub fn ends_session(&self) -> bool {
        matches!(self, RpcError::Connect { .. } | RpcError::Shutdown)
    }
}
