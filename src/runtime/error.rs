// ABOUTME: Runtime error types with SNAFU pattern.
// ABOUTME: Unifies detection and connection errors for programmatic handling.

use snafu::Snafu;

use super::detection::DetectionError;

/// Errors while connecting to the engine.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("cannot open {socket}: {reason}")]
    Connect { socket: String, reason: String },

    #[error("engine at {socket} did not answer ping: {reason}")]
    Ping { socket: String, reason: String },
}

/// Unified runtime error for detection and connection failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("runtime detection failed: {source}"))]
    Detection { source: DetectionError },

    #[snafu(display("runtime connection failed: {source}"))]
    Connection { source: ConnectionError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// No usable socket was found.
    NoRuntimeFound,
    /// A socket path was given but is missing or not a socket.
    BadSocket,
    /// The socket exists but the engine is unreachable.
    ConnectionFailed,
}

impl RuntimeError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Detection { source } => match source {
                DetectionError::NoRuntimeFound => RuntimeErrorKind::NoRuntimeFound,
                DetectionError::SocketNotFound(_) | DetectionError::NotASocket(_) => {
                    RuntimeErrorKind::BadSocket
                }
            },
            RuntimeError::Connection { .. } => RuntimeErrorKind::ConnectionFailed,
        }
    }
}

impl From<DetectionError> for RuntimeError {
    fn from(source: DetectionError) -> Self {
        RuntimeError::Detection { source }
    }
}

impl From<ConnectionError> for RuntimeError {
    fn from(source: ConnectionError) -> Self {
        RuntimeError::Connection { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_source() {
        let err = RuntimeError::from(DetectionError::NotASocket("/tmp/x".to_string()));
        assert_eq!(err.kind(), RuntimeErrorKind::BadSocket);

        let err = RuntimeError::from(ConnectionError::Ping {
            socket: "/var/run/docker.sock".to_string(),
            reason: "timeout".to_string(),
        });
        assert_eq!(err.kind(), RuntimeErrorKind::ConnectionFailed);
        assert!(err.to_string().contains("did not answer ping"));
    }
}
