use std::fmt;

use thiserror::Error;

/// Custody backend that produced an error or a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Local,
    Device,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Local => write!(f, "local"),
            Backend::Device => write!(f, "device"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid transaction intent ({field}): {reason}")]
    InvalidIntent {
        field: &'static str,
        reason: String,
    },
    #[error("Network unavailable during {operation} for {backend} signer: {message}")]
    NetworkUnavailable {
        backend: Backend,
        operation: &'static str,
        message: String,
    },
    #[error("Hardware device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Transaction rejected by the operator on the device")]
    UserRejected,
    #[error("Device protocol error: {0}")]
    DeviceProtocol(String),
    #[error("Transaction rejected by network: {0}")]
    RejectedByNetwork(String),
    #[error("Invalid price: {0}")]
    InvalidPrice(f64),
    #[error("Invalid tick range: {0}")]
    InvalidRange(String),
    #[error("Arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),
    #[error("Invalid pool key: {0}")]
    InvalidPoolKey(String),
    #[error("Private key parse error: {0}")]
    PrivateKeyParse(String),
    #[error("Signature failure: {0}")]
    SignatureFailure(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure reported by a [`NetworkOracle`](crate::oracle::NetworkOracle).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The round-trip itself failed (transport, timeout, malformed reply).
    #[error("{0}")]
    Unavailable(String),
    /// The node answered and refused the request.
    #[error("{0}")]
    Rejected(String),
}

impl OracleError {
    pub(crate) fn into_error(self, backend: Backend, operation: &'static str) -> Error {
        match self {
            OracleError::Unavailable(message) | OracleError::Rejected(message) => {
                Error::NetworkUnavailable {
                    backend,
                    operation,
                    message,
                }
            }
        }
    }

    /// Broadcast keeps the node's refusal verbatim.
    pub(crate) fn into_broadcast_error(self, backend: Backend) -> Error {
        match self {
            OracleError::Rejected(message) => Error::RejectedByNetwork(message),
            unavailable => unavailable.into_error(backend, "broadcast"),
        }
    }
}

/// Failure reported by a hardware device transport or its Ethereum app.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device unavailable: {0}")]
    Unavailable(String),
    #[error("operator rejected the request")]
    Rejected,
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Unavailable(message) => Error::DeviceUnavailable(message),
            DeviceError::Rejected => Error::UserRejected,
            DeviceError::Protocol(message) => Error::DeviceProtocol(message),
        }
    }
}
