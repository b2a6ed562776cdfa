use crate::core::transport::{ConnectError, TransportError};
use thiserror::Error;

/// NusTerm unified error type
#[derive(Error, Debug)]
pub enum NusTermError {
    #[error("No devices with names found")]
    NoNamedDevices,

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid input")]
    InvalidInput,

    #[error("All {attempts} connection attempts failed (last error: {last})")]
    ConnectionExhausted { attempts: u32, last: ConnectError },

    #[error("Connection failed: {0}")]
    Connect(ConnectError),

    #[error("NUS characteristics not found (missing {missing})")]
    MissingCharacteristics { missing: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Output error: {0}")]
    Output(String),
}

impl NusTermError {
    /// Outcomes where the user declined or botched device selection.
    /// These end the invocation cleanly rather than as a failure.
    pub fn is_user_abort(&self) -> bool {
        matches!(
            self,
            NusTermError::NoNamedDevices | NusTermError::InvalidSelection(_) | NusTermError::InvalidInput
        )
    }
}

pub type NusTermResult<T> = Result<T, NusTermError>;
