// Error taxonomy for the client session
use crate::core_engine::EngineError;
use thiserror::Error;

/// Coarse classification of a session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Auth,
    Precondition,
    /// The server refused a command. Servers rarely say whether the target
    /// was missing or forbidden, so both end up here.
    NotFoundOrPermission,
    UnsupportedOption,
    Transfer,
}

#[derive(Error, Debug)]
pub enum FtpError {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected, close the current connection first")]
    AlreadyConnected,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unable to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: EngineError,
    },

    #[error("Unable to close connection: {0}")]
    Close(EngineError),

    #[error("Login incorrect: {0}")]
    Login(EngineError),

    #[error("{action}: {source}")]
    Rejected {
        action: &'static str,
        source: EngineError,
    },

    #[error("Unsupported option: {0}")]
    UnsupportedOption(String),

    #[error("{0}")]
    InvalidOptionValue(String),

    #[error("{action}: {source}")]
    Transfer { action: String, source: EngineError },
}

impl FtpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FtpError::Connect { .. } | FtpError::Close(_) => ErrorKind::Connection,
            FtpError::Login(_) => ErrorKind::Auth,
            FtpError::NotConnected
            | FtpError::AlreadyConnected
            | FtpError::InvalidArgument(_) => ErrorKind::Precondition,
            FtpError::Rejected { .. } => ErrorKind::NotFoundOrPermission,
            FtpError::UnsupportedOption(_) | FtpError::InvalidOptionValue(_) => {
                ErrorKind::UnsupportedOption
            }
            FtpError::Transfer { .. } => ErrorKind::Transfer,
        }
    }

    pub(crate) fn rejected(action: &'static str) -> impl FnOnce(EngineError) -> FtpError {
        move |source| FtpError::Rejected { action, source }
    }
}

pub type FtpResult<T> = Result<T, FtpError>;
