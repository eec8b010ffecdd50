use shared::{FrameError, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

pub type ServerResult<T> = Result<T, ServerError>;
