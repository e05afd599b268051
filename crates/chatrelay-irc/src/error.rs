//! Error types for the IRC transport

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IrcError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    #[error("connection closed")]
    ConnectionClosed,
}

pub type IrcResult<T> = Result<T, IrcError>;
