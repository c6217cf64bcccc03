//! Error types
//!
//! Startup errors are fatal and end the process. Resolve and head errors are
//! per request: they become a status code and never stop the accept loop.

use hyper::StatusCode;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised before the server starts accepting connections
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid listen address '{addr}': {source}")]
    InvalidAddress {
        addr: String,
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("served root '{}' is not usable: {source}", path.display())]
    Root { path: PathBuf, source: io::Error },

    #[error("served root '{}' is not a directory", path.display())]
    RootNotDirectory { path: PathBuf },

    #[error("failed to initialize logger: {0}")]
    Logger(io::Error),

    #[error("failed to build runtime: {0}")]
    Runtime(io::Error),
}

/// Why a request path could not be mapped to something servable
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("malformed request path: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error("i/o error: {0}")]
    Io(#[source] io::Error),
}

impl ResolveError {
    /// Status code surfaced to the client
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<io::Error> for ResolveError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::Forbidden(err.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Failure while reading the request head off a fresh connection
#[derive(Debug, Error)]
pub enum HeadError {
    #[error("malformed request head: {0}")]
    Malformed(#[from] httparse::Error),

    #[error("invalid request target {0:?}")]
    InvalidTarget(String),

    #[error("invalid or conflicting content-length")]
    InvalidContentLength,

    #[error("transfer-encoding does not end in chunked")]
    InvalidTransferEncoding,

    #[error("request head exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("connection closed mid-head after {received} bytes")]
    Truncated { received: usize },

    #[error("i/o error while reading request head: {0}")]
    Io(#[from] io::Error),
}
