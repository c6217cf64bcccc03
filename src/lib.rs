//! Static file server that stamps every response with cache-disabling headers.
//!
//! The request path is resolved against a single served root, files are
//! streamed from disk, directories get an index file or a generated listing,
//! and every response leaves through [`http::nocache`] before it is written.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
