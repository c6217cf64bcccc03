//! Request handler module
//!
//! Resolves request paths against the served root and builds the file,
//! listing, or error response. Cache headers are applied by the caller.

pub mod listing;
pub mod resolve;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
