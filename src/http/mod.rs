//! HTTP protocol layer module
//!
//! Response bodies, builders, and the no-cache decoration every response
//! passes through. Decoupled from path resolution and file-system access.

pub mod body;
pub mod mime;
pub mod nocache;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use body::{FileBody, ServeBody};
pub use nocache::{finalize, NoCache};
pub use range::{parse_range_header, RangeParseResult};
pub use response::{
    build_400_response, build_405_response, build_416_response, build_redirect_response,
};
