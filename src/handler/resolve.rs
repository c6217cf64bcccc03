//! Request path resolution
//!
//! Turns the URL path into a location under the served root. Normalization
//! is done on decoded URL segments before the file system is touched, and the
//! canonical result is checked again so symlinks cannot lead outside the root.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use crate::config::ServedRoot;
use crate::error::ResolveError;

/// Normalized request path, relative to the served root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    /// Decoded path segments with `.` and `..` already applied
    pub segments: Vec<String>,
    /// Raw path ended with `/`
    pub trailing_slash: bool,
}

impl RequestTarget {
    /// Join the segments onto `base`
    pub fn to_path(&self, base: &Path) -> PathBuf {
        let mut path = base.to_path_buf();
        path.extend(&self.segments);
        path
    }
}

/// What a request path names inside the served root
#[derive(Debug)]
pub enum Resolved {
    File { path: PathBuf, metadata: Metadata },
    Directory { path: PathBuf },
}

/// Parse and normalize the path component of a request URI
///
/// The query string must already be stripped. Each segment is percent-decoded
/// on its own so an encoded `%2F` can never introduce a new separator.
pub fn parse_request_path(raw: &str) -> Result<RequestTarget, ResolveError> {
    let Some(rest) = raw.strip_prefix('/') else {
        return Err(ResolveError::BadRequest(format!(
            "path must start with '/': {raw:?}"
        )));
    };

    let mut segments: Vec<String> = Vec::new();
    for raw_segment in rest.split('/') {
        let segment = urlencoding::decode(raw_segment).map_err(|_| {
            ResolveError::BadRequest(format!("invalid percent-encoding in {raw:?}"))
        })?;

        if segment.contains('\0') {
            return Err(ResolveError::BadRequest("NUL byte in path".to_string()));
        }

        match segment.as_ref() {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(ResolveError::Forbidden(format!(
                        "path escapes served root: {raw}"
                    )));
                }
            }
            s if s.contains(['/', '\\']) => {
                return Err(ResolveError::Forbidden(format!(
                    "encoded separator in path segment: {raw}"
                )));
            }
            s => segments.push(s.to_string()),
        }
    }

    Ok(RequestTarget {
        segments,
        trailing_slash: raw.ends_with('/'),
    })
}

impl ServedRoot {
    /// Map a normalized target onto the file system
    pub async fn resolve(&self, target: &RequestTarget) -> Result<Resolved, ResolveError> {
        let resolved = self.contain(&target.to_path(self.path())).await?;
        match resolved {
            Resolved::File { .. } if target.trailing_slash => Err(ResolveError::NotFound),
            other => Ok(other),
        }
    }

    /// Canonicalize `candidate` and make sure it is still inside the root
    pub async fn contain(&self, candidate: &Path) -> Result<Resolved, ResolveError> {
        let canonical = tokio::fs::canonicalize(candidate).await?;
        if !canonical.starts_with(self.path()) {
            return Err(ResolveError::Forbidden(format!(
                "{} resolves outside served root",
                candidate.display()
            )));
        }

        let metadata = tokio::fs::metadata(&canonical).await?;
        if metadata.is_dir() {
            Ok(Resolved::Directory { path: canonical })
        } else if metadata.is_file() {
            Ok(Resolved::File {
                path: canonical,
                metadata,
            })
        } else {
            Err(ResolveError::Forbidden(format!(
                "{} is not a regular file",
                candidate.display()
            )))
        }
    }
}
