//! Static file serving module
//!
//! Streams resolved files, applies index files and listings to directories,
//! and turns resolution errors into status responses.

use crate::config::AppState;
use crate::error::ResolveError;
use crate::handler::listing;
use crate::handler::resolve::Resolved;
use crate::handler::router::RequestContext;
use crate::http::{self, mime, response, FileBody, RangeParseResult, ServeBody};
use crate::logger;
use hyper::Response;
use std::fs::Metadata;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncSeekExt;

/// Serve a regular file, honoring a single byte range
pub async fn serve_file(
    ctx: &RequestContext<'_>,
    path: &Path,
    metadata: &Metadata,
) -> Response<ServeBody> {
    let size = metadata.len();
    let content_type = mime::content_type_for(path);
    let modified = metadata.modified().ok();

    let mut file = match File::open(path).await {
        Ok(f) => f,
        Err(e) => return error_response(&ResolveError::from(e), ctx.path),
    };

    match http::parse_range_header(ctx.range_header, size) {
        RangeParseResult::Valid(range) => {
            if let Err(e) = file.seek(SeekFrom::Start(range.start)).await {
                return error_response(&ResolveError::Io(e), ctx.path);
            }
            response::build_partial_response(
                FileBody::new(file, range.length()),
                content_type,
                range.start,
                range.end,
                size,
                modified,
            )
        }
        RangeParseResult::NotSatisfiable => http::build_416_response(size),
        RangeParseResult::None => response::build_file_response(
            FileBody::new(file, size),
            content_type,
            size,
            modified,
        ),
    }
}

/// Serve a directory: trailing-slash redirect, then index file, then listing
pub async fn serve_directory(
    ctx: &RequestContext<'_>,
    dir: &Path,
    state: &AppState,
) -> Response<ServeBody> {
    if !ctx.path.ends_with('/') {
        // A leading `//` would make the Location protocol-relative
        let path = format!("/{}", ctx.path.trim_start_matches('/'));
        let location = match ctx.query {
            Some(q) => format!("{path}/?{q}"),
            None => format!("{path}/"),
        };
        return http::build_redirect_response(&location);
    }

    for index_file in &state.config.files.index_files {
        match state.root.contain(&dir.join(index_file)).await {
            Ok(Resolved::File { path, metadata }) => {
                return serve_file(ctx, &path, &metadata).await;
            }
            // Missing or unusable index candidates fall through to the next one
            Ok(Resolved::Directory { .. }) | Err(ResolveError::NotFound) => {}
            Err(e) => return error_response(&e, ctx.path),
        }
    }

    if !state.config.files.directory_listing {
        return error_response(
            &ResolveError::Forbidden("directory listing disabled".to_string()),
            ctx.path,
        );
    }

    match listing::read_entries(dir).await {
        Ok(entries) => response::build_html_response(listing::render_listing(ctx.path, &entries)),
        Err(e) => error_response(&ResolveError::from(e), ctx.path),
    }
}

/// Map a resolution failure to its status response, logging the unusual ones
pub fn error_response(err: &ResolveError, path: &str) -> Response<ServeBody> {
    match err {
        ResolveError::NotFound => {}
        ResolveError::BadRequest(reason) => {
            logger::log_warning(&format!("Bad request path {path:?}: {reason}"));
        }
        ResolveError::Forbidden(reason) => {
            logger::log_warning(&format!("Access denied for {path:?}: {reason}"));
        }
        ResolveError::Io(e) => {
            logger::log_error(&format!("Failed to serve {path:?}: {e}"));
        }
    }
    response::build_status_response(err.status())
}
