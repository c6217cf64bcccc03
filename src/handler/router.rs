//! Request dispatch module
//!
//! Entry point for HTTP request processing: method validation, path
//! resolution, and dispatch to file or directory serving.

use crate::config::AppState;
use crate::handler::resolve::{self, Resolved};
use crate::handler::static_files;
use crate::http::{self, response, ServeBody};
use crate::logger;
use hyper::header::RANGE;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    /// Raw (still percent-encoded) URI path
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub range_header: Option<&'a str>,
}

/// Main entry point for HTTP request handling
///
/// Cache headers are not set here; the caller wraps this in
/// [`crate::http::NoCache`].
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<ServeBody>, Infallible> {
    // The request body is never read
    let (parts, _) = req.into_parts();

    if let Some(resp) = check_http_method(&parts.method) {
        return Ok(resp);
    }

    let ctx = RequestContext {
        path: parts.uri.path(),
        query: parts.uri.query(),
        range_header: parts.headers.get(RANGE).and_then(|v| v.to_str().ok()),
    };

    let resp = route_request(&ctx, &state).await;

    if parts.method == Method::HEAD {
        Ok(response::strip_body(resp))
    } else {
        Ok(resp)
    }
}

/// Check HTTP method and return 405 for anything but GET/HEAD
fn check_http_method(method: &Method) -> Option<Response<ServeBody>> {
    match *method {
        Method::GET | Method::HEAD => None,
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Resolve the request path and dispatch to the matching serve function
async fn route_request(ctx: &RequestContext<'_>, state: &AppState) -> Response<ServeBody> {
    let target = match resolve::parse_request_path(ctx.path) {
        Ok(t) => t,
        Err(e) => return static_files::error_response(&e, ctx.path),
    };

    match state.root.resolve(&target).await {
        Ok(Resolved::File { path, metadata }) => {
            static_files::serve_file(ctx, &path, &metadata).await
        }
        Ok(Resolved::Directory { path }) => {
            static_files::serve_directory(ctx, &path, state).await
        }
        Err(e) => static_files::error_response(&e, ctx.path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::BodyExt;
    use hyper::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION};
    use hyper::StatusCode;
    use temp_dir::TempDir;

    fn fixture() -> (TempDir, Arc<AppState>) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.child("hello.txt"), b"hello world").unwrap();
        std::fs::create_dir(dir.child("docs")).unwrap();
        std::fs::write(dir.child("docs").join("guide.md"), b"# guide").unwrap();
        std::fs::create_dir(dir.child("site")).unwrap();
        std::fs::write(dir.child("site").join("index.html"), b"<h1>site</h1>").unwrap();

        let mut config = Config::default();
        config.files.root = dir.path().to_string_lossy().into_owned();
        let state = Arc::new(AppState::new(config).unwrap());
        (dir, state)
    }

    async fn send(
        state: &Arc<AppState>,
        method: Method,
        uri: &str,
        range: Option<&str>,
    ) -> (StatusCode, hyper::HeaderMap, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(range) = range {
            builder = builder.header(RANGE, range);
        }
        let resp = handle_request(builder.body(()).unwrap(), Arc::clone(state))
            .await
            .unwrap();
        let (parts, body) = resp.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes().to_vec();
        (parts.status, parts.headers, bytes)
    }

    #[tokio::test]
    async fn test_serves_file_bytes() {
        let (_dir, state) = fixture();
        let (status, headers, body) = send(&state, Method::GET, "/hello.txt", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"hello world");
        assert_eq!(headers[CONTENT_LENGTH], "11");
        assert_eq!(headers[CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn test_query_string_ignored() {
        let (_dir, state) = fixture();
        let (status, _, body) = send(&state, Method::GET, "/hello.txt?v=3", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"hello world");
    }

    #[tokio::test]
    async fn test_head_keeps_headers_without_body() {
        let (_dir, state) = fixture();
        let (status, headers, body) = send(&state, Method::HEAD, "/hello.txt", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_LENGTH], "11");
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let (_dir, state) = fixture();
        let (status, _, body) = send(&state, Method::GET, "/nope.txt", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, b"404 Not Found");
    }

    #[tokio::test]
    async fn test_traversal_is_403() {
        let (_dir, state) = fixture();
        for uri in ["/../../etc/passwd", "/docs/../../etc/passwd", "/%2e%2e/%2e%2e/etc/passwd"] {
            let (status, _, body) = send(&state, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
            assert_eq!(body, b"403 Forbidden");
        }
    }

    #[tokio::test]
    async fn test_malformed_path_is_400() {
        let (_dir, state) = fixture();
        let (status, _, _) = send(&state, Method::GET, "/bad%FF", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_is_405() {
        let (_dir, state) = fixture();
        let (status, headers, _) = send(&state, Method::POST, "/hello.txt", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(headers[hyper::header::ALLOW], "GET, HEAD");
    }

    #[tokio::test]
    async fn test_directory_redirects_to_slash() {
        let (_dir, state) = fixture();
        let (status, headers, _) = send(&state, Method::GET, "/docs?sort=name", None).await;
        assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(headers[LOCATION], "/docs/?sort=name");

        let (status, headers, _) = send(&state, Method::GET, "//docs", None).await;
        assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(headers[LOCATION], "/docs/");
    }

    #[tokio::test]
    async fn test_directory_listing() {
        let (_dir, state) = fixture();
        let (status, headers, body) = send(&state, Method::GET, "/docs/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_TYPE], "text/html; charset=utf-8");
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("Directory listing for /docs/"));
        assert!(html.contains("<a href=\"guide.md\">guide.md</a>"));
    }

    #[tokio::test]
    async fn test_root_listing_shows_directories() {
        let (_dir, state) = fixture();
        let (status, _, body) = send(&state, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("<a href=\"docs/\">docs/</a>"));
        assert!(html.contains("<a href=\"hello.txt\">hello.txt</a>"));
    }

    #[tokio::test]
    async fn test_index_file_preferred_over_listing() {
        let (_dir, state) = fixture();
        let (status, headers, body) = send(&state, Method::GET, "/site/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<h1>site</h1>");
        assert_eq!(headers[CONTENT_TYPE], "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn test_listing_disabled_is_403() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.child("empty")).unwrap();
        let mut config = Config::default();
        config.files.root = dir.path().to_string_lossy().into_owned();
        config.files.directory_listing = false;
        let state = Arc::new(AppState::new(config).unwrap());

        let (status, _, _) = send(&state, Method::GET, "/empty/", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_range_request() {
        let (_dir, state) = fixture();
        let (status, headers, body) =
            send(&state, Method::GET, "/hello.txt", Some("bytes=6-")).await;
        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(body, b"world");
        assert_eq!(headers[CONTENT_RANGE], "bytes 6-10/11");
        assert_eq!(headers[CONTENT_LENGTH], "5");
    }

    #[tokio::test]
    async fn test_unsatisfiable_range() {
        let (_dir, state) = fixture();
        let (status, headers, _) =
            send(&state, Method::GET, "/hello.txt", Some("bytes=50-60")).await;
        assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(headers[CONTENT_RANGE], "bytes */11");
    }

    #[tokio::test]
    async fn test_repeated_requests_identical() {
        let (_dir, state) = fixture();
        let first = send(&state, Method::GET, "/hello.txt", None).await;
        let second = send(&state, Method::GET, "/hello.txt", None).await;
        assert_eq!(first, second);
    }
}
