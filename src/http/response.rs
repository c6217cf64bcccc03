//! HTTP response building module
//!
//! Builders for each status the server emits. None of them set cache
//! headers; those are added by [`super::nocache`] on the way out.

use chrono::{DateTime, Utc};
use hyper::body::Bytes;
use hyper::header::{
    ACCEPT_RANGES, ALLOW, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LAST_MODIFIED, LOCATION,
};
use hyper::{Response, StatusCode};
use std::time::SystemTime;

use super::body::{FileBody, ServeBody};

/// Methods the file server answers
pub const ALLOWED_METHODS: &str = "GET, HEAD";

/// Format a timestamp as an RFC 7231 HTTP-date
pub fn http_date(time: SystemTime) -> String {
    let time: DateTime<Utc> = time.into();
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Plain-text response whose body is `"<code> <reason>"`
pub fn build_status_response(status: StatusCode) -> Response<ServeBody> {
    let message = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );
    build_text_response(status, message)
}

/// Plain-text response with an explicit message
pub fn build_text_response(status: StatusCode, message: String) -> Response<ServeBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(CONTENT_LENGTH, message.len())
        .body(ServeBody::full(message))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            fallback(status)
        })
}

/// Build 400 Bad Request response
pub fn build_400_response() -> Response<ServeBody> {
    build_status_response(StatusCode::BAD_REQUEST)
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ServeBody> {
    let mut response = build_status_response(StatusCode::METHOD_NOT_ALLOWED);
    response
        .headers_mut()
        .insert(ALLOW, hyper::header::HeaderValue::from_static(ALLOWED_METHODS));
    response
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(file_size: u64) -> Response<ServeBody> {
    let message = "416 Range Not Satisfiable";
    Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(CONTENT_LENGTH, message.len())
        .header(CONTENT_RANGE, format!("bytes */{file_size}"))
        .body(ServeBody::full(message))
        .unwrap_or_else(|e| {
            log_build_error("416", &e);
            fallback(StatusCode::RANGE_NOT_SATISFIABLE)
        })
}

/// Build 301 redirect response, used to add the trailing slash to directories
pub fn build_redirect_response(location: &str) -> Response<ServeBody> {
    let message = format!("Moved to {location}");
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(LOCATION, location)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(CONTENT_LENGTH, message.len())
        .body(ServeBody::full(message))
        .unwrap_or_else(|e| {
            log_build_error("301", &e);
            fallback(StatusCode::MOVED_PERMANENTLY)
        })
}

/// Build generic HTML response
pub fn build_html_response(content: String) -> Response<ServeBody> {
    let content_length = content.len();
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .header(CONTENT_LENGTH, content_length)
        .body(ServeBody::full(Bytes::from(content)))
        .unwrap_or_else(|e| {
            log_build_error("HTML", &e);
            fallback(StatusCode::INTERNAL_SERVER_ERROR)
        })
}

/// Build 200 response streaming a whole file
pub fn build_file_response(
    body: FileBody,
    content_type: &str,
    file_size: u64,
    modified: Option<SystemTime>,
) -> Response<ServeBody> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, file_size)
        .header(ACCEPT_RANGES, "bytes");
    if let Some(modified) = modified {
        builder = builder.header(LAST_MODIFIED, http_date(modified));
    }

    builder.body(ServeBody::File(body)).unwrap_or_else(|e| {
        log_build_error("200", &e);
        fallback(StatusCode::INTERNAL_SERVER_ERROR)
    })
}

/// Build 206 Partial Content response for the inclusive range `start..=end`
pub fn build_partial_response(
    body: FileBody,
    content_type: &str,
    start: u64,
    end: u64,
    total_size: u64,
    modified: Option<SystemTime>,
) -> Response<ServeBody> {
    let content_length = end - start + 1;
    let mut builder = Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, content_length)
        .header(CONTENT_RANGE, format!("bytes {start}-{end}/{total_size}"))
        .header(ACCEPT_RANGES, "bytes");
    if let Some(modified) = modified {
        builder = builder.header(LAST_MODIFIED, http_date(modified));
    }

    builder.body(ServeBody::File(body)).unwrap_or_else(|e| {
        log_build_error("206", &e);
        fallback(StatusCode::INTERNAL_SERVER_ERROR)
    })
}

/// Drop the body but keep every header, for HEAD requests
pub fn strip_body(response: Response<ServeBody>) -> Response<ServeBody> {
    let (parts, _) = response.into_parts();
    Response::from_parts(parts, ServeBody::empty())
}

fn fallback(status: StatusCode) -> Response<ServeBody> {
    let mut response = Response::new(ServeBody::empty());
    *response.status_mut() = status;
    response
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_http_date() {
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(http_date(time), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_status_response_body_and_length() {
        let resp = build_status_response(StatusCode::NOT_FOUND);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()[CONTENT_LENGTH], "13");
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[test]
    fn test_405_has_allow() {
        let resp = build_405_response();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()[ALLOW], ALLOWED_METHODS);
    }

    #[test]
    fn test_416_content_range() {
        let resp = build_416_response(1234);
        assert_eq!(resp.headers()[CONTENT_RANGE], "bytes */1234");
    }

    #[test]
    fn test_redirect_location() {
        let resp = build_redirect_response("/docs/");
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()[LOCATION], "/docs/");
    }

    #[test]
    fn test_strip_body_keeps_headers() {
        let resp = strip_body(build_html_response("<p>hi</p>".to_string()));
        assert_eq!(resp.headers()[CONTENT_LENGTH], "9");
        assert!(matches!(resp.body(), ServeBody::Full(None)));
    }

    #[test]
    fn test_builders_leave_cache_headers_to_finalize() {
        let resp = build_html_response(String::new());
        assert!(!resp.headers().contains_key(hyper::header::CACHE_CONTROL));
    }
}
