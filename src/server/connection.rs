// Connection handling module
// Serves a single accepted TCP connection in its own task

use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONNECTION, CONTENT_LENGTH, DATE, REFERER, SERVER, USER_AGENT};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::net::TcpStream;

use super::head_guard::{self, Rewind};
use crate::config::AppState;
use crate::error::HeadError;
use crate::handler;
use crate::http::{self, response, NoCache, ServeBody};
use crate::logger::{self, AccessLogEntry};

/// Spawn a task serving `stream`.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address, for the access log
/// * `state` - Shared application state
pub fn accept_connection(stream: TcpStream, peer_addr: SocketAddr, state: &Arc<AppState>) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        let timeout = state.config.performance.connection_timeout;
        let served = serve_connection(stream, peer_addr, Arc::clone(&state));

        match timeout {
            Some(secs) => {
                if tokio::time::timeout(Duration::from_secs(secs), served)
                    .await
                    .is_err()
                {
                    logger::log_warning(&format!(
                        "Connection from {peer_addr} timed out after {secs} seconds"
                    ));
                }
            }
            None => served.await,
        }
    });
}

/// Pre-validate the first request head, then hand the connection to hyper.
///
/// This function:
/// 1. Reads and checks the request head, answering bad ones with a 400
/// 2. Replays the buffered bytes through `Rewind`
/// 3. Configures HTTP/1 (one request per connection, title-case header names)
/// 4. Serves the request through the `NoCache` wrapper
async fn serve_connection(mut stream: TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    let prefix = match head_guard::read_head(&mut stream, state.config.http.max_head_size).await {
        Ok(Some(prefix)) => prefix,
        Ok(None) => return,
        Err(HeadError::Io(e)) => {
            logger::log_connection_error(&e);
            return;
        }
        Err(e) => {
            logger::log_head_rejected(&peer_addr, &e);
            let mut rejection = with_server_header(http::build_400_response(), &state);
            let headers = rejection.headers_mut();
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
            if let Ok(date) = HeaderValue::from_str(&response::http_date(SystemTime::now())) {
                headers.insert(DATE, date);
            }
            if let Err(e) = head_guard::write_rejection(&mut stream, http::finalize(rejection)).await
            {
                logger::log_connection_error(&e);
            }
            return;
        }
    };

    let io = TokioIo::new(Rewind::new(stream, prefix));

    let mut builder = http1::Builder::new();
    // Only the first head was checked, so hyper must not parse another
    builder.keep_alive(false).title_case_headers(true);

    let service = NoCache::new(service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { respond(req, state, peer_addr).await }
    }));

    if let Err(err) = builder.serve_connection(io, service).await {
        logger::log_connection_error(&err);
    }
}

/// Run the handler for one request and write its access log line
async fn respond(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ServeBody>, Infallible> {
    let started = Instant::now();
    let entry = state
        .config
        .logging
        .access_log
        .then(|| access_entry(&req, peer_addr));

    let resp = match handler::handle_request(req, Arc::clone(&state)).await {
        Ok(resp) => with_server_header(resp, &state),
        Err(never) => match never {},
    };

    if let Some(mut entry) = entry {
        entry.status = resp.status().as_u16();
        entry.body_bytes = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(resp)
}

fn with_server_header(mut resp: Response<ServeBody>, state: &AppState) -> Response<ServeBody> {
    if let Ok(value) = HeaderValue::from_str(&state.config.http.server_name) {
        resp.headers_mut().insert(SERVER, value);
    }
    resp
}

fn access_entry(req: &Request<Incoming>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header = |name| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = format!("{:?}", req.version())
        .trim_start_matches("HTTP/")
        .to_string();
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry
}
