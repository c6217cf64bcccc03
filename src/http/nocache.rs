//! Cache-disabling response decoration
//!
//! Every response leaves the server through [`finalize`], either directly or
//! via the [`NoCache`] service wrapper that hyper drives for each request.
//! The three headers are inserted, not appended, so each name appears exactly
//! once no matter what an earlier code path put there.

use hyper::header::{HeaderMap, HeaderValue, CACHE_CONTROL, EXPIRES, PRAGMA};
use hyper::service::Service;
use hyper::Response;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pub const CACHE_CONTROL_VALUE: &str = "no-store, no-cache, must-revalidate, max-age=0";
pub const PRAGMA_VALUE: &str = "no-cache";
pub const EXPIRES_VALUE: &str = "0";

/// Overwrite the cache-related headers with the no-cache triple
pub fn apply_no_cache_headers(headers: &mut HeaderMap) {
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
    headers.insert(PRAGMA, HeaderValue::from_static(PRAGMA_VALUE));
    headers.insert(EXPIRES, HeaderValue::from_static(EXPIRES_VALUE));
}

/// Stamp a response with the no-cache headers right before it is sent
pub fn finalize<B>(mut response: Response<B>) -> Response<B> {
    apply_no_cache_headers(response.headers_mut());
    response
}

/// Service wrapper that finalizes every response produced by `S`
#[derive(Debug, Clone)]
pub struct NoCache<S> {
    inner: S,
}

impl<S> NoCache<S> {
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, Req, B> Service<Req> for NoCache<S>
where
    S: Service<Req, Response = Response<B>>,
{
    type Response = Response<B>;
    type Error = S::Error;
    type Future = NoCacheFuture<S::Future>;

    fn call(&self, req: Req) -> Self::Future {
        NoCacheFuture {
            inner: Box::pin(self.inner.call(req)),
        }
    }
}

/// Response future returned by [`NoCache`]
pub struct NoCacheFuture<F> {
    inner: Pin<Box<F>>,
}

impl<F, B, E> Future for NoCacheFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = Result<Response<B>, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx).map_ok(finalize)
    }
}
