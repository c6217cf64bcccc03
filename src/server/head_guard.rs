// Request head pre-validation
//
// hyper answers unparsable requests with a 400 it builds internally, which
// would leave the connection without the no-cache headers. The request head is
// therefore read and checked here with the same rules hyper applies (syntax,
// request target, body framing headers); bad heads get our own finalized 400
// and good ones are replayed into hyper through `Rewind`. Connections carry a
// single request, so this is the only head hyper ever parses.

use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::{Response, Uri};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::error::HeadError;
use crate::http::ServeBody;

/// Same header limit hyper applies by default
const MAX_HEADERS: usize = 100;

const READ_CHUNK: usize = 4096;

/// Read from `stream` until a complete request head has arrived
///
/// Returns everything read so far (the head plus any body bytes that came
/// with it), or `None` when the peer closed without sending anything.
pub async fn read_head<S>(stream: &mut S, limit: usize) -> Result<Option<Bytes>, HeadError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return if buf.is_empty() {
                Ok(None)
            } else {
                Err(HeadError::Truncated {
                    received: buf.len(),
                })
            };
        }

        buf.extend_from_slice(&chunk[..n]);
        if check_head(&buf)? {
            return Ok(Some(Bytes::from(buf)));
        }
        if buf.len() >= limit {
            return Err(HeadError::TooLarge { limit });
        }
    }
}

/// Parse and check `buf` as a request head: `Ok(false)` means more bytes are needed
pub fn check_head(buf: &[u8]) -> Result<bool, HeadError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);
    if req.parse(buf)?.is_partial() {
        return Ok(false);
    }

    let target = req.path.unwrap_or_default();
    if Uri::try_from(target).is_err() {
        return Err(HeadError::InvalidTarget(target.to_string()));
    }
    check_framing(req.version, req.headers)?;
    Ok(true)
}

/// Reject `Content-Length` and `Transfer-Encoding` combinations hyper refuses
fn check_framing(
    version: Option<u8>,
    headers: &[httparse::Header<'_>],
) -> Result<(), HeadError> {
    let mut content_length: Option<u64> = None;
    let mut transfer_encoding: Option<&[u8]> = None;

    for header in headers {
        if header.name.eq_ignore_ascii_case("content-length") {
            let len = parse_content_length(header.value).ok_or(HeadError::InvalidContentLength)?;
            if content_length.is_some_and(|prev| prev != len) {
                return Err(HeadError::InvalidContentLength);
            }
            content_length = Some(len);
        } else if header.name.eq_ignore_ascii_case("transfer-encoding") {
            if version == Some(0) {
                return Err(HeadError::InvalidTransferEncoding);
            }
            transfer_encoding = Some(header.value);
        }
    }

    match transfer_encoding {
        Some(value) if !ends_in_chunked(value) => Err(HeadError::InvalidTransferEncoding),
        _ => Ok(()),
    }
}

/// Plain decimal digits only, as hyper accepts them
fn parse_content_length(value: &[u8]) -> Option<u64> {
    if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(value).ok()?.parse().ok()
}

fn ends_in_chunked(value: &[u8]) -> bool {
    value
        .rsplit(|&b| b == b',')
        .next()
        .map(<[u8]>::trim_ascii)
        .is_some_and(|last| last.eq_ignore_ascii_case(b"chunked"))
}

/// Write an already finalized response and close the write side
pub async fn write_rejection<S>(stream: &mut S, response: Response<ServeBody>) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let encoded = encode_response(response).await?;
    stream.write_all(&encoded).await?;
    stream.shutdown().await
}

/// Serialize a response as HTTP/1.1 with title-case header names
async fn encode_response(response: Response<ServeBody>) -> io::Result<Vec<u8>> {
    let (parts, body) = response.into_parts();
    let body = body.collect().await?.to_bytes();

    let mut out = Vec::with_capacity(256 + body.len());
    out.extend_from_slice(
        format!(
            "HTTP/1.1 {} {}\r\n",
            parts.status.as_u16(),
            parts.status.canonical_reason().unwrap_or("")
        )
        .as_bytes(),
    );
    for (name, value) in &parts.headers {
        out.extend_from_slice(title_case(name.as_str()).as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&body);
    Ok(out)
}

/// `cache-control` -> `Cache-Control`
fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
        upper = c == '-';
    }
    out
}

/// Stream wrapper that yields `prefix` before reading from `inner`
pub struct Rewind<T> {
    prefix: Option<Bytes>,
    inner: T,
}

impl<T> Rewind<T> {
    pub fn new(inner: T, prefix: Bytes) -> Self {
        Self {
            prefix: (!prefix.is_empty()).then_some(prefix),
            inner,
        }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for Rewind<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if buf.remaining() > 0 {
            if let Some(mut prefix) = self.prefix.take() {
                let n = prefix.len().min(buf.remaining());
                buf.put_slice(&prefix.split_to(n));
                if !prefix.is_empty() {
                    self.prefix = Some(prefix);
                }
                return Poll::Ready(Ok(()));
            }
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for Rewind<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
