//! Response body types
//!
//! Small bodies (listings, error pages) are held in memory. Files are read
//! from disk chunk by chunk while hyper writes them out.

use hyper::body::{Body, Bytes, Frame, SizeHint};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};

/// Read size for streamed file bodies
const CHUNK_SIZE: usize = 64 * 1024;

/// Body of every response the server produces
#[derive(Debug)]
pub enum ServeBody {
    /// In-memory body, `None` once sent or when empty
    Full(Option<Bytes>),
    /// File streamed from disk
    File(FileBody),
}

impl ServeBody {
    pub const fn empty() -> Self {
        Self::Full(None)
    }

    pub fn full(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        if data.is_empty() {
            Self::Full(None)
        } else {
            Self::Full(Some(data))
        }
    }
}

impl Body for ServeBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        match self.get_mut() {
            Self::Full(data) => Poll::Ready(data.take().map(|d| Ok(Frame::data(d)))),
            Self::File(file) => Pin::new(file).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Full(data) => data.is_none(),
            Self::File(file) => file.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Self::Full(Some(data)) => SizeHint::with_exact(data.len() as u64),
            Self::Full(None) => SizeHint::with_exact(0),
            Self::File(file) => file.size_hint(),
        }
    }
}

/// Streams exactly `remaining` bytes from the file's current position
#[derive(Debug)]
pub struct FileBody {
    file: File,
    remaining: u64,
    buf: Vec<u8>,
}

impl FileBody {
    pub const fn new(file: File, len: u64) -> Self {
        Self {
            file,
            remaining: len,
            buf: Vec::new(),
        }
    }
}

impl Body for FileBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        let this = self.get_mut();
        if this.remaining == 0 {
            return Poll::Ready(None);
        }

        let want = usize::try_from(this.remaining).map_or(CHUNK_SIZE, |r| r.min(CHUNK_SIZE));
        this.buf.resize(want, 0);
        let mut read_buf = ReadBuf::new(&mut this.buf);

        match Pin::new(&mut this.file).poll_read(cx, &mut read_buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
            Poll::Ready(Ok(())) => {
                let n = read_buf.filled().len();
                if n == 0 {
                    // Shorter than its Content-Length promised
                    this.remaining = 0;
                    return Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "file truncated while streaming",
                    ))));
                }
                this.remaining -= n as u64;
                Poll::Ready(Some(Ok(Frame::data(Bytes::copy_from_slice(
                    &this.buf[..n],
                )))))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.remaining == 0
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::io::SeekFrom;
    use temp_dir::TempDir;
    use tokio::io::AsyncSeekExt;

    #[tokio::test]
    async fn test_full_body() {
        let body = ServeBody::full("hello");
        assert_eq!(body.size_hint().exact(), Some(5));
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_empty_body_is_end_stream() {
        assert!(ServeBody::empty().is_end_stream());
        assert!(ServeBody::full(Bytes::new()).is_end_stream());
    }

    #[tokio::test]
    async fn test_file_body_streams_in_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("big.bin");
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let file = File::open(&path).await.unwrap();
        let mut body = ServeBody::File(FileBody::new(file, data.len() as u64));

        let mut frames = 0;
        let mut received = Vec::new();
        while let Some(frame) = body.frame().await {
            let chunk = frame.unwrap().into_data().unwrap();
            assert!(chunk.len() <= CHUNK_SIZE);
            received.extend_from_slice(&chunk);
            frames += 1;
        }
        assert_eq!(received, data);
        assert!(frames >= 3);
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn test_file_body_respects_offset_and_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("range.txt");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut file = File::open(&path).await.unwrap();
        file.seek(SeekFrom::Start(3)).await.unwrap();
        let body = FileBody::new(file, 4);
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"3456");
    }

    #[tokio::test]
    async fn test_file_body_reports_truncation() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("short.txt");
        std::fs::write(&path, b"abc").unwrap();

        let file = File::open(&path).await.unwrap();
        let body = FileBody::new(file, 10);
        let err = body.collect().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
