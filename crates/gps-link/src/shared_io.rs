//! Transport handle shared between a connection and its reader task
//!
//! Serial ports are opened exclusively, so the next attempt on the same port
//! can only succeed once the previous descriptor is really closed. Keeping the
//! stream behind a lock lets `close` drop it synchronously instead of waiting
//! for the reader task to notice.

use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Poll;

use tokio::io::{AsyncRead, ReadBuf};

#[derive(Debug)]
enum IoState<T> {
    Open(T),
    Released,
}

/// Stream that can be released from outside its reader task
#[derive(Debug)]
pub struct SharedIo<T> {
    inner: Arc<Mutex<IoState<T>>>,
}

impl<T> Clone for SharedIo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> SharedIo<T> {
    /// Wrap an open stream
    pub fn new(stream: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(IoState::Open(stream))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IoState<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the stream now. Later reads report `None`.
    pub fn release(&self) {
        let previous = std::mem::replace(&mut *self.lock(), IoState::Released);
        drop(previous);
    }

    /// Whether the stream has been released
    pub fn is_released(&self) -> bool {
        matches!(*self.lock(), IoState::Released)
    }
}

impl<T: AsyncRead + Unpin> SharedIo<T> {
    /// Read into `buf`
    ///
    /// Returns `None` once the stream was released, so the reader can tell a
    /// deliberate close from the device going away.
    pub async fn read(&self, buf: &mut [u8]) -> Option<io::Result<usize>> {
        poll_fn(|cx| {
            let mut guard = self.lock();
            let stream = match &mut *guard {
                IoState::Open(stream) => stream,
                IoState::Released => return Poll::Ready(None),
            };
            let mut read_buf = ReadBuf::new(&mut *buf);
            match Pin::new(stream).poll_read(cx, &mut read_buf) {
                Poll::Ready(Ok(())) => Poll::Ready(Some(Ok(read_buf.filled().len()))),
                Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
                Poll::Pending => Poll::Pending,
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_reads_until_released() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let io = SharedIo::new(reader);
        writer.write_all(b"$GP").await.unwrap();

        let mut buf = [0u8; 16];
        let n = io.read(&mut buf).await.unwrap().unwrap();
        assert_eq!(&buf[..n], b"$GP");

        io.clone().release();
        assert!(io.is_released());
        assert!(io.read(&mut buf).await.is_none());
    }

    #[tokio::test]
    async fn test_release_closes_stream() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let io = SharedIo::new(reader);
        io.release();
        // The other half sees the pipe closed once the reader is dropped
        assert!(writer.write_all(b"x").await.is_err());
    }
}
