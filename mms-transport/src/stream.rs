//! Stream accessor trait for the transport layer

use async_trait::async_trait;
use mms_core::{MmsError, MmsResult};
use std::time::Duration;

/// Stream accessor interface for a byte stream to a remote IED.
#[async_trait]
pub trait StreamAccessor: Send + Sync {
    /// Set the read timeout.
    ///
    /// # Arguments
    ///
    /// * `timeout` - The timeout duration. None means infinite timeout.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> MmsResult<()>;

    /// Read data from the stream.
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 on EOF.
    async fn read(&mut self, buf: &mut [u8]) -> MmsResult<usize>;

    /// Read an exact number of bytes from the stream.
    ///
    /// Short reads are retried until the buffer is full; EOF before that is
    /// `TransportClosed`.
    async fn read_exact(&mut self, mut buf: &mut [u8]) -> MmsResult<()> {
        while !buf.is_empty() {
            let n = self.read(buf).await?;
            if n == 0 {
                return Err(MmsError::TransportClosed);
            }
            buf = &mut buf[n..];
        }
        Ok(())
    }

    /// Write data to the stream.
    ///
    /// # Returns
    ///
    /// Number of bytes written.
    async fn write(&mut self, buf: &[u8]) -> MmsResult<usize>;

    /// Write all data to the stream.
    async fn write_all(&mut self, buf: &[u8]) -> MmsResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(MmsError::TransportClosed);
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data.
    async fn flush(&mut self) -> MmsResult<()>;

    /// Check if the stream is closed.
    fn is_closed(&self) -> bool;

    /// Close the stream.
    async fn close(&mut self) -> MmsResult<()>;
}

/// Transport layer trait that extends StreamAccessor with connection
/// establishment.
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Open the physical connection.
    async fn open(&mut self) -> MmsResult<()>;
}
