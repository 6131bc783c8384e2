//! In-memory transport
//!
//! A scripted byte stream used by the session and client tests: reads are
//! served from a queue of pre-loaded inbound chunks, writes are captured
//! for inspection. The chunk boundaries are preserved so tests can exercise
//! short reads.

use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use mms_core::MmsResult;
use std::collections::VecDeque;
use std::time::Duration;

/// Scripted in-memory transport.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<u8>,
    closed: bool,
}

impl MemoryTransport {
    /// Create an open transport with no inbound data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a chunk to be returned by subsequent reads.
    pub fn push_inbound(&mut self, chunk: impl Into<Vec<u8>>) {
        self.inbound.push_back(chunk.into());
    }

    /// Everything written so far.
    pub fn outbound(&self) -> &[u8] {
        &self.outbound
    }

    /// Take and clear the captured writes.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }
}

#[async_trait]
impl TransportLayer for MemoryTransport {
    async fn open(&mut self) -> MmsResult<()> {
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for MemoryTransport {
    async fn set_timeout(&mut self, _timeout: Option<Duration>) -> MmsResult<()> {
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> MmsResult<usize> {
        let Some(chunk) = self.inbound.front_mut() else {
            // Script exhausted: behave like an orderly peer close.
            self.closed = true;
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n == chunk.len() {
            self.inbound.pop_front();
        } else {
            chunk.drain(..n);
        }
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> MmsResult<usize> {
        self.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> MmsResult<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> MmsResult<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_reads_preserve_chunking() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(vec![1, 2, 3]);
        transport.push_inbound(vec![4]);

        let mut buf = [0u8; 2];
        assert_eq!(transport.read(&mut buf).await.unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(transport.read(&mut buf).await.unwrap(), 1);
        assert_eq!(buf[0], 3);
        assert_eq!(transport.read(&mut buf).await.unwrap(), 1);
        assert_eq!(buf[0], 4);
        assert_eq!(transport.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_exact_across_chunks() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(vec![0x03]);
        transport.push_inbound(vec![0x00, 0x00, 0x15]);
        let mut buf = [0u8; 4];
        transport.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x03, 0x00, 0x00, 0x15]);
    }

    #[tokio::test]
    async fn test_captures_writes() {
        let mut transport = MemoryTransport::new();
        transport.write_all(&[1, 2]).await.unwrap();
        transport.write_all(&[3]).await.unwrap();
        assert_eq!(transport.outbound(), &[1, 2, 3]);
    }
}
