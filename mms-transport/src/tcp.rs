//! TCP transport implementation

use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use mms_core::{MmsError, MmsResult};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// TCP transport settings.
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub address: SocketAddr,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Read timeout; None blocks forever.
    pub read_timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create settings with the default 5 s connect timeout and no read
    /// timeout.
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            connect_timeout: Duration::from_secs(5),
            read_timeout: None,
        }
    }
}

/// TCP transport to an IED.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    settings: TcpSettings,
    closed: bool,
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("address", &self.settings.address)
            .field("closed", &self.closed)
            .finish()
    }
}

impl TcpTransport {
    /// Create a new TCP transport.
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    fn stream_mut(&mut self) -> MmsResult<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            MmsError::Transport(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> MmsResult<()> {
        if !self.closed {
            return Err(MmsError::Transport(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "connection has already been opened",
            )));
        }

        let stream = tokio::time::timeout(
            self.settings.connect_timeout,
            TcpStream::connect(self.settings.address),
        )
        .await
        .map_err(|_| MmsError::Timeout)?
        .map_err(MmsError::Transport)?;
        stream.set_nodelay(true).map_err(MmsError::Transport)?;

        self.stream = Some(stream);
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> MmsResult<()> {
        self.settings.read_timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> MmsResult<usize> {
        let timeout = self.settings.read_timeout;
        let stream = self.stream_mut()?;

        let result = if let Some(timeout) = timeout {
            tokio::time::timeout(timeout, stream.read(buf))
                .await
                .map_err(|_| MmsError::Timeout)?
                .map_err(MmsError::Transport)
        } else {
            stream.read(buf).await.map_err(MmsError::Transport)
        };

        match result {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(e)
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> MmsResult<usize> {
        let stream = self.stream_mut()?;
        stream.write(buf).await.map_err(MmsError::Transport)
    }

    async fn flush(&mut self) -> MmsResult<()> {
        let stream = self.stream_mut()?;
        stream.flush().await.map_err(MmsError::Transport)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> MmsResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}
