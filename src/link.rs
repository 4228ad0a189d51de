use std::{io, path::PathBuf, time::Duration};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio_serial::{FlowControl, SerialPortBuilderExt, SerialStream};

use crate::config::PortSettings;

/// Timeout handed to the OS-level port when the session itself blocks without one.
const PORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Exclusive duplex byte channel for one session. Every read is bounded by the
/// configured read timeout; writes are flushed before returning.
pub struct Link<T> {
  stream: BufStream<T>,
  read_timeout: Option<Duration>,
}

impl Link<SerialStream> {
  pub fn open(settings: &PortSettings) -> Result<Self, LinkError> {
    let builder = tokio_serial::new(settings.device.as_str(), settings.baud)
      .data_bits(settings.data_bits)
      .flow_control(FlowControl::None)
      .parity(settings.parity)
      .stop_bits(settings.stop_bits)
      .timeout(settings.read_timeout.unwrap_or(PORT_TIMEOUT));

    let stream = builder.open_native_async().map_err(|source| LinkError::Open {
      path: PathBuf::from(&settings.device),
      source,
    })?;

    tracing::info!(
      device = %settings.device,
      baud = settings.baud,
      data_bits = ?settings.data_bits,
      stop_bits = ?settings.stop_bits,
      parity = ?settings.parity,
      read_timeout = ?settings.read_timeout,
      "opened serial port"
    );

    Ok(Self::new(stream, settings.read_timeout))
  }
}

impl<T> Link<T>
where
  T: AsyncRead + AsyncWrite + Unpin,
{
  /// `None` blocks each read until data arrives or the peer closes.
  pub fn new(stream: T, read_timeout: Option<Duration>) -> Self {
    Self {
      stream: BufStream::new(stream),
      read_timeout,
    }
  }

  pub async fn read_byte(&mut self) -> Result<u8, LinkError> {
    let read = self.stream.read_u8();
    let result = match self.read_timeout {
      Some(limit) => tokio::time::timeout(limit, read)
        .await
        .map_err(|_| LinkError::TimedOut(limit))?,
      None => read.await,
    };

    result.map_err(|err| match err.kind() {
      io::ErrorKind::UnexpectedEof => LinkError::Closed,
      _ => LinkError::Io(err),
    })
  }

  /// Reads up to and including `marker`, giving up after `limit` bytes.
  pub async fn read_until(&mut self, marker: u8, limit: usize) -> Result<Vec<u8>, LinkError> {
    let mut span = Vec::with_capacity(limit);
    while span.len() < limit {
      let byte = self.read_byte().await?;
      span.push(byte);
      if byte == marker {
        break;
      }
    }

    tracing::trace!(marker, len = span.len(), "serial read until marker: {span:02X?}");
    Ok(span)
  }

  #[tracing::instrument(level = "trace", skip_all, fields(len = bytes.len()))]
  pub async fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
    self.stream.write_all(bytes).await?;
    self.stream.flush().await?;
    Ok(())
  }

  pub async fn close(mut self) -> Result<(), LinkError> {
    self.stream.shutdown().await?;
    tracing::debug!("serial link closed");
    Ok(())
  }
}

#[derive(thiserror::Error, Debug)]
pub enum LinkError {
  #[error("failed to open serial port {path}: {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: tokio_serial::Error,
  },
  #[error("serial read timed out after {0:?}")]
  TimedOut(Duration),
  #[error("serial line closed by peer")]
  Closed,
  #[error("serial I/O failed: {0}")]
  Io(#[from] io::Error),
}
