use std::{
  fmt::Write as _,
  io,
  ops::Deref,
  path::{Path, PathBuf},
};

use tokio::io::AsyncWriteExt;

pub const DEFAULT_OUTPUT_PATH: &str = "output.bin";

const BYTES_PER_LINE: usize = 16;
const HALF_LINE: usize = BYTES_PER_LINE / 2;

/// Bytes the initiator received after the handshake, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capture(Vec<u8>);

impl Capture {
  pub fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub fn push(&mut self, byte: u8) {
    self.0.push(byte);
  }

  pub fn hexdump(&self) -> String {
    hexdump(&self.0)
  }

  /// Creates (or truncates) `path`, writes the hex dump once and syncs it.
  pub async fn persist(&self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
    let path = path.as_ref();
    let sink_err = |source| CaptureError::Sink {
      path: path.to_path_buf(),
      source,
    };

    let mut file = tokio::fs::File::create(path).await.map_err(sink_err)?;
    file.write_all(self.hexdump().as_bytes()).await.map_err(sink_err)?;
    file.sync_all().await.map_err(sink_err)?;

    tracing::info!(path = %path.display(), bytes = self.0.len(), "wrote capture dump");
    Ok(())
  }
}

impl From<Vec<u8>> for Capture {
  fn from(bytes: Vec<u8>) -> Self {
    Self(bytes)
  }
}

impl Deref for Capture {
  type Target = [u8];

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

/// Canonical hex+ASCII dump: 8-digit offset, 16 bytes per line split into two
/// halves, and a `|...|` gutter where non-printable bytes show as `.`.
pub fn hexdump(bytes: &[u8]) -> String {
  let lines = bytes.len().div_ceil(BYTES_PER_LINE);
  let mut out = String::with_capacity(lines * 79);

  for (line, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
    dump_line(&mut out, line * BYTES_PER_LINE, chunk);
  }

  out
}

fn dump_line(out: &mut String, offset: usize, chunk: &[u8]) {
  // writing into a String cannot fail
  let _ = write!(out, "{offset:08x}  ");

  for idx in 0..BYTES_PER_LINE {
    match chunk.get(idx) {
      Some(byte) => {
        let _ = write!(out, "{byte:02x} ");
      }
      None => out.push_str("   "),
    }
    if idx == HALF_LINE - 1 {
      out.push(' ');
    }
  }

  out.push_str(" |");
  out.extend(chunk.iter().map(|byte| printable(*byte)));
  out.push_str("|\n");
}

#[inline]
fn printable(byte: u8) -> char {
  if (0x20..=0x7E).contains(&byte) { byte as char } else { '.' }
}

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
  #[error("failed to write capture to {path}: {source}")]
  Sink {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}
