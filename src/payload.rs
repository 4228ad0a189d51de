use std::{
  io,
  ops::Deref,
  path::{Path, PathBuf},
};

pub const DEFAULT_PAYLOAD_PATH: &str = "test.bin";

const TOKENS_PER_LINE: usize = 16;

/// Bytes the responder sends after the handshake, decoded from hex text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
  pub async fn load(path: impl AsRef<Path>) -> Result<Self, PayloadError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await.map_err(|source| PayloadError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let payload = Self::parse(&text)?;
    tracing::info!(path = %path.display(), bytes = payload.len(), "loaded payload");
    Ok(payload)
  }

  /// Whitespace-separated two-digit hex tokens, any number per line.
  pub fn parse(text: &str) -> Result<Self, PayloadError> {
    let mut bytes = Vec::with_capacity(text.len() / 3);

    for (idx, line) in text.lines().enumerate() {
      for token in line.split_whitespace() {
        bytes.push(decode_token(token).ok_or_else(|| PayloadError::Token {
          line: idx + 1,
          token: token.to_string(),
        })?);
      }
    }

    Ok(Self(bytes))
  }

  /// Renders the payload back into the source format.
  pub fn to_hex_text(&self) -> String {
    let mut text = String::with_capacity(self.0.len() * 3);
    for line in self.0.chunks(TOKENS_PER_LINE) {
      let tokens: Vec<String> = line.iter().map(|byte| hex::encode_upper([*byte])).collect();
      text.push_str(&tokens.join(" "));
      text.push('\n');
    }
    text
  }
}

fn decode_token(token: &str) -> Option<u8> {
  if token.len() != 2 {
    return None;
  }

  let mut byte = [0u8; 1];
  hex::decode_to_slice(token, &mut byte).ok()?;
  Some(byte[0])
}

impl From<Vec<u8>> for Payload {
  fn from(bytes: Vec<u8>) -> Self {
    Self(bytes)
  }
}

impl Deref for Payload {
  type Target = [u8];

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl AsRef<[u8]> for Payload {
  fn as_ref(&self) -> &[u8] {
    &self.0
  }
}

#[derive(thiserror::Error, Debug)]
pub enum PayloadError {
  #[error("failed to read payload file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("line {line}: {token:?} is not a two-digit hex byte")]
  Token { line: usize, token: String },
}
