use std::{
  io,
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;
use tokio_serial::{DataBits, Parity, StopBits};

pub const DEFAULT_CONFIG_PATH: &str = "settings.yml";

const DEFAULT_DATA_SIZE: u8 = 8;
const DEFAULT_STOP_BITS: u8 = 1;
const DEFAULT_PARITY: &str = "N";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  pub serial: SerialSettings,
}

/// Raw `serial:` section, keyed the same way as the `settings.yml` files already in use.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialSettings {
  #[serde(default)]
  pub name: Option<String>,
  pub device: String,
  pub baud: u32,
  #[serde(default = "default_data_size")]
  pub data_size: u8,
  #[serde(rename = "stopbits", default = "default_stop_bits")]
  pub stop_bits: u8,
  #[serde(default = "default_parity")]
  pub parity: String,
  /// Read timeout in milliseconds, 0 blocks until data arrives or the port closes.
  #[serde(rename = "timeout", default)]
  pub timeout_ms: u64,
}

fn default_data_size() -> u8 {
  DEFAULT_DATA_SIZE
}

fn default_stop_bits() -> u8 {
  DEFAULT_STOP_BITS
}

fn default_parity() -> String {
  DEFAULT_PARITY.to_string()
}

/// Validated channel-open parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSettings {
  pub device: String,
  pub baud: u32,
  pub data_bits: DataBits,
  pub stop_bits: StopBits,
  pub parity: Parity,
  pub read_timeout: Option<Duration>,
}

impl Settings {
  pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let settings = Self::from_yaml(&raw)?;
    tracing::debug!(path = %path.display(), "loaded settings");
    Ok(settings)
  }

  pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
    Ok(serde_yaml::from_str(raw)?)
  }
}

impl SerialSettings {
  pub fn port_settings(&self) -> Result<PortSettings, ConfigError> {
    let device = self.device.trim();
    if device.is_empty() {
      return Err(ConfigError::MissingDevice);
    }
    if self.baud == 0 {
      return Err(ConfigError::Baud);
    }

    let data_bits = match self.data_size {
      5 => DataBits::Five,
      6 => DataBits::Six,
      7 => DataBits::Seven,
      8 => DataBits::Eight,
      other => return Err(ConfigError::DataBits(other)),
    };

    let stop_bits = match self.stop_bits {
      1 => StopBits::One,
      2 => StopBits::Two,
      other => return Err(ConfigError::StopBits(other)),
    };

    // only the first character counts, so "None", "even" and "O" all work
    let parity = match self.parity.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
      Some('N') => Parity::None,
      Some('O') => Parity::Odd,
      Some('E') => Parity::Even,
      _ => return Err(ConfigError::Parity(self.parity.clone())),
    };

    let read_timeout = (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms));

    Ok(PortSettings {
      device: device.to_string(),
      baud: self.baud,
      data_bits,
      stop_bits,
      parity,
      read_timeout,
    })
  }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
  #[error("failed to read settings file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("failed to parse settings: {0}")]
  Parse(#[from] serde_yaml::Error),
  #[error("serial device must not be empty")]
  MissingDevice,
  #[error("serial baud rate must be greater than zero")]
  Baud,
  #[error("unsupported data size {0}, expected 5, 6, 7 or 8")]
  DataBits(u8),
  #[error("unsupported stop bits {0}, expected 1 or 2")]
  StopBits(u8),
  #[error("unsupported parity {0:?}, expected N, O or E")]
  Parity(String),
}
