use std::{io::BufRead, path::PathBuf};

use clap::{Parser, ValueEnum};
use color_eyre::{
  Result,
  eyre::{WrapErr, eyre},
};
use sfsp::{
  Role,
  capture::DEFAULT_OUTPUT_PATH,
  config::{DEFAULT_CONFIG_PATH, Settings},
  link::Link,
  monitoring,
  payload::{DEFAULT_PAYLOAD_PATH, Payload},
  session,
};
use tokio_serial::SerialStream;

#[derive(Debug, Parser)]
#[command(version, about = "Run the SFSP handshake over a serial line")]
struct Cli {
  /// Side of the handshake to run. Shows the mode menu when omitted.
  #[arg(value_enum)]
  role: Option<RoleArg>,

  /// YAML settings with a `serial:` section.
  #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
  config: PathBuf,

  /// Hex-token payload the responder sends.
  #[arg(short, long, default_value = DEFAULT_PAYLOAD_PATH)]
  payload: PathBuf,

  /// Where the initiator writes the hex dump of the captured bytes.
  #[arg(short, long, default_value = DEFAULT_OUTPUT_PATH)]
  output: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
  #[value(alias = "client")]
  Initiator,
  #[value(alias = "server")]
  Responder,
}

impl From<RoleArg> for Role {
  fn from(role: RoleArg) -> Self {
    match role {
      RoleArg::Initiator => Role::Initiator,
      RoleArg::Responder => Role::Responder,
    }
  }
}

enum Job {
  Initiate { output: PathBuf },
  Respond { payload: Payload },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  monitoring::init_logger();
  color_eyre::install()?;

  run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<()> {
  let role = match cli.role {
    Some(role) => role.into(),
    None => prompt_role()?,
  };
  tracing::info!(%role, "selected mode");

  let settings = Settings::load(&cli.config).await.wrap_err("failed to load settings")?;
  let port = settings.serial.port_settings().wrap_err("invalid serial settings")?;

  // a broken payload must fail before the port is touched
  let job = match role {
    Role::Initiator => Job::Initiate { output: cli.output },
    Role::Responder => Job::Respond {
      payload: Payload::load(&cli.payload).await.wrap_err("failed to load payload")?,
    },
  };

  tracing::info!(name = settings.serial.name.as_deref().unwrap_or("-"), "opening serial port");
  let mut link = Link::open(&port).wrap_err("failed to open serial port")?;

  match job {
    Job::Initiate { output } => {
      let result = session::initiate(&mut link).await;
      close(link).await;

      let capture = result.wrap_err("SFSP session failed")?;
      capture.persist(&output).await.wrap_err("failed to save captured data")?;
    }
    Job::Respond { payload } => {
      let result = session::respond(&mut link, &payload).await;
      close(link).await;

      result.wrap_err("SFSP session failed")?;
    }
  }

  Ok(())
}

async fn close(link: Link<SerialStream>) {
  if let Err(err) = link.close().await {
    tracing::warn!("failed to close serial port cleanly: {err}");
  }
}

fn prompt_role() -> Result<Role> {
  println!("Select mode");
  println!("1. Run SFSP command as client");
  println!("2. Run SFSP command as server");

  let mut answer = String::new();
  std::io::stdin()
    .lock()
    .read_line(&mut answer)
    .wrap_err("failed to read mode selection")?;

  parse_mode(&answer)
}

fn parse_mode(answer: &str) -> Result<Role> {
  match answer.trim() {
    "1" => Ok(Role::Initiator),
    "2" => Ok(Role::Responder),
    other => Err(eyre!("unknown option {other:?}")),
  }
}
