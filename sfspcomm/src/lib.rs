#![no_std]

use core::fmt;

pub const COMMAND: [u8; 4] = *b"SFSP";
const COMMAND_LEN: usize = COMMAND.len();
pub const ENTER: u8 = 0x0D;
pub const ECHO_MARKER: u8 = COMMAND[COMMAND_LEN - 1];
pub const ECHO: &[u8] = b"FSP";

const SEND_S: &[u8] = b"S";
const SEND_F: &[u8] = b"F";
const SEND_ENTER: &[u8] = &[ENTER];

const _: () = assert!(ECHO.len() == COMMAND_LEN - 1);
const _: () = assert!(ECHO[0] == COMMAND[1] && ECHO[1] == COMMAND[2] && ECHO[2] == COMMAND[3]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
  Initiator,
  Responder,
}

impl Role {
  fn script(self) -> &'static [(Phase, Step)] {
    match self {
      Role::Initiator => &INITIATOR_SCRIPT,
      Role::Responder => &RESPONDER_SCRIPT,
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Role::Initiator => "initiator",
      Role::Responder => "responder",
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
  Idle,
  CommandS,
  CommandF,
  Enter,
  Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  Send(&'static [u8]),
  Receive(u8),
  ReceiveUntil { marker: u8, expected: &'static [u8] },
}

impl Step {
  #[inline]
  pub fn is_send(&self) -> bool {
    matches!(self, Step::Send(_))
  }
}

const INITIATOR_SCRIPT: [(Phase, Step); 5] = [
  (Phase::CommandS, Step::Send(SEND_S)),
  (Phase::CommandS, Step::Receive(COMMAND[0])),
  (Phase::CommandF, Step::Send(SEND_F)),
  (
    Phase::CommandF,
    Step::ReceiveUntil {
      marker: ECHO_MARKER,
      expected: ECHO,
    },
  ),
  (Phase::Enter, Step::Send(SEND_ENTER)),
];

const RESPONDER_SCRIPT: [(Phase, Step); 5] = [
  (Phase::CommandS, Step::Receive(COMMAND[0])),
  (Phase::CommandS, Step::Send(SEND_S)),
  (Phase::CommandF, Step::Receive(COMMAND[1])),
  (Phase::CommandF, Step::Send(ECHO)),
  (Phase::Enter, Step::Receive(ENTER)),
];

#[derive(Debug, Clone)]
pub struct Handshake {
  role: Role,
  cursor: usize,
  aborted: bool,
}

impl Handshake {
  pub fn new(role: Role) -> Self {
    Self {
      role,
      cursor: 0,
      aborted: false,
    }
  }

  #[inline]
  pub fn role(&self) -> Role {
    self.role
  }

  pub fn phase(&self) -> Phase {
    let script = self.role.script();
    match self.cursor {
      0 => Phase::Idle,
      n if n >= script.len() => Phase::Transfer,
      n => script[n - 1].0,
    }
  }

  #[inline]
  pub fn is_complete(&self) -> bool {
    !self.aborted && self.cursor >= self.role.script().len()
  }

  #[inline]
  pub fn next_step(&self) -> Option<Step> {
    self.pending().map(|(_, step)| step)
  }

  pub fn pending(&self) -> Option<(Phase, Step)> {
    if self.aborted {
      return None;
    }
    self.role.script().get(self.cursor).copied()
  }

  pub fn sent(&mut self) -> Result<(), HandshakeError> {
    let (_, step) = self.current()?;
    if !step.is_send() {
      return Err(HandshakeError::ReceiveExpected(step));
    }

    self.cursor += 1;
    Ok(())
  }

  pub fn received(&mut self, bytes: &[u8]) -> Result<(), HandshakeError> {
    let (phase, step) = self.current()?;

    let matches = match step {
      Step::Send(_) => return Err(HandshakeError::SendExpected(step)),
      Step::Receive(expected) => bytes == [expected],
      Step::ReceiveUntil { expected, .. } => bytes == expected,
    };

    if !matches {
      self.aborted = true;
      return Err(HandshakeError::Mismatch {
        role: self.role,
        phase,
        step,
      });
    }

    self.cursor += 1;
    Ok(())
  }

  fn current(&self) -> Result<(Phase, Step), HandshakeError> {
    if self.aborted {
      return Err(HandshakeError::Aborted);
    }
    self.pending().ok_or(HandshakeError::Finished)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeError {
  // phase of the failing step, not the last completed one
  Mismatch { role: Role, phase: Phase, step: Step },
  ReceiveExpected(Step),
  SendExpected(Step),
  Finished,
  Aborted,
}

impl fmt::Display for HandshakeError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HandshakeError::Mismatch {
        role: Role::Initiator,
        phase: Phase::CommandS,
        ..
      } => f.write_str("command 'S' does not match"),
      HandshakeError::Mismatch {
        role: Role::Initiator,
        step,
        ..
      } => {
        f.write_str("'P' echo mismatch, expected ")?;
        write_expected(f, step)
      }
      HandshakeError::Mismatch {
        role: Role::Responder,
        step,
        ..
      } => {
        f.write_str("unknown command from client, expected ")?;
        write_expected(f, step)
      }
      HandshakeError::ReceiveExpected(_) => f.write_str("handshake is waiting for incoming bytes, not a write"),
      HandshakeError::SendExpected(_) => f.write_str("handshake is waiting for a write, not incoming bytes"),
      HandshakeError::Finished => f.write_str("handshake already finished"),
      HandshakeError::Aborted => f.write_str("handshake was aborted after a mismatch"),
    }
  }
}

impl core::error::Error for HandshakeError {}

fn write_expected(f: &mut fmt::Formatter<'_>, step: &Step) -> fmt::Result {
  let bytes = match step {
    Step::Send(_) => &[][..],
    Step::Receive(byte) => core::slice::from_ref(byte),
    Step::ReceiveUntil { expected, .. } => *expected,
  };

  for (idx, byte) in bytes.iter().enumerate() {
    if idx > 0 {
      f.write_str(" ")?;
    }
    if byte.is_ascii_graphic() {
      write!(f, "'{}'", *byte as char)?;
    } else {
      write!(f, "0x{byte:02X}")?;
    }
  }
  Ok(())
}
