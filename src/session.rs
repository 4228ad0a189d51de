use sfspcomm::{Handshake, HandshakeError, Phase, Role, Step};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
  capture::Capture,
  link::{Link, LinkError},
  payload::Payload,
};

/// Handshake as initiator, then capture everything the responder sends until
/// the line goes quiet.
pub async fn initiate<T>(link: &mut Link<T>) -> Result<Capture, SessionError>
where
  T: AsyncRead + AsyncWrite + Unpin,
{
  handshake(link, Role::Initiator).await?;
  tracing::info!("handshake complete, receiving serial data");
  Ok(capture(link).await)
}

/// Handshake as responder, then send the whole payload in one write.
pub async fn respond<T>(link: &mut Link<T>, payload: &Payload) -> Result<usize, SessionError>
where
  T: AsyncRead + AsyncWrite + Unpin,
{
  handshake(link, Role::Responder).await?;
  tracing::info!(bytes = payload.len(), "handshake complete, sending payload");

  link.write(payload).await.map_err(|source| SessionError::Link {
    phase: Phase::Transfer,
    source,
  })?;

  tracing::info!(bytes = payload.len(), "payload sent");
  Ok(payload.len())
}

#[tracing::instrument(level = "debug", skip(link))]
pub async fn handshake<T>(link: &mut Link<T>, role: Role) -> Result<(), SessionError>
where
  T: AsyncRead + AsyncWrite + Unpin,
{
  let mut handshake = Handshake::new(role);

  while let Some((phase, step)) = handshake.pending() {
    let link_err = |source| SessionError::Link { phase, source };

    match step {
      Step::Send(bytes) => {
        link.write(bytes).await.map_err(link_err)?;
        tracing::trace!("sent {bytes:02X?}");
        handshake.sent()?;
      }
      Step::Receive(_) => {
        let byte = link.read_byte().await.map_err(link_err)?;
        check(&mut handshake, &[byte])?;
      }
      Step::ReceiveUntil { marker, expected } => {
        let span = link.read_until(marker, expected.len()).await.map_err(link_err)?;
        check(&mut handshake, &span)?;
      }
    }

    tracing::trace!(phase = ?handshake.phase(), "handshake step complete");
  }

  Ok(())
}

fn check(handshake: &mut Handshake, received: &[u8]) -> Result<(), HandshakeError> {
  tracing::trace!("received {received:02X?}");
  handshake.received(received).inspect_err(|err| {
    tracing::debug!(role = %handshake.role(), "handshake mismatch on {received:02X?}: {err}");
  })
}

/// Reads byte by byte until the link times out or closes. Either one ends the
/// stream; it is never reported as an error.
pub async fn capture<T>(link: &mut Link<T>) -> Capture
where
  T: AsyncRead + AsyncWrite + Unpin,
{
  let mut capture = Capture::new();

  loop {
    match link.read_byte().await {
      Ok(byte) => capture.push(byte),
      Err(err) => {
        tracing::info!(bytes = capture.len(), "end of serial data: {err}");
        break;
      }
    }
  }

  capture
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
  #[error("handshake failed: {0}")]
  Handshake(#[from] HandshakeError),
  #[error("serial link failed during {phase:?} phase: {source}")]
  Link {
    phase: Phase,
    #[source]
    source: LinkError,
  },
}
