use std::time::Duration;

use sfspcomm::{ENTER, HandshakeError, Phase, Role};
use tokio::io::DuplexStream;
use tokio_test::io::Builder;

use crate::{
  capture::Capture,
  link::{Link, LinkError},
  payload::{Payload, PayloadError},
  session::{self, SessionError},
};

const IDLE: Duration = Duration::from_millis(100);
const DEAD_BEEF: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

fn linked_pair() -> (Link<DuplexStream>, Link<DuplexStream>) {
  let (initiator, responder) = tokio::io::duplex(64);
  (Link::new(initiator, Some(IDLE)), Link::new(responder, Some(IDLE)))
}

fn assert_mismatch(result: Result<impl std::fmt::Debug, SessionError>, role: Role, phase: Phase) {
  match result {
    Err(SessionError::Handshake(HandshakeError::Mismatch {
      role: got_role,
      phase: got_phase,
      ..
    })) => {
      assert_eq!(got_role, role);
      assert_eq!(got_phase, phase);
    }
    other => panic!("expected {role} mismatch in {phase:?}, got {other:?}"),
  }
}

#[tokio::test]
async fn both_roles_complete_the_handshake() {
  crate::monitoring::init_logger();
  let (mut initiator, mut responder) = linked_pair();

  let (initiated, responded) = tokio::join!(
    session::handshake(&mut initiator, Role::Initiator),
    session::handshake(&mut responder, Role::Responder),
  );

  initiated.expect("initiator handshake");
  responded.expect("responder handshake");
}

#[tokio::test]
async fn dead_beef_end_to_end() {
  crate::monitoring::init_logger();
  let (mut initiator, mut responder) = linked_pair();
  let payload = Payload::parse("DE AD BE EF\n").expect("valid payload");

  // the responder keeps its end open, so the initiator stops on the idle timeout
  let (captured, sent) = tokio::join!(session::initiate(&mut initiator), async {
    let sent = session::respond(&mut responder, &payload).await;
    tokio::time::sleep(IDLE * 3).await;
    sent
  });

  assert_eq!(sent.expect("responder session"), 4);
  let capture = captured.expect("initiator session");
  assert_eq!(&*capture, &DEAD_BEEF);
  assert_eq!(
    capture.hexdump(),
    "00000000  de ad be ef                                       |....|\n"
  );
}

#[tokio::test]
async fn capture_ends_when_the_responder_hangs_up() {
  let (mut initiator, mut responder) = linked_pair();
  let payload = Payload::from((0..=255u8).collect::<Vec<_>>());

  let (captured, sent) = tokio::join!(session::initiate(&mut initiator), async move {
    let sent = session::respond(&mut responder, &payload).await;
    responder.close().await.expect("close responder");
    sent
  });

  assert_eq!(sent.expect("responder session"), 256);
  assert_eq!(captured.expect("initiator session").to_vec(), (0..=255u8).collect::<Vec<_>>());
}

#[tokio::test]
async fn initiator_against_scripted_responder() {
  let mock = Builder::new()
    .write(b"S")
    .read(b"S")
    .write(b"F")
    .read(b"FSP")
    .write(&[ENTER])
    .read(&DEAD_BEEF)
    .build();
  let mut link = Link::new(mock, Some(IDLE));

  let capture = session::initiate(&mut link).await.expect("initiator session");
  assert_eq!(capture, Capture::from(DEAD_BEEF.to_vec()));
}

#[tokio::test]
async fn responder_against_scripted_initiator() {
  let mock = Builder::new()
    .read(b"S")
    .write(b"S")
    .read(b"F")
    .write(b"FSP")
    .read(&[ENTER])
    .write(&DEAD_BEEF)
    .build();
  let mut link = Link::new(mock, Some(IDLE));

  let sent = session::respond(&mut link, &Payload::from(DEAD_BEEF.to_vec()))
    .await
    .expect("responder session");
  assert_eq!(sent, 4);
}

#[tokio::test]
async fn responder_with_empty_payload_still_completes() {
  let mock = Builder::new()
    .read(b"S")
    .write(b"S")
    .read(b"F")
    .write(b"FSP")
    .read(&[ENTER])
    .build();
  let mut link = Link::new(mock, Some(IDLE));

  assert_eq!(session::respond(&mut link, &Payload::default()).await.expect("session"), 0);
}

// The scripted mocks reject writes they were not scripted with, so each of
// these also shows nothing goes out after the mismatching byte.

#[tokio::test]
async fn initiator_aborts_on_wrong_s_echo() {
  let mock = Builder::new().write(b"S").read(b"s").build();
  let mut link = Link::new(mock, Some(IDLE));

  assert_mismatch(session::initiate(&mut link).await, Role::Initiator, Phase::CommandS);
}

#[tokio::test]
async fn initiator_aborts_on_wrong_echo() {
  let mock = Builder::new()
    .write(b"S")
    .read(b"S")
    .write(b"F")
    .read(b"FXP")
    .build();
  let mut link = Link::new(mock, Some(IDLE));

  assert_mismatch(session::initiate(&mut link).await, Role::Initiator, Phase::CommandF);
}

#[tokio::test]
async fn initiator_does_not_wait_for_a_late_marker() {
  let mock = Builder::new()
    .write(b"S")
    .read(b"S")
    .write(b"F")
    .read(b"FSS")
    .build();
  let mut link = Link::new(mock, None);

  assert_mismatch(session::initiate(&mut link).await, Role::Initiator, Phase::CommandF);
}

#[tokio::test]
async fn responder_aborts_on_unknown_first_command() {
  let mock = Builder::new().read(b"F").build();
  let mut link = Link::new(mock, Some(IDLE));

  let result = session::respond(&mut link, &Payload::from(DEAD_BEEF.to_vec())).await;
  assert_mismatch(result, Role::Responder, Phase::CommandS);
}

#[tokio::test]
async fn responder_aborts_on_unknown_second_command() {
  let mock = Builder::new().read(b"S").write(b"S").read(b"S").build();
  let mut link = Link::new(mock, Some(IDLE));

  let result = session::respond(&mut link, &Payload::from(DEAD_BEEF.to_vec())).await;
  assert_mismatch(result, Role::Responder, Phase::CommandF);
}

#[tokio::test]
async fn responder_withholds_payload_without_enter() {
  let mock = Builder::new()
    .read(b"S")
    .write(b"S")
    .read(b"F")
    .write(b"FSP")
    .read(b"\n")
    .build();
  let mut link = Link::new(mock, Some(IDLE));

  let result = session::respond(&mut link, &Payload::from(DEAD_BEEF.to_vec())).await;
  assert_mismatch(result, Role::Responder, Phase::Enter);
}

#[tokio::test]
async fn silent_responder_fails_the_handshake() {
  let (mut initiator, _responder) = linked_pair();

  match session::initiate(&mut initiator).await {
    Err(SessionError::Link {
      phase: Phase::CommandS,
      source: LinkError::TimedOut(_),
    }) => {}
    other => panic!("expected a timeout while waiting for the 'S' echo, got {other:?}"),
  }
}

#[tokio::test]
async fn idle_line_captures_nothing() {
  let (mut initiator, _responder) = linked_pair();

  let capture = session::capture(&mut initiator).await;
  assert!(capture.is_empty());
  assert_eq!(capture.hexdump(), "");
}

#[tokio::test]
async fn malformed_payload_fails_at_load_time() {
  let dir = tempfile::tempdir().expect("tempdir");
  let path = dir.path().join("test.bin");
  std::fs::write(&path, "DE AD\nZZ EF\n").expect("write fixture");

  match Payload::load(&path).await {
    Err(PayloadError::Token { line: 2, token }) => assert_eq!(token, "ZZ"),
    other => panic!("expected malformed token error, got {other:?}"),
  }
}

#[tokio::test]
async fn payload_file_to_capture_file() {
  crate::monitoring::init_logger();
  let dir = tempfile::tempdir().expect("tempdir");
  let payload_path = dir.path().join("test.bin");
  let output_path = dir.path().join("output.bin");

  let original: Vec<u8> = b"SFSP capture check\x00\x01\x7f\xff".to_vec();
  std::fs::write(&payload_path, Payload::from(original.clone()).to_hex_text()).expect("write fixture");

  let payload = Payload::load(&payload_path).await.expect("load payload");
  let (mut initiator, mut responder) = linked_pair();

  let (captured, sent) = tokio::join!(session::initiate(&mut initiator), async move {
    let sent = session::respond(&mut responder, &payload).await;
    drop(responder);
    sent
  });

  assert_eq!(sent.expect("responder session"), original.len());
  let capture = captured.expect("initiator session");
  capture.persist(&output_path).await.expect("persist capture");

  let dump = std::fs::read_to_string(&output_path).expect("read dump");
  assert_eq!(dump, crate::capture::hexdump(&original));
  assert_eq!(
    dump.lines().next(),
    Some("00000000  53 46 53 50 20 63 61 70  74 75 72 65 20 63 68 65  |SFSP capture che|")
  );
}
