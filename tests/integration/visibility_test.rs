//! Transcript visibility driven by gate decisions.

use pretty_assertions::assert_eq;
use sql_gate::chat::{MessageId, TranscriptMessage};
use sql_gate::config::SessionConfig;
use sql_gate::error::GateError;
use sql_gate::query::Completion;
use sql_gate::session::Session;
use std::time::Duration;

fn ids(messages: &[TranscriptMessage]) -> Vec<String> {
    messages.iter().map(|m| m.id.to_string()).collect()
}

fn conversation() -> Vec<TranscriptMessage> {
    vec![
        TranscriptMessage::user("u1", "Which orders shipped late?"),
        TranscriptMessage::assistant(
            "a1",
            "Here you go:\n```sql\nSELECT id FROM orders WHERE shipped_at > due_at\n```",
        ),
    ]
}

#[test]
fn test_visible_transcript_is_idempotent() {
    let mut session = Session::new(&SessionConfig::default(), false);
    let transcript = conversation();
    session.observe_transcript(&transcript);

    let first = session.visible_transcript(&transcript);
    let second = session.visible_transcript(&transcript);
    assert_eq!(first, second);
    assert_eq!(ids(&first), vec!["u1"]);
    assert_eq!(session.hidden_message(), Some(&MessageId::from("a1")));
}

#[test]
fn test_later_messages_stay_visible_while_one_is_hidden() {
    let mut session = Session::new(&SessionConfig::default(), false);
    let mut transcript = conversation();
    session.observe_transcript(&transcript);

    transcript.push(TranscriptMessage::user("u2", "Also, what about returns?"));
    transcript.push(TranscriptMessage::assistant(
        "a2",
        "```sql\nSELECT * FROM returns\n```",
    ));
    session.observe_transcript(&transcript);

    // The second proposal is dropped, so only the first message is hidden
    assert_eq!(
        ids(&session.visible_transcript(&transcript)),
        vec!["u1", "u2", "a2"]
    );
}

#[test]
fn test_revealed_on_failed_execution() {
    let mut session = Session::new(&SessionConfig::default(), false);
    let transcript = conversation();
    session.observe_transcript(&transcript);

    let ticket = session.approve(None).unwrap();
    session.complete(Completion {
        ticket,
        outcome: Err(GateError::execution("column \"due_at\" does not exist")),
        elapsed: Duration::from_millis(4),
    });

    assert_eq!(session.banner(), Some("column \"due_at\" does not exist"));
    assert_eq!(ids(&session.visible_transcript(&transcript)), vec!["u1", "a1"]);
    assert!(session.hidden_message().is_none());
}

#[test]
fn test_rejected_message_stays_dropped() {
    let mut session = Session::new(&SessionConfig::default(), false);
    let mut transcript = conversation();
    session.observe_transcript(&transcript);
    session.reject().unwrap();

    transcript.push(TranscriptMessage::user("u2", "Never mind"));
    session.observe_transcript(&transcript);

    assert_eq!(ids(&session.visible_transcript(&transcript)), vec!["u1", "u2"]);
}

#[test]
fn test_pending_survives_reconnect() {
    let mut session = Session::new(&SessionConfig::default(), false);
    let transcript = conversation();
    session.observe_transcript(&transcript);

    assert!(session.reconnect().is_none());

    assert!(session.pending().is_some());
    assert_eq!(ids(&session.visible_transcript(&transcript)), vec!["u1"]);
}
