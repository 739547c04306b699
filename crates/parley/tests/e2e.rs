// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end conversation flows through the full engine with mock providers.

use parley_core::TurnOutcome;
use parley_core::types::{CompletionTask, Role};
use parley_test_utils::{MockCompletion, MockTelephony, TestHarness};
use parley_voice::WebhookAck;
use serde_json::json;

const BLUE_FACT: &str = "User's favorite color is blue";

/// Remembers the favorite color when told, and answers from remembered facts.
fn remembering_completion() -> MockCompletion {
    MockCompletion::new()
        .with_responder(CompletionTask::MemoryAnalysis, |req| {
            if req.transcript().to_lowercase().contains("favorite color is blue") {
                Ok(json!({"is_important": true, "formatted_memory": BLUE_FACT}).to_string())
            } else {
                Ok(r#"{"is_important": false, "formatted_memory": null}"#.to_string())
            }
        })
        .with_responder(CompletionTask::Response, |req| {
            let system = req.system.as_deref().unwrap_or_default();
            if system.contains(BLUE_FACT) {
                Ok("Your favorite color is blue!".to_string())
            } else {
                Ok("I don't think you've told me yet.".to_string())
            }
        })
}

async fn harness(completion: MockCompletion) -> TestHarness {
    TestHarness::builder()
        .with_completion(completion)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn facts_follow_the_owner_across_sessions() {
    let h = harness(remembering_completion()).await;

    h.send_text("a", "u1", "My favorite color is blue").await;
    let reply = h.send_text("b", "u1", "What is my favorite color?").await;
    assert!(reply.text().contains("blue"), "got {:?}", reply.text());

    let stranger = h.send_text("c", "u2", "What is my favorite color?").await;
    assert!(!stranger.text().contains("blue"));
}

#[tokio::test]
async fn session_belongs_to_its_first_owner() {
    let h = harness(MockCompletion::new()).await;
    h.send_text("shared", "u1", "hello").await;

    let intruder = h.send_text("shared", "u2", "let me in").await;
    assert!(matches!(intruder, TurnOutcome::Reply(_)));

    let session = h.session("shared").await.unwrap();
    assert_eq!(session.owner_id.as_str(), "u1");
    assert_eq!(session.messages.len(), 2);
    assert!(session.messages.iter().all(|m| m.content != "let me in"));
}

#[tokio::test]
async fn call_lifecycle_lands_in_the_session() {
    let h = harness(MockCompletion::new().with_response(
        CompletionTask::Classification,
        r#"{"response_type": "voice_call", "reason": "User asked for a call"}"#,
    ))
    .await;

    let outcome = h.send_text("s1", "u1", "call me at +14155550123").await;
    let call_id = match outcome {
        TurnOutcome::CallInitiated { call_id, message } => {
            assert!(message.content.contains("+14155550123"));
            call_id
        }
        other => panic!("expected a call, got {other:?}"),
    };

    let calls = h.telephony().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].destination, "+14155550123");
    assert_eq!(calls[0].call_id, call_id);

    let session = h.session("s1").await.unwrap();
    assert_eq!(session.pending_call.as_deref(), Some(call_id.as_str()));
    assert_eq!(session.phone_number.as_deref(), Some("+14155550123"));

    let ack = h
        .deliver_webhook(&json!({"message": {
            "type": "status-update",
            "status": "in-progress",
            "call": {"id": MockTelephony::provider_id_for(&call_id), "metadata": {"call_id": call_id}}
        }}))
        .await;
    assert_eq!(ack, WebhookAck::received("status-update"));

    let ack = h
        .deliver_webhook(&json!({"message": {
            "type": "end-of-call-report",
            "endedReason": "customer-ended-call",
            "summary": "We caught up about the weekend.",
            "call": {"id": MockTelephony::provider_id_for(&call_id), "metadata": {"call_id": call_id}}
        }}))
        .await;
    assert_eq!(ack, WebhookAck::received("end-of-call-report"));

    let session = h.session("s1").await.unwrap();
    assert!(session.pending_call.is_none());
    let last = session.messages.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "Call summary: We caught up about the weekend.");
}

#[tokio::test]
async fn call_request_without_number_asks_for_it() {
    let h = harness(MockCompletion::new().with_response(
        CompletionTask::Classification,
        r#"{"response_type": "voice_call", "reason": "User asked for a call"}"#,
    ))
    .await;

    let outcome = h.send_text("s1", "u1", "can you call me?").await;
    assert!(matches!(outcome, TurnOutcome::Reply(_)));
    assert!(outcome.text().contains("What number should I call?"));
    assert!(h.telephony().calls().is_empty());
}

#[tokio::test]
async fn long_conversation_is_summarized() {
    let h = harness(MockCompletion::new()).await;

    for i in 0..10 {
        h.send_text("s1", "u1", &format!("message {i}")).await;
    }
    let session = h.session("s1").await.unwrap();
    assert_eq!(session.messages.len(), 20);
    assert!(session.summary.is_empty());
    assert_eq!(session.summarized_count, 0);

    h.send_text("s1", "u1", "one more").await;
    let session = h.session("s1").await.unwrap();
    assert_eq!(session.messages.len(), 22);
    assert_eq!(session.summary, "mock summary");
    assert_eq!(session.messages.len() - session.summarized_count, 5);
    assert_eq!(h.completion().call_count(CompletionTask::Summary), 1);
}

#[tokio::test]
async fn facts_survive_in_sqlite() {
    let h = TestHarness::builder()
        .with_completion(remembering_completion())
        .with_sqlite()
        .build()
        .await
        .unwrap();

    h.send_text("a", "u1", "My favorite color is blue").await;
    let reply = h.send_text("b", "u1", "What is my favorite color?").await;
    assert!(reply.text().contains("blue"));

    let session = h.session("a").await.unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].content, "My favorite color is blue");
}
