// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Parley engine.
//!
//! Exposes the engine entry points over HTTP: chat turns on
//! `POST /v1/messages`, telephony webhooks on `POST /v1/calls/webhook`, and
//! in-call completions on `POST /v1/calls/chat/completions`, plus public
//! health and Prometheus endpoints.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, HealthState, ServerConfig, router, start_server};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use parley_core::types::CompletionTask;
    use parley_test_utils::{MockCompletion, TestHarness};
    use tower::ServiceExt;

    use super::*;
    use crate::handlers::MessageResponse;

    async fn harness(completion: MockCompletion) -> TestHarness {
        TestHarness::builder()
            .with_completion(completion)
            .build()
            .await
            .unwrap()
    }

    fn state(harness: &TestHarness, auth: AuthConfig) -> GatewayState {
        GatewayState {
            engine: Arc::clone(harness.engine()),
            auth,
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render: Some(Arc::new(|| "parley_turns_total 1\n".to_string())),
            },
        }
    }

    fn locked() -> AuthConfig {
        AuthConfig {
            bearer_token: Some("tok".into()),
            webhook_secret: Some("hook".into()),
        }
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("authorization", "Bearer tok")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = harness(MockCompletion::new()).await;
        let response = router(state(&h, locked()))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn metrics_render_prometheus_text() {
        let h = harness(MockCompletion::new()).await;
        let response = router(state(&h, locked()))
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("parley_turns_total"));
    }

    #[tokio::test]
    async fn messages_require_bearer_token() {
        let h = harness(MockCompletion::new()).await;
        let request = Request::builder()
            .method("POST")
            .uri("/v1/messages")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"session_id": "s1", "owner_id": "u1", "text": "hi"}"#))
            .unwrap();
        let response = router(state(&h, locked())).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(h.session("s1").await.is_none());
    }

    #[tokio::test]
    async fn text_message_round_trip() {
        let h = harness(MockCompletion::new().with_response(CompletionTask::Response, "Hey you!")).await;
        let response = router(state(&h, locked()))
            .oneshot(post_json(
                "/v1/messages",
                serde_json::json!({"session_id": "s1", "owner_id": "u1", "text": "hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let reply: MessageResponse = body_json(response).await;
        assert_eq!(reply.kind, "reply");
        assert_eq!(reply.message, "Hey you!");
        assert_eq!(h.session("s1").await.unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn audio_reply_is_base64_media() {
        let h = harness(
            MockCompletion::new()
                .with_response(CompletionTask::Classification, r#"{"response_type": "audio"}"#)
                .with_response(CompletionTask::Response, "sing along"),
        )
        .await;
        let response = router(state(&h, locked()))
            .oneshot(post_json(
                "/v1/messages",
                serde_json::json!({"session_id": "s1", "owner_id": "u1", "text": "send a voice note"}),
            ))
            .await
            .unwrap();
        let reply: MessageResponse = body_json(response).await;
        assert_eq!(reply.media_mime_type.as_deref(), Some("audio/mpeg"));
        let audio = STANDARD.decode(reply.media_base64.unwrap()).unwrap();
        assert_eq!(audio, b"mp3:sing along");
    }

    #[tokio::test]
    async fn blank_owner_is_bad_request() {
        let h = harness(MockCompletion::new()).await;
        let response = router(state(&h, locked()))
            .oneshot(post_json(
                "/v1/messages",
                serde_json::json!({"session_id": "s1", "owner_id": " ", "text": "hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_requires_secret_when_configured() {
        let h = harness(MockCompletion::new()).await;
        let request = Request::builder()
            .method("POST")
            .uri("/v1/calls/webhook")
            .body(Body::from(r#"{"message": {"type": "status-update", "status": "ringing"}}"#))
            .unwrap();
        let response = router(state(&h, locked())).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn webhook_acks_even_malformed_bodies() {
        let h = harness(MockCompletion::new()).await;
        let app = router(state(&h, locked()));

        let request = Request::builder()
            .method("POST")
            .uri("/v1/calls/webhook")
            .header("x-vapi-secret", "hook")
            .body(Body::from("not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let ack: serde_json::Value = body_json(response).await;
        assert_eq!(ack["status"], "error");

        let request = Request::builder()
            .method("POST")
            .uri("/v1/calls/webhook")
            .header("x-vapi-secret", "hook")
            .body(Body::from(r#"{"message": {"type": "status-update", "status": "ringing"}}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let ack: serde_json::Value = body_json(response).await;
        assert_eq!(ack["status"], "received");
        assert_eq!(ack["event_type"], "status-update");
    }

    fn call_chat(secret: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/calls/chat/completions")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header("x-vapi-secret", secret);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn call_chat_returns_a_chat_completion() {
        let h = harness(
            MockCompletion::new().with_response(CompletionTask::Response, "Sounds lovely!"),
        )
        .await;
        let response = router(state(&h, locked()))
            .oneshot(call_chat(
                Some("hook"),
                serde_json::json!({
                    "model": "gpt-4o-mini",
                    "messages": [
                        {"role": "system", "content": "You are Ava."},
                        {"role": "user", "content": "I went hiking today"}
                    ]
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let completion: serde_json::Value = body_json(response).await;
        assert_eq!(completion["object"], "chat.completion");
        assert_eq!(completion["model"], h.engine().config().voice.assistant_model);
        assert_eq!(completion["choices"][0]["message"]["role"], "assistant");
        assert_eq!(completion["choices"][0]["message"]["content"], "Sounds lovely!");
        assert_eq!(completion["choices"][0]["finish_reason"], "stop");
    }

    #[tokio::test]
    async fn call_chat_needs_secret_and_a_user_turn() {
        let h = harness(MockCompletion::new()).await;
        let app = router(state(&h, locked()));
        let body = serde_json::json!({"messages": [{"role": "user", "content": "hi"}]});

        let response = app.clone().oneshot(call_chat(None, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(call_chat(
                Some("hook"),
                serde_json::json!({"messages": [{"role": "assistant", "content": "hello"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
