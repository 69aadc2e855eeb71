//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware or a live agent

use std::sync::Arc;

use async_trait::async_trait;
use cook_coach::voice::{
    AgentEvent, AgentMode, ClientMessage, ClientTool, ConnectionState, ElevenLabsConnector,
    SAMPLE_RATE, SIGNED_URL_PATH, SessionConfig, ToolCall, ToolRegistry, VoiceSession,
    pcm16_to_samples, samples_to_pcm16,
};
use cook_coach::{Error, Result};
use secrecy::SecretString;
use serde_json::Value;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{FakeConnector, eventually};

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

struct Echo;

#[async_trait]
impl ClientTool for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    async fn call(&self, parameters: Value) -> Result<String> {
        parameters["text"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| Error::Voice("missing text".to_string()))
    }
}

#[test]
fn test_pcm16_preserves_sine_shape() {
    let samples = generate_sine_samples(440.0, 0.25, 0.5);
    let bytes = samples_to_pcm16(&samples);
    assert_eq!(bytes.len(), samples.len() * 2);

    let decoded = pcm16_to_samples(&bytes);
    let max_error = samples
        .iter()
        .zip(&decoded)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f32, f32::max);
    assert!(max_error < 1e-3, "max error {max_error}");
}

#[test]
fn test_talk_labels() {
    assert_eq!(ConnectionState::default().label(), "Talk");
    assert_eq!(ConnectionState::Connecting.icon(), "⏳");
    assert_eq!(
        ConnectionState::Connected(AgentMode::Speaking).to_string(),
        "speaking"
    );
}

#[tokio::test]
async fn test_registry_dispatch() {
    let registry = ToolRegistry::new().with(Arc::new(Echo));
    assert_eq!(registry.names(), vec!["echo"]);

    let ok = registry
        .dispatch(ToolCall {
            tool_call_id: "1".to_string(),
            tool_name: "echo".to_string(),
            parameters: serde_json::json!({ "text": "hi" }),
        })
        .await;
    assert_eq!(
        ok,
        ClientMessage::ToolResult {
            tool_call_id: "1".to_string(),
            result: "hi".to_string(),
            is_error: false,
        }
    );

    let failed = registry
        .dispatch(ToolCall {
            tool_call_id: "2".to_string(),
            tool_name: "echo".to_string(),
            parameters: Value::Null,
        })
        .await;
    assert!(matches!(failed, ClientMessage::ToolResult { is_error: true, .. }));
}

#[tokio::test]
async fn test_agent_error_ends_session() {
    let connector = FakeConnector::new();
    let voice = VoiceSession::new(
        SessionConfig::new("agent_test"),
        connector.clone(),
        ToolRegistry::new(),
    );
    voice.start().await.unwrap();

    let mut peer = connector.take_peer().await;
    peer.events
        .send(AgentEvent::Error("boom".to_string()))
        .await
        .unwrap();

    let rx = voice.subscribe();
    eventually(|| {
        let rx = rx.clone();
        async move { *rx.borrow() == ConnectionState::Disconnected }
    })
    .await;
    assert_eq!(peer.outgoing.recv().await, Some(ClientMessage::Close));

    // a later toggle opens a fresh conversation
    assert_eq!(
        voice.toggle().await,
        ConnectionState::Connected(AgentMode::Listening)
    );
    let _ = connector.take_peer().await;
}

#[tokio::test]
async fn test_dropped_channel_disconnects() {
    let connector = FakeConnector::new();
    let voice = VoiceSession::new(
        SessionConfig::new("agent_test"),
        connector.clone(),
        ToolRegistry::new(),
    );
    voice.start().await.unwrap();

    drop(connector.take_peer().await);

    let rx = voice.subscribe();
    eventually(|| {
        let rx = rx.clone();
        async move { *rx.borrow() == ConnectionState::Disconnected }
    })
    .await;
}

#[tokio::test]
async fn test_signed_url_uses_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SIGNED_URL_PATH))
        .and(query_param("agent_id", "agent_private"))
        .and(header("xi-api-key", "xi-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "signed_url": "wss://api.elevenlabs.io/v1/convai/conversation?agent_id=agent_private&token=abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = ElevenLabsConnector::new()
        .with_api_key(Some(SecretString::from("xi-test".to_string())));
    let config = SessionConfig::new("agent_private").with_base_url(server.uri());

    let url = connector.conversation_url(&config).await.unwrap();
    assert_eq!(url.scheme(), "wss");
    assert!(url.query().unwrap().contains("token=abc"));
}
