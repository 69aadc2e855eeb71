//! ElevenLabs Conversational AI transport
//!
//! One WebSocket per conversation. The agent streams audio, transcripts and
//! client tool calls; we answer pings, stream microphone audio when the
//! local bridge is enabled and send tool results back.

use std::time::Duration;

use base64::Engine;
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::capture::{Microphone, SAMPLE_RATE, spawn_microphone};
use super::playback::{AudioPlayback, pcm16_to_samples};
use super::{
    AgentChannel, AgentEvent, AgentMode, ClientMessage, MessageSource, SessionConfig, ToolCall,
    VoiceConnector,
};
use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Conversation endpoint, relative to the voice base URL
const CONVERSATION_PATH: &str = "/v1/convai/conversation";

/// Signed URL endpoint for private agents
pub const SIGNED_URL_PATH: &str = "/v1/convai/conversation/get-signed-url";

/// Bytes per second of agent audio (PCM16 mono at 16 kHz)
const AUDIO_BYTES_PER_SEC: u64 = 32_000;

/// Connects to hosted ElevenLabs agents
pub struct ElevenLabsConnector {
    http: reqwest::Client,
    api_key: Option<SecretString>,
    audio: bool,
}

impl ElevenLabsConnector {
    /// Connector for public agents, without local audio
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: None,
            audio: false,
        }
    }

    #[must_use]
    pub fn from_config(config: &VoiceConfig) -> Self {
        Self::new()
            .with_api_key(config.api_key.clone())
            .with_audio(config.audio)
    }

    /// Key used to request signed URLs for private agents
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Bridge the local microphone and speaker
    #[must_use]
    pub const fn with_audio(mut self, audio: bool) -> Self {
        self.audio = audio;
        self
    }

    /// Resolve the WebSocket URL for a conversation
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is invalid or signing fails
    pub async fn conversation_url(&self, config: &SessionConfig) -> Result<Url> {
        match &self.api_key {
            Some(api_key) => self.signed_url(config, api_key).await,
            None => public_url(config),
        }
    }

    async fn signed_url(&self, config: &SessionConfig, api_key: &SecretString) -> Result<Url> {
        #[derive(Deserialize)]
        struct SignedUrl {
            signed_url: String,
        }

        let mut endpoint = http_base(&config.base_url)?
            .join(SIGNED_URL_PATH)
            .map_err(|e| Error::Config(format!("invalid voice URL: {e}")))?;
        endpoint
            .query_pairs_mut()
            .append_pair("agent_id", &config.agent_id);

        let response = self
            .http
            .get(endpoint)
            .header("xi-api-key", api_key.expose_secret())
            .send()
            .await
            .map_err(|e| Error::Voice(format!("signed URL request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Voice(format!("signed URL error {status}: {body}")));
        }

        let signed: SignedUrl = response
            .json()
            .await
            .map_err(|e| Error::Voice(format!("invalid signed URL response: {e}")))?;

        Url::parse(&signed.signed_url).map_err(|e| Error::Voice(format!("invalid signed URL: {e}")))
    }
}

impl Default for ElevenLabsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl VoiceConnector for ElevenLabsConnector {
    async fn connect(&self, config: &SessionConfig) -> Result<AgentChannel> {
        let url = self.conversation_url(config).await?;

        let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::Voice(format!("connect failed: {e}")))?;

        let init = serde_json::json!({ "type": "conversation_initiation_client_data" });
        ws.send(Message::Text(init.to_string()))
            .await
            .map_err(|e| Error::Voice(format!("handshake failed: {e}")))?;

        let audio = if self.audio {
            match AudioBridge::start().await {
                Ok(bridge) => Some(bridge),
                Err(e) => {
                    tracing::warn!(error = %e, "local audio unavailable, continuing without it");
                    None
                }
            }
        } else {
            None
        };

        let (event_tx, events) = mpsc::channel(64);
        let (outgoing, outgoing_rx) = mpsc::channel(16);

        tokio::spawn(run_conversation(ws, event_tx, outgoing_rx, audio));

        Ok(AgentChannel { events, outgoing })
    }
}

/// Public agent URL: `{base}/v1/convai/conversation?agent_id=...`
fn public_url(config: &SessionConfig) -> Result<Url> {
    let mut url = Url::parse(&config.base_url)
        .and_then(|base| base.join(CONVERSATION_PATH))
        .map_err(|e| Error::Config(format!("invalid voice URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("agent_id", &config.agent_id);
    Ok(url)
}

/// HTTP(S) counterpart of a WebSocket base URL
fn http_base(base_url: &str) -> Result<Url> {
    let mut url =
        Url::parse(base_url).map_err(|e| Error::Config(format!("invalid voice URL: {e}")))?;
    let scheme = match url.scheme() {
        "wss" => "https",
        "ws" => "http",
        other => other,
    }
    .to_string();
    url.set_scheme(&scheme)
        .map_err(|()| Error::Config(format!("unsupported voice URL scheme: {scheme}")))?;
    Ok(url)
}

/// Local microphone and speaker attached to a conversation
struct AudioBridge {
    microphone: Microphone,
    speaker: AudioPlayback,
}

impl AudioBridge {
    async fn start() -> Result<Self> {
        let speaker = AudioPlayback::start(SAMPLE_RATE).await?;
        let microphone = spawn_microphone().await?;
        tracing::info!("local audio bridge started");
        Ok(Self {
            microphone,
            speaker,
        })
    }
}

/// Messages received from the agent
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    ConversationInitiationMetadata {
        conversation_initiation_metadata_event: InitiationMetadata,
    },
    Audio {
        audio_event: AudioEvent,
    },
    AgentResponse {
        agent_response_event: AgentResponseEvent,
    },
    UserTranscript {
        user_transcription_event: UserTranscriptionEvent,
    },
    Interruption,
    Ping {
        ping_event: PingEvent,
    },
    ClientToolCall {
        client_tool_call: ToolCall,
    },
    Error {
        #[serde(default)]
        error_event: Option<ErrorEvent>,
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct InitiationMetadata {
    conversation_id: String,
}

#[derive(Debug, Deserialize)]
struct AudioEvent {
    audio_base_64: String,
}

#[derive(Debug, Deserialize)]
struct AgentResponseEvent {
    agent_response: String,
}

#[derive(Debug, Deserialize)]
struct UserTranscriptionEvent {
    user_transcript: String,
}

#[derive(Debug, Deserialize)]
struct PingEvent {
    event_id: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEvent {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_type: Option<String>,
}

/// Readable text for an agent error message
fn error_text(event: Option<ErrorEvent>, message: Option<String>) -> String {
    let (detail, kind) = match event {
        Some(event) => (event.message.or(message), event.error_type),
        None => (message, None),
    };
    match (kind, detail.filter(|d| !d.trim().is_empty())) {
        (Some(kind), Some(detail)) => format!("{kind}: {detail}"),
        (None, Some(detail)) => detail,
        (Some(kind), None) => kind,
        (None, None) => "unknown agent error".to_string(),
    }
}

/// Messages sent to the agent
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutgoingMessage<'a> {
    Pong {
        event_id: u64,
    },
    ClientToolResult {
        tool_call_id: &'a str,
        result: &'a str,
        is_error: bool,
    },
}

/// Untagged user audio frame
#[derive(Debug, Serialize)]
struct UserAudioChunk<'a> {
    user_audio_chunk: &'a str,
}

/// Playback time of a base64 PCM16 chunk
fn audio_duration(audio_base64: &str) -> Duration {
    // 4 base64 characters carry 3 bytes
    let bytes = (audio_base64.len() as u64 / 4) * 3;
    Duration::from_millis(bytes * 1000 / AUDIO_BYTES_PER_SEC)
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Pump one conversation until either side closes it
async fn run_conversation(
    ws: WsStream,
    events: mpsc::Sender<AgentEvent>,
    mut outgoing: mpsc::Receiver<ClientMessage>,
    mut audio: Option<AudioBridge>,
) {
    let (mut sink, mut stream) = ws.split();
    let mut speaking_until: Option<Instant> = None;

    let reason = loop {
        let deadline = speaking_until.unwrap_or_else(Instant::now);

        tokio::select! {
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map_or_else(|| "closed by agent".to_string(), |f| f.reason.to_string());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break format!("connection error: {e}"),
                    None => break "connection closed".to_string(),
                };

                let message = match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::debug!(error = %e, "ignoring unparsable agent message");
                        continue;
                    }
                };

                match message {
                    ServerMessage::ConversationInitiationMetadata { conversation_initiation_metadata_event: meta } => {
                        let _ = events.send(AgentEvent::Connected { conversation_id: meta.conversation_id }).await;
                    }
                    ServerMessage::Audio { audio_event } => {
                        if let Some(bridge) = &audio {
                            if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(&audio_event.audio_base_64) {
                                bridge.speaker.enqueue(&pcm16_to_samples(&bytes));
                            }
                        }
                        let now = Instant::now();
                        let start = speaking_until.filter(|t| *t > now).unwrap_or(now);
                        if speaking_until.is_none() {
                            let _ = events.send(AgentEvent::ModeChanged(AgentMode::Speaking)).await;
                        }
                        speaking_until = Some(start + audio_duration(&audio_event.audio_base_64));
                    }
                    ServerMessage::AgentResponse { agent_response_event } => {
                        let _ = events.send(AgentEvent::Message {
                            source: MessageSource::Agent,
                            text: agent_response_event.agent_response,
                        }).await;
                    }
                    ServerMessage::UserTranscript { user_transcription_event } => {
                        let _ = events.send(AgentEvent::Message {
                            source: MessageSource::User,
                            text: user_transcription_event.user_transcript,
                        }).await;
                    }
                    ServerMessage::Interruption => {
                        if let Some(bridge) = &audio {
                            bridge.speaker.clear();
                        }
                        if speaking_until.take().is_some() {
                            let _ = events.send(AgentEvent::ModeChanged(AgentMode::Listening)).await;
                        }
                    }
                    ServerMessage::Ping { ping_event } => {
                        let pong = OutgoingMessage::Pong { event_id: ping_event.event_id };
                        if let Ok(json) = serde_json::to_string(&pong) {
                            if let Err(e) = sink.send(Message::Text(json)).await {
                                break format!("send failed: {e}");
                            }
                        }
                    }
                    ServerMessage::ClientToolCall { client_tool_call } => {
                        tracing::info!(tool = %client_tool_call.tool_name, id = %client_tool_call.tool_call_id, "agent tool call");
                        let _ = events.send(AgentEvent::ToolCall(client_tool_call)).await;
                    }
                    ServerMessage::Error { error_event, message } => {
                        let message = error_text(error_event, message);
                        tracing::warn!(error = %message, "agent reported error");
                        let _ = events.send(AgentEvent::Error(message)).await;
                    }
                    ServerMessage::Unknown => {}
                }
            }

            message = outgoing.recv() => {
                match message {
                    Some(ClientMessage::ToolResult { tool_call_id, result, is_error }) => {
                        let reply = OutgoingMessage::ClientToolResult {
                            tool_call_id: &tool_call_id,
                            result: &result,
                            is_error,
                        };
                        if let Ok(json) = serde_json::to_string(&reply) {
                            if let Err(e) = sink.send(Message::Text(json)).await {
                                break format!("send failed: {e}");
                            }
                        }
                    }
                    Some(ClientMessage::Close) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break "closed by client".to_string();
                    }
                }
            }

            chunk = async {
                match audio.as_mut() {
                    Some(bridge) => bridge.microphone.chunks.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                let Some(chunk) = chunk else {
                    tracing::warn!("microphone stopped");
                    audio = None;
                    continue;
                };
                if let Ok(json) = serde_json::to_string(&UserAudioChunk { user_audio_chunk: &chunk }) {
                    if let Err(e) = sink.send(Message::Text(json)).await {
                        break format!("send failed: {e}");
                    }
                }
            }

            () = tokio::time::sleep_until(deadline), if speaking_until.is_some() => {
                let drained = audio.as_ref().is_none_or(|bridge| bridge.speaker.is_idle());
                if drained {
                    speaking_until = None;
                    let _ = events.send(AgentEvent::ModeChanged(AgentMode::Listening)).await;
                } else {
                    speaking_until = Some(Instant::now() + Duration::from_millis(50));
                }
            }
        }
    };

    tracing::debug!(reason = %reason, "conversation ended");
    let _ = events.send(AgentEvent::Disconnected { reason }).await;
}
