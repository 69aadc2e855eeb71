//! Voice agent session
//!
//! Connects to a hosted conversational agent, tracks whether it is
//! listening or speaking, and answers the agent's client tool calls. Audio
//! is optionally bridged to the local microphone and speaker.

mod capture;
mod convai;
mod playback;
mod session;
mod tools;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

pub use capture::{
    AudioCapture, CHUNK_INTERVAL, Microphone, SAMPLE_RATE, samples_to_pcm16, spawn_microphone,
};
pub use convai::{ElevenLabsConnector, SIGNED_URL_PATH};
pub use playback::{AudioPlayback, pcm16_to_samples};
pub use session::VoiceSession;
pub use tools::{ClientTool, ToolRegistry};

use crate::Result;

/// Default agent WebSocket base URL
pub const DEFAULT_VOICE_URL: &str = "wss://api.elevenlabs.io";

/// What the agent is doing while connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    Listening,
    Speaking,
}

/// Voice session connection state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "mode", rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected(AgentMode),
}

impl ConnectionState {
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Talk control label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "Talk",
            Self::Connecting => "Connecting…",
            Self::Connected(AgentMode::Speaking) => "Speaking…",
            Self::Connected(AgentMode::Listening) => "Listening…",
        }
    }

    /// Talk control icon
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Disconnected => "🎤",
            Self::Connecting => "⏳",
            Self::Connected(AgentMode::Speaking) => "🗣️",
            Self::Connected(AgentMode::Listening) => "🎙️",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected(AgentMode::Listening) => write!(f, "listening"),
            Self::Connected(AgentMode::Speaking) => write!(f, "speaking"),
        }
    }
}

/// Parameters for opening a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub agent_id: String,
    pub base_url: String,
}

impl SessionConfig {
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            base_url: DEFAULT_VOICE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// A client tool invocation from the agent
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCall {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Value,
}

/// Who produced a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    User,
    Agent,
}

/// Events delivered by a live conversation
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Connected { conversation_id: String },
    ModeChanged(AgentMode),
    Message { source: MessageSource, text: String },
    ToolCall(ToolCall),
    Error(String),
    Disconnected { reason: String },
}

/// Messages sent to a live conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    ToolResult {
        tool_call_id: String,
        result: String,
        is_error: bool,
    },
    Close,
}

/// Both directions of a live conversation
pub struct AgentChannel {
    pub events: mpsc::Receiver<AgentEvent>,
    pub outgoing: mpsc::Sender<ClientMessage>,
}

/// Opens conversations with a voice agent
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    /// Open a conversation
    ///
    /// # Errors
    ///
    /// Returns error if the agent cannot be reached or rejects the session
    async fn connect(&self, config: &SessionConfig) -> Result<AgentChannel>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_state() {
        assert_eq!(ConnectionState::Disconnected.label(), "Talk");
        assert_eq!(ConnectionState::Connecting.label(), "Connecting…");
        assert_eq!(
            ConnectionState::Connected(AgentMode::Speaking).label(),
            "Speaking…"
        );
        assert_eq!(
            ConnectionState::Connected(AgentMode::Listening).label(),
            "Listening…"
        );
        assert_eq!(ConnectionState::Connecting.icon(), "⏳");
        assert_eq!(ConnectionState::Disconnected.icon(), "🎤");
    }

    #[test]
    fn state_serializes_with_mode() {
        let json = serde_json::to_value(ConnectionState::Connected(AgentMode::Listening)).unwrap();
        assert_eq!(json["state"], "connected");
        assert_eq!(json["mode"], "listening");

        let json = serde_json::to_value(ConnectionState::Disconnected).unwrap();
        assert_eq!(json["state"], "disconnected");
    }
}
