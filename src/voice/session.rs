//! Voice session lifecycle

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use super::{
    AgentChannel, AgentEvent, AgentMode, ClientMessage, ConnectionState, SessionConfig,
    ToolRegistry, VoiceConnector,
};
use crate::Result;

struct Conversation {
    outgoing: mpsc::Sender<ClientMessage>,
    driver: JoinHandle<()>,
}

/// One voice conversation slot with its published state
///
/// Construction never touches the network; a conversation starts only on
/// [`start`](Self::start) or [`toggle`](Self::toggle).
pub struct VoiceSession {
    config: SessionConfig,
    connector: Arc<dyn VoiceConnector>,
    tools: Arc<ToolRegistry>,
    state: watch::Sender<ConnectionState>,
    conversation: Mutex<Option<Conversation>>,
}

impl VoiceSession {
    #[must_use]
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn VoiceConnector>,
        tools: ToolRegistry,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            connector,
            tools: Arc::new(tools),
            state,
            conversation: Mutex::new(None),
        }
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start when disconnected, end when connected, ignore while connecting
    ///
    /// Failures are logged and leave the session disconnected.
    pub async fn toggle(&self) -> ConnectionState {
        match self.state() {
            ConnectionState::Disconnected => {
                if let Err(e) = self.start().await {
                    tracing::warn!(error = %e, "voice session failed to start");
                }
            }
            ConnectionState::Connected(_) => self.end().await,
            ConnectionState::Connecting => {}
        }
        self.state()
    }

    /// Open a conversation with the registered tools
    ///
    /// No-op unless disconnected.
    ///
    /// # Errors
    ///
    /// Returns error if the connector fails; the state returns to
    /// disconnected
    pub async fn start(&self) -> Result<()> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Ok(());
        }

        tracing::info!(agent_id = %self.config.agent_id, "starting voice session");

        let AgentChannel { events, outgoing } = match self.connector.connect(&self.config).await {
            Ok(channel) => channel,
            Err(e) => {
                self.state.send_replace(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        // end() may have run while connecting
        let connected = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Connected(AgentMode::Listening);
                true
            } else {
                false
            }
        });
        if !connected {
            tracing::debug!("voice session ended while connecting");
            let _ = outgoing.send(ClientMessage::Close).await;
            return Ok(());
        }

        let driver = tokio::spawn(drive(
            events,
            outgoing.clone(),
            Arc::clone(&self.tools),
            self.state.clone(),
        ));

        let previous = self
            .conversation
            .lock()
            .await
            .replace(Conversation { outgoing, driver });
        if let Some(previous) = previous {
            previous.driver.abort();
        }

        Ok(())
    }

    /// Close the conversation; no-op when none is open
    pub async fn end(&self) {
        let conversation = self.conversation.lock().await.take();
        let was = self.state.send_replace(ConnectionState::Disconnected);

        if let Some(conversation) = conversation {
            let _ = conversation.outgoing.send(ClientMessage::Close).await;
            conversation.driver.abort();
        }

        if was != ConnectionState::Disconnected {
            tracing::info!("voice session ended");
        }
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        if let Some(conversation) = self.conversation.get_mut().take() {
            let _ = conversation.outgoing.try_send(ClientMessage::Close);
            conversation.driver.abort();
        }
    }
}

/// Consume agent events until the conversation ends
async fn drive(
    mut events: mpsc::Receiver<AgentEvent>,
    outgoing: mpsc::Sender<ClientMessage>,
    tools: Arc<ToolRegistry>,
    state: watch::Sender<ConnectionState>,
) {
    while let Some(event) = events.recv().await {
        match event {
            AgentEvent::Connected { conversation_id } => {
                tracing::info!(conversation_id = %conversation_id, "connected to voice agent");
            }
            AgentEvent::ModeChanged(mode) => {
                state.send_if_modified(|current| {
                    let next = ConnectionState::Connected(mode);
                    if current.is_connected() && *current != next {
                        *current = next;
                        true
                    } else {
                        false
                    }
                });
            }
            AgentEvent::Message { source, text } => {
                tracing::debug!(?source, text = %text, "transcript");
            }
            AgentEvent::ToolCall(call) => {
                // each call runs on its own task so pings keep flowing
                let tools = Arc::clone(&tools);
                let outgoing = outgoing.clone();
                tokio::spawn(async move {
                    let reply = tools.dispatch(call).await;
                    if outgoing.send(reply).await.is_err() {
                        tracing::debug!("conversation closed before tool result was sent");
                    }
                });
            }
            AgentEvent::Error(message) => {
                tracing::warn!(error = %message, "voice agent error, ending session");
                let _ = outgoing.send(ClientMessage::Close).await;
                break;
            }
            AgentEvent::Disconnected { reason } => {
                tracing::info!(reason = %reason, "voice agent disconnected");
                break;
            }
        }
    }

    state.send_replace(ConnectionState::Disconnected);
}
