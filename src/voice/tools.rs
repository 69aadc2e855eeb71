//! Client tools the voice agent may invoke

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{ClientMessage, ToolCall};
use crate::Result;

/// A capability exposed to the agent under a fixed name
#[async_trait]
pub trait ClientTool: Send + Sync {
    /// Name the agent calls the tool by
    fn name(&self) -> &str;

    /// Execute with the agent's parameters and return the reply text
    ///
    /// # Errors
    ///
    /// Returns error if the tool cannot produce a reply
    async fn call(&self, parameters: Value) -> Result<String>;
}

/// Tools registered for one conversation
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ClientTool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn ClientTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    #[must_use]
    pub fn with(mut self, tool: Arc<dyn ClientTool>) -> Self {
        self.register(tool);
        self
    }

    /// Registered tool names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool call and build the result message for the agent
    pub async fn dispatch(&self, call: ToolCall) -> ClientMessage {
        let Some(tool) = self.tools.get(&call.tool_name) else {
            tracing::warn!(tool = %call.tool_name, "agent called unknown tool");
            return ClientMessage::ToolResult {
                tool_call_id: call.tool_call_id,
                result: format!("unknown tool: {}", call.tool_name),
                is_error: true,
            };
        };

        tracing::debug!(tool = %call.tool_name, id = %call.tool_call_id, "dispatching tool call");

        match tool.call(call.parameters).await {
            Ok(result) => ClientMessage::ToolResult {
                tool_call_id: call.tool_call_id,
                result,
                is_error: false,
            },
            Err(e) => {
                tracing::warn!(tool = %call.tool_name, error = %e, "tool call failed");
                ClientMessage::ToolResult {
                    tool_call_id: call.tool_call_id,
                    result: e.to_string(),
                    is_error: true,
                }
            }
        }
    }
}
