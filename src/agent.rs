//! Agent Loop (C9): a system-prompted tool-calling loop. The model emits
//! structured tool calls, we execute them against the restricted registry
//! in `tools`, and feed the results back until the model stops calling
//! tools or `max_turns` is hit (§4.9).

use crate::client::GenerationClient;
use crate::config::AgentConfig;
use crate::tools::ToolRegistry;
use crate::types::{ContentBlock, Message, MessageRole};
use crate::Result;
use serde::Serialize;

/// One iteration of the loop: the assistant's response plus the tool
/// results it produced, if any.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub assistant_text: String,
    pub tool_calls: Vec<ToolCallRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentResult {
    pub turns: Vec<Turn>,
    pub final_text: String,
    pub total_tool_calls: usize,
    pub success: bool,
}

pub struct Agent<'a> {
    client: &'a GenerationClient,
    model: String,
    registry: &'a ToolRegistry,
    config: AgentConfig,
}

impl<'a> Agent<'a> {
    pub fn new(client: &'a GenerationClient, model: impl Into<String>, registry: &'a ToolRegistry, config: AgentConfig) -> Self {
        Self { client, model: model.into(), registry, config }
    }

    /// Runs the loop starting from `system`/`prompt`. Stops unconditionally
    /// after `max_turns` iterations, marking the result unsuccessful if the
    /// model was still calling tools at that point.
    pub async fn run(&self, system: &str, prompt: &str) -> Result<AgentResult> {
        let mut messages = vec![Message::system(system), Message::user(prompt)];
        let mut turns = Vec::new();
        let mut total_tool_calls = 0usize;
        let schemas = self.registry.schemas();
        let tool_slice = if schemas.is_empty() { None } else { Some(schemas.as_slice()) };

        for _ in 0..self.config.max_turns {
            let response = self
                .client
                .chat(&self.model, &messages, tool_slice, None)
                .await?;

            let tool_uses: Vec<(String, String, serde_json::Value)> = response
                .content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse(t) => Some((t.id.clone(), t.name.clone(), t.input.clone())),
                    _ => None,
                })
                .collect();

            let assistant_text = response.text_content();
            messages.push(response);

            if tool_uses.is_empty() {
                turns.push(Turn { assistant_text: assistant_text.clone(), tool_calls: Vec::new() });
                return Ok(AgentResult {
                    turns,
                    final_text: assistant_text,
                    total_tool_calls,
                    success: true,
                });
            }

            let mut records = Vec::with_capacity(tool_uses.len());
            for (call_id, name, input) in tool_uses {
                total_tool_calls += 1;
                let outcome = self.registry.dispatch(&name, input.clone()).await;

                let (output, error) = match outcome {
                    Ok(value) => (value, None),
                    Err(e) => (serde_json::Value::String(e.to_string()), Some(e.to_string())),
                };

                messages.push(Message::tool_result(call_id, output.clone()));
                records.push(ToolCallRecord { name, input, output, error });
            }

            turns.push(Turn { assistant_text, tool_calls: records });
        }

        let final_text = turns
            .last()
            .map(|t| t.assistant_text.clone())
            .unwrap_or_default();

        Ok(AgentResult { turns, final_text, total_tool_calls, success: false })
    }
}

#[allow(dead_code)]
fn is_tool_message(m: &Message) -> bool {
    m.role == MessageRole::Tool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool;
    use crate::types::{BaseUrl, ToolUseBlock};

    fn registry_with_echo() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        let echo = tool("echo", "echoes input")
            .param("text", "string")
            .build(|args| async move { Ok(args) })
            .unwrap();
        registry.register(echo);
        registry
    }

    #[test]
    fn test_tool_call_record_serializes_with_error_when_present() {
        let record = ToolCallRecord {
            name: "shell_execute".to_string(),
            input: serde_json::json!({"command": "rm -rf /"}),
            output: serde_json::Value::String("blocked".to_string()),
            error: Some("tool blocked: denylisted".to_string()),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["error"], "tool blocked: denylisted");
    }

    #[test]
    fn test_agent_result_marks_unsuccessful_when_turns_exhausted() {
        let result = AgentResult {
            turns: vec![Turn { assistant_text: "still working".to_string(), tool_calls: vec![] }],
            final_text: "still working".to_string(),
            total_tool_calls: 0,
            success: false,
        };
        assert!(!result.success);
    }

    #[test]
    fn test_is_tool_message_detects_tool_role() {
        let msg = Message::tool_result("call_0", serde_json::json!({"ok": true}));
        assert!(is_tool_message(&msg));
        assert!(!is_tool_message(&Message::user("hi")));
    }

    #[tokio::test]
    async fn test_agent_construction_with_empty_registry_has_no_tools() {
        let client = GenerationClient::new("http://127.0.0.1:11434").unwrap();
        let registry = ToolRegistry::new();
        let agent = Agent::new(&client, "test-model", &registry, AgentConfig::default());
        assert!(agent.registry.is_empty());
        let _ = BaseUrl::new("http://127.0.0.1:11434").unwrap();
    }

    #[test]
    fn test_tool_use_block_round_trips_into_tool_call() {
        let block = ToolUseBlock::new("call_1", "echo", serde_json::json!({"text": "hi"}));
        assert_eq!(block.name, "echo");
    }

    #[test]
    fn test_registry_with_echo_has_one_entry() {
        let registry = registry_with_echo();
        assert_eq!(registry.len(), 1);
    }
}
