/// LLM step loop
///
/// Drives one conversation per symbol: the model sees the four tools, each
/// requested tool call executes to completion before the next step, and the
/// loop is hard-capped at `MAX_TOOL_STEPS` tool invocations.
use crate::apis::llm::{ChatMessage, ChatRequest, LlmClient};
use crate::arguments::is_debug_agent_enabled;
use crate::audit::ToolCallRecord;
use crate::errors::BotError;
use crate::logger::{log, LogTag};
use crate::types::Symbol;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use super::tools::{all_tools, Tool, ToolContext, ToolResult};

/// Hard cap on tool invocations per symbol cycle
pub const MAX_TOOL_STEPS: usize = 15;

const TEMPERATURE: f64 = 0.2;

pub struct EngineOutcome {
    pub reasoning: String,
    pub tool_calls: Vec<ToolCallRecord>,
}

pub struct AgentEngine {
    llm: Arc<dyn LlmClient>,
    tools: Vec<Arc<dyn Tool>>,
    ctx: ToolContext,
}

impl AgentEngine {
    pub fn new(llm: Arc<dyn LlmClient>, ctx: ToolContext) -> Self {
        Self {
            llm,
            tools: all_tools(),
            ctx,
        }
    }

    fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.definition().name == name)
    }

    /// One full conversation for one symbol. Returns the model's final
    /// reasoning text and the ordered tool-call transcript.
    pub async fn run_symbol(
        &self,
        symbol: &Symbol,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<EngineOutcome, BotError> {
        let mut messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_prompt),
        ];
        let mut records: Vec<ToolCallRecord> = Vec::new();

        loop {
            let request = ChatRequest {
                model: self.llm.model().to_string(),
                messages: messages.clone(),
                tools: self.tools.iter().map(|t| t.definition().to_spec()).collect(),
                temperature: Some(TEMPERATURE),
                max_tokens: None,
            };

            let response = self.llm.call(request).await.map_err(BotError::Llm)?;

            if !response.wants_tools() {
                let reasoning = response.content.unwrap_or_default();
                if is_debug_agent_enabled() {
                    log(
                        LogTag::Agent,
                        "DEBUG",
                        &format!(
                            "{}: final answer after {} tool call(s)",
                            symbol,
                            records.len()
                        ),
                    );
                }
                return Ok(EngineOutcome {
                    reasoning,
                    tool_calls: records,
                });
            }

            let tool_calls = response.tool_calls.clone();
            messages.push(ChatMessage::assistant(response.content.clone(), tool_calls.clone()));

            for call in tool_calls {
                if records.len() >= MAX_TOOL_STEPS {
                    log(
                        LogTag::Agent,
                        "WARN",
                        &format!("{}: tool step cap ({}) reached", symbol, MAX_TOOL_STEPS),
                    );
                    return Ok(EngineOutcome {
                        reasoning: format!(
                            "Stopped after reaching the {} tool-call limit.",
                            MAX_TOOL_STEPS
                        ),
                        tool_calls: records,
                    });
                }

                let arguments: Value =
                    serde_json::from_str(&call.arguments).unwrap_or(Value::Null);

                if is_debug_agent_enabled() {
                    log(
                        LogTag::Agent,
                        "DEBUG",
                        &format!("{}: tool call {} {}", symbol, call.name, arguments),
                    );
                }

                let result = match self.find_tool(&call.name) {
                    Some(tool) => tool.execute(&self.ctx, arguments.clone()).await,
                    None => ToolResult::error(format!("Unknown tool: {}", call.name)),
                };

                let result_json = result.to_json();
                records.push(ToolCallRecord {
                    name: call.name.clone(),
                    arguments,
                    result: result_json.clone(),
                    at: Utc::now(),
                });

                messages.push(ChatMessage::tool_result(
                    call.id.clone(),
                    result_json.to_string(),
                ));
            }
        }
    }
}
