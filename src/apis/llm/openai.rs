/// OpenAI-compatible chat completion client
///
/// Raw JSON HTTP; the same wire shape serves any compatible gateway when a
/// custom base URL is configured.
use super::types::{
    ChatMessage, ChatRequest, ChatResponse, MessageRole, ToolCallRequest, Usage,
};
use super::LlmClient;
use crate::errors::LlmError;
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn serialize_message(message: &ChatMessage) -> Value {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };

        let mut out = json!({ "role": role });
        if let Some(ref content) = message.content {
            out["content"] = json!(content);
        } else {
            out["content"] = Value::Null;
        }
        if !message.tool_calls.is_empty() {
            out["tool_calls"] = Value::Array(
                message
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": { "name": tc.name, "arguments": tc.arguments }
                        })
                    })
                    .collect(),
            );
        }
        if let Some(ref id) = message.tool_call_id {
            out["tool_call_id"] = json!(id);
        }
        out
    }

    fn serialize_request(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages.iter().map(Self::serialize_message).collect::<Vec<_>>(),
        });

        if !request.tools.is_empty() {
            body["tools"] = Value::Array(
                request
                    .tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect(),
            );
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    fn parse_response(value: Value) -> Result<ChatResponse, LlmError> {
        let message = value
            .pointer("/choices/0/message")
            .ok_or_else(|| LlmError::MalformedResponse {
                detail: format!("no choices in response: {}", value),
            })?;

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .map(|s| s.to_string());

        let tool_calls = message
            .get("tool_calls")
            .and_then(|v| v.as_array())
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|call| {
                        Some(ToolCallRequest {
                            id: call.get("id")?.as_str()?.to_string(),
                            name: call.pointer("/function/name")?.as_str()?.to_string(),
                            arguments: call
                                .pointer("/function/arguments")?
                                .as_str()
                                .unwrap_or("{}")
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let usage: Usage = value
            .get("usage")
            .cloned()
            .and_then(|u| serde_json::from_value(u).ok())
            .unwrap_or_default();

        let model = value
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or("")
            .to_string();

        Ok(ChatResponse {
            content,
            tool_calls,
            usage,
            model,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn call(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = self.serialize_request(&request);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Generic {
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited { retry_after: None });
        }
        if !status.is_success() {
            return Err(LlmError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| LlmError::MalformedResponse {
            detail: format!("invalid JSON: {}", e),
        })?;

        Self::parse_response(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::llm::types::ToolSpec;

    #[test]
    fn test_serialize_request_includes_tools() {
        let client = OpenAiClient::new("key".to_string(), None, None);
        let request = ChatRequest {
            model: "gpt-4o".to_string(),
            messages: vec![ChatMessage::system("be careful")],
            tools: vec![ToolSpec {
                name: "place_order".to_string(),
                description: "Place an order".to_string(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            temperature: Some(0.2),
            max_tokens: None,
        };

        let body = client.serialize_request(&request);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["tools"][0]["function"]["name"], "place_order");
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let value = serde_json::json!({
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "get_market_data", "arguments": "{\"symbol\":\"BTC/USDT\"}" }
                    }]
                }
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        });

        let response = OpenAiClient::parse_response(value).unwrap();
        assert!(response.wants_tools());
        assert_eq!(response.tool_calls[0].name, "get_market_data");
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[test]
    fn test_parse_response_final_text() {
        let value = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Holding." } }]
        });
        let response = OpenAiClient::parse_response(value).unwrap();
        assert!(!response.wants_tools());
        assert_eq!(response.content.as_deref(), Some("Holding."));
    }

    #[test]
    fn test_parse_response_rejects_empty_envelope() {
        let err = OpenAiClient::parse_response(serde_json::json!({})).unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse { .. }));
    }
}
