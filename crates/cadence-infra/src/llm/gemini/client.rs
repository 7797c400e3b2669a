//! GeminiChatModel -- concrete [`ChatModel`] implementation for Google Gemini.
//!
//! Sends non-streaming requests to `models/{model}:generateContent` with the
//! tool declarations of the current agent. The raw `usageMetadata` block is
//! passed through untouched in [`RawCompletion::llm_output`] so usage
//! accounting can normalize it.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use cadence_core::llm::model::ChatModel;
use cadence_types::config::ModelConfig;
use cadence_types::llm::{
    ChatMessage, ContentPart, InvocationParams, LlmError, MessageContent, ModelRequest,
    ModelResponse, RawCompletion, ToolCall, ToolSpec,
};

use super::types::{
    FunctionCall, FunctionDeclaration, FunctionResponse, GeminiContent, GeminiErrorEnvelope,
    GeminiPart, GeminiRequest, GeminiResponse, GeminiTool, GenerationConfig,
};

// GeminiChatModel intentionally does NOT derive Debug.
pub struct GeminiChatModel {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    temperature: f32,
}

impl GeminiChatModel {
    pub fn new(api_key: SecretString, config: &ModelConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.name.clone(),
            temperature: config.temperature,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn to_gemini_request(&self, request: &ModelRequest) -> GeminiRequest {
        build_request(request, self.temperature)
    }
}

impl ChatModel for GeminiChatModel {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        let body = self.to_gemini_request(request);

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(map_error(status.as_u16(), &error_body));
        }

        let gemini: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        into_model_response(gemini, &self.model, self.temperature)
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn build_request(request: &ModelRequest, temperature: f32) -> GeminiRequest {
    let mut system = Vec::new();
    let mut contents: Vec<GeminiContent> = Vec::new();

    for message in &request.messages {
        match message {
            ChatMessage::System { content } => system.push(content.as_str()),
            ChatMessage::User { content } => contents.push(GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart::text(content.clone())],
            }),
            ChatMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut parts = Vec::new();
                let text = content.to_text();
                if !text.is_empty() {
                    parts.push(GeminiPart::text(text));
                }
                parts.extend(tool_calls.iter().map(|call| GeminiPart {
                    function_call: Some(FunctionCall {
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    }),
                    ..Default::default()
                }));
                if parts.is_empty() {
                    parts.push(GeminiPart::text(""));
                }
                contents.push(GeminiContent {
                    role: Some("model".to_string()),
                    parts,
                });
            }
            ChatMessage::Tool { name, content, .. } => {
                let part = GeminiPart {
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: json!({ "result": content }),
                    }),
                    ..Default::default()
                };
                // Responses to one parallel batch must share a single content block
                match contents.last_mut() {
                    Some(last) if is_function_responses(last) => last.parts.push(part),
                    _ => contents.push(GeminiContent {
                        role: Some("user".to_string()),
                        parts: vec![part],
                    }),
                }
            }
        }
    }

    let system_instruction = (!system.is_empty()).then(|| GeminiContent {
        role: None,
        parts: vec![GeminiPart::text(system.join("\n\n"))],
    });

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![GeminiTool {
            function_declarations: request.tools.iter().map(declaration).collect(),
        }]
    };

    GeminiRequest {
        system_instruction,
        contents,
        tools,
        generation_config: GenerationConfig { temperature },
    }
}

fn is_function_responses(content: &GeminiContent) -> bool {
    !content.parts.is_empty() && content.parts.iter().all(|p| p.function_response.is_some())
}

fn declaration(spec: &ToolSpec) -> FunctionDeclaration {
    let has_properties = spec
        .parameters
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|props| !props.is_empty());
    FunctionDeclaration {
        name: spec.name.clone(),
        description: spec.description.clone(),
        parameters: has_properties.then(|| spec.parameters.clone()),
    }
}

fn into_model_response(
    response: GeminiResponse,
    model: &str,
    temperature: f32,
) -> Result<ModelResponse, LlmError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Provider {
            message: "response contained no candidates".to_string(),
        })?;

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.text {
            texts.push(text);
        }
        if let Some(call) = part.function_call {
            tool_calls.push(ToolCall {
                id: format!("call_{}", tool_calls.len()),
                name: call.name,
                arguments: call.args,
            });
        }
    }
    let content = match texts.len() {
        0 => MessageContent::default(),
        1 => MessageContent::Text(texts.remove(0)),
        _ => MessageContent::Parts(texts.into_iter().map(|text| ContentPart::Text { text }).collect()),
    };

    let mut llm_output = serde_json::Map::new();
    if let Some(usage) = &response.usage_metadata {
        llm_output.insert("usageMetadata".to_string(), usage.clone());
    }
    if let Some(version) = &response.model_version {
        llm_output.insert("modelVersion".to_string(), Value::String(version.clone()));
    }

    Ok(ModelResponse {
        content,
        tool_calls,
        completion: RawCompletion {
            llm_output: Some(Value::Object(llm_output)),
            usage_metadata: response.usage_metadata,
            response_metadata: candidate
                .finish_reason
                .map(|reason| json!({ "finish_reason": reason })),
            additional_kwargs: None,
        },
        invocation: InvocationParams {
            model: Some(model.to_string()),
            model_name: None,
            temperature: Some(temperature),
        },
    })
}

fn map_error(status: u16, body: &str) -> LlmError {
    let (message, code) = match serde_json::from_str::<GeminiErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.to_string(), String::new()),
    };

    if status == 429 || code == "RESOURCE_EXHAUSTED" {
        return LlmError::RateLimited {
            retry_after_ms: None,
            message: format!("429 RESOURCE_EXHAUSTED: {message}"),
        };
    }
    match status {
        401 | 403 => LlmError::AuthenticationFailed,
        400 => LlmError::InvalidRequest(message),
        503 => LlmError::Overloaded(message),
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {message}"),
        },
    }
}
