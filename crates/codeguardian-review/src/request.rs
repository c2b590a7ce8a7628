//! Provider request bodies.
//!
//! Both shapes carry the same JSON schema for the expected
//! `{issues: [{id, path, line, message, suggestion}]}` output. Serialization
//! goes through typed structs and `serde_json`'s ordered map, so identical
//! inputs always produce identical bytes.

use codeguardian_core::Provider;
use serde::{Deserialize, Serialize};

/// The three text inputs of a review request.
///
/// # Examples
///
/// ```
/// use codeguardian_review::request::PromptInputs;
///
/// let inputs = PromptInputs {
///     instruction: "You are a reviewer.",
///     rules: "- CQ-4.05 keys",
///     diff: "+<li>{todo.text}</li>",
/// };
/// let prompt = inputs.combined();
/// assert!(prompt.starts_with("You are a reviewer.\n\nRules:\n"));
/// assert!(prompt.ends_with("DIFF:\n+<li>{todo.text}</li>"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    /// Reviewer instruction (system prompt).
    pub instruction: &'a str,
    /// Review rules text.
    pub rules: &'a str,
    /// Trimmed unified diff.
    pub diff: &'a str,
}

impl PromptInputs<'_> {
    /// Instruction, rules and diff as one prompt.
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.instruction, self.rules_and_diff())
    }

    /// Rules and diff without the instruction, for providers that take the
    /// instruction as a separate system message.
    pub fn rules_and_diff(&self) -> String {
        format!("Rules:\n{}\n\nDIFF:\n{}", self.rules, self.diff)
    }
}

/// A provider-shaped request body.
///
/// Deserializes from either shape, so a saved `request.json` can be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestPayload {
    /// Gemini `generateContent` body. The model goes in the URL.
    Gemini(GeminiRequest),
    /// OpenAI chat completions body.
    OpenAi(OpenAiRequest),
}

impl RequestPayload {
    /// Which provider this body is shaped for.
    pub fn provider(&self) -> Provider {
        match self {
            RequestPayload::Gemini(_) => Provider::Gemini,
            RequestPayload::OpenAi(_) => Provider::OpenAi,
        }
    }

    /// Compact JSON encoding, as sent over the wire.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Total prompt characters across every message.
    pub fn prompt_chars(&self) -> usize {
        match self {
            RequestPayload::Gemini(r) => r
                .contents
                .iter()
                .flat_map(|c| c.parts.iter())
                .map(|p| p.text.chars().count())
                .sum(),
            RequestPayload::OpenAi(r) => r.messages.iter().map(|m| m.content.chars().count()).sum(),
        }
    }
}

/// Gemini request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// Conversation turns; a single user turn here.
    pub contents: Vec<GeminiContent>,
    /// Structured-output settings.
    pub generation_config: GenerationConfig,
}

/// One Gemini conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiContent {
    /// `user` or `model`.
    pub role: String,
    /// Text parts of the turn.
    pub parts: Vec<GeminiPart>,
}

/// A text part of a Gemini turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiPart {
    /// Part text.
    pub text: String,
}

/// Gemini structured-output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Always `application/json`.
    pub response_mime_type: String,
    /// Schema of the expected output.
    pub response_schema: serde_json::Value,
}

/// OpenAI chat completions request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiRequest {
    /// Model identifier.
    pub model: String,
    /// System instruction followed by the user prompt.
    pub messages: Vec<ChatMessage>,
    /// Strict JSON schema output format.
    pub response_format: ResponseFormat,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use codeguardian_review::request::Role;
///
/// assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
}

/// OpenAI `response_format` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Always `json_schema`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Named schema.
    pub json_schema: NamedSchema,
}

/// A named, strict JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSchema {
    /// Schema name.
    pub name: String,
    /// Whether the provider must follow the schema exactly.
    pub strict: bool,
    /// The schema itself.
    pub schema: serde_json::Value,
}

const SCHEMA_NAME: &str = "code_review";

/// Schema of the review output: an object with an `issues` array.
///
/// With `strict` set, every object also forbids additional properties, as
/// OpenAI strict mode requires.
pub fn response_schema(strict: bool) -> serde_json::Value {
    let mut item = serde_json::json!({
        "type": "object",
        "required": ["id", "path", "line", "message", "suggestion"],
        "properties": {
            "id": { "type": "string" },
            "path": { "type": "string" },
            "line": { "type": "integer" },
            "message": { "type": "string" },
            "suggestion": { "type": "string" },
        },
    });
    let mut root = serde_json::json!({
        "type": "object",
        "required": ["issues"],
        "properties": {
            "issues": { "type": "array" },
        },
    });
    if strict {
        item["additionalProperties"] = serde_json::Value::Bool(false);
        root["additionalProperties"] = serde_json::Value::Bool(false);
    }
    root["properties"]["issues"]["items"] = item;
    root
}

/// Build the request body for `provider`.
///
/// `model` is embedded in the OpenAI body and ignored for Gemini, which
/// addresses the model in the URL.
///
/// # Examples
///
/// ```
/// use codeguardian_core::Provider;
/// use codeguardian_review::request::{build_request, PromptInputs, RequestPayload};
///
/// let inputs = PromptInputs { instruction: "i", rules: "r", diff: "d" };
/// let payload = build_request(Provider::Gemini, "gemini-2.5-flash", &inputs);
/// assert!(matches!(payload, RequestPayload::Gemini(_)));
/// ```
pub fn build_request(provider: Provider, model: &str, inputs: &PromptInputs<'_>) -> RequestPayload {
    match provider {
        Provider::Gemini => RequestPayload::Gemini(GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".into(),
                parts: vec![GeminiPart {
                    text: inputs.combined(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".into(),
                response_schema: response_schema(false),
            },
        }),
        Provider::OpenAi => RequestPayload::OpenAi(OpenAiRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: inputs.instruction.to_string(),
                },
                ChatMessage {
                    role: Role::User,
                    content: inputs.rules_and_diff(),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_schema".into(),
                json_schema: NamedSchema {
                    name: SCHEMA_NAME.into(),
                    strict: true,
                    schema: response_schema(true),
                },
            },
        }),
    }
}
