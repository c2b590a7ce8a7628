//! Turning provider responses into a [`ReviewResult`].
//!
//! Providers answer in several shapes. [`ResponseShape::ORDERED`] lists the
//! recognized ones in priority order and [`extract_text`] returns the text of
//! the first shape that matches. Parsing that text is a
//! `Result<ReviewResult, ParseError>`; [`parse_or_empty`] applies the
//! `{issues: []}` fallback.

use std::fmt;

use codeguardian_core::ReviewResult;
use serde_json::Value;

/// A recognized provider response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Gemini `candidates[0].content.parts[*].text`.
    GeminiCandidates,
    /// A flat `output_text` string.
    OutputText,
    /// Responses API `output[*].content[*]` blocks of type `output_text`.
    ResponsesOutput,
    /// Chat completions `choices[0].message.content`.
    ChatCompletion,
}

impl ResponseShape {
    /// Every shape, in the order they are tried.
    pub const ORDERED: [ResponseShape; 4] = [
        ResponseShape::GeminiCandidates,
        ResponseShape::OutputText,
        ResponseShape::ResponsesOutput,
        ResponseShape::ChatCompletion,
    ];

    /// Extract the text if `response` has this shape.
    pub fn extract(self, response: &Value) -> Option<String> {
        match self {
            ResponseShape::GeminiCandidates => gemini_candidates(response),
            ResponseShape::OutputText => output_text(response),
            ResponseShape::ResponsesOutput => responses_output(response),
            ResponseShape::ChatCompletion => chat_completion(response),
        }
    }
}

impl fmt::Display for ResponseShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseShape::GeminiCandidates => write!(f, "gemini-candidates"),
            ResponseShape::OutputText => write!(f, "output-text"),
            ResponseShape::ResponsesOutput => write!(f, "responses-output"),
            ResponseShape::ChatCompletion => write!(f, "chat-completion"),
        }
    }
}

fn gemini_candidates(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let texts: Vec<&str> = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() {
        return None;
    }
    Some(texts.join("\n"))
}

fn output_text(response: &Value) -> Option<String> {
    response
        .get("output_text")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map(String::from)
}

fn responses_output(response: &Value) -> Option<String> {
    let chunks: Vec<&str> = response
        .get("output")?
        .as_array()?
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("message"))
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    if chunks.is_empty() {
        return None;
    }
    Some(chunks.join("\n"))
}

fn chat_completion(response: &Value) -> Option<String> {
    response
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .filter(|c| !c.is_empty())
        .map(String::from)
}

/// Text of the first matching shape, and which shape matched.
pub fn detect(response: &Value) -> Option<(ResponseShape, String)> {
    ResponseShape::ORDERED
        .into_iter()
        .find_map(|shape| shape.extract(response).map(|text| (shape, text)))
}

/// Text of the first matching shape, or the empty string.
///
/// # Examples
///
/// ```
/// use codeguardian_review::extract::extract_text;
///
/// let chat = serde_json::json!({"choices": [{"message": {"content": "{\"issues\":[]}"}}]});
/// assert_eq!(extract_text(&chat), "{\"issues\":[]}");
/// assert_eq!(extract_text(&serde_json::json!({"unexpected": true})), "");
/// ```
pub fn extract_text(response: &Value) -> String {
    match detect(response) {
        Some((shape, text)) => {
            tracing::debug!(%shape, chars = text.len(), "extracted response text");
            text
        }
        None => String::new(),
    }
}

/// Why extracted text could not become a [`ReviewResult`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// No text was extracted.
    #[error("response contained no text")]
    Empty,
    /// The text is not a JSON review result.
    #[error("response text is not a valid review result: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The text is JSON but not an object.
    #[error("response text is JSON but not an object")]
    NotAnObject,
}

/// Parse extracted text as a review result.
///
/// Markdown code fences around the JSON are tolerated.
///
/// # Errors
///
/// Returns [`ParseError::Empty`] for blank text,
/// [`ParseError::InvalidJson`] when the text is not JSON and
/// [`ParseError::NotAnObject`] for arrays, strings and other scalars.
pub fn parse_review_text(text: &str) -> Result<ReviewResult, ParseError> {
    let cleaned = strip_code_fences(text);
    if cleaned.is_empty() {
        return Err(ParseError::Empty);
    }
    let value: Value = serde_json::from_str(cleaned)?;
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }
    Ok(serde_json::from_value(value)?)
}

/// Parse extracted text, falling back to an empty result on any
/// [`ParseError`].
///
/// # Examples
///
/// ```
/// use codeguardian_review::extract::parse_or_empty;
///
/// assert!(parse_or_empty("not json").issues.is_empty());
/// assert!(parse_or_empty("").issues.is_empty());
/// ```
pub fn parse_or_empty(text: &str) -> ReviewResult {
    parse_review_text(text).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to parse AI response, using empty result");
        ReviewResult::default()
    })
}

fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}
