//! Language-model contract used by every planning and reasoning component.
//!
//! The core never talks to an LM service directly. It only needs a
//! [`LanguageModel`]: something that turns a chat history into a reply,
//! optionally constrained to JSON. Concrete transports live in submodules:
//!
//! - [`openai`]: blocking OpenAI-compatible `/chat/completions` client
//! - [`scripted`]: deterministic replies for tests and benchmarks

pub mod openai;
pub mod scripted;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::Knowledge;

pub use openai::{OpenAiClient, OpenAiConfig};
pub use scripted::ScriptedLm;

/// Errors from the LM subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum LmError {
    #[error("LM request failed: {message}")]
    #[diagnostic(
        code(htp::lm::request_failed),
        help("Check that the LM endpoint is reachable and the model name is correct.")
    )]
    RequestFailed { message: String },

    #[error("LM endpoint returned HTTP {status}: {body}")]
    #[diagnostic(
        code(htp::lm::http_status),
        help("A 401/403 usually means a missing or wrong API key; 429 means rate limiting.")
    )]
    HttpStatus { status: u16, body: String },

    #[error("failed to parse LM response: {message}")]
    #[diagnostic(
        code(htp::lm::parse_error),
        help("The endpoint returned an unexpected response envelope.")
    )]
    ParseError { message: String },

    #[error("LM reply is not valid JSON: {message}")]
    #[diagnostic(
        code(htp::lm::malformed_json),
        help("The model ignored the JSON-only instruction. Callers retry this under their retry policy.")
    )]
    MalformedJson { message: String, raw: String },

    #[error("API key environment variable \"{var}\" is not set")]
    #[diagnostic(
        code(htp::lm::missing_api_key),
        help("Export {var}=<key>, or point `lm.api_key_env` in the config at another variable.")
    )]
    MissingApiKey { var: String },
}

/// Convenience alias for LM operations.
pub type LmResult<T> = std::result::Result<T, LmError>;

// ---------------------------------------------------------------------------
// Chat messages
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// LanguageModel trait
// ---------------------------------------------------------------------------

/// A chat-completion language model.
///
/// Implementations only provide [`chat`](LanguageModel::chat); the prompt
/// helpers are shared.
pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Send `messages` and return the reply text.
    ///
    /// With `json_format`, the model is asked to reply with a JSON object only.
    /// The reply is still returned as raw text; see
    /// [`get_json_response`](LanguageModel::get_json_response).
    fn chat(&self, messages: &[ChatMessage], json_format: bool) -> LmResult<String>;

    /// Append `prompt` as a user message to `history` and return the reply.
    fn get_response(&self, prompt: &str, history: &[ChatMessage]) -> LmResult<String> {
        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(prompt));
        self.chat(&messages, false)
    }

    /// Like [`get_response`](LanguageModel::get_response) in JSON mode, parsed.
    ///
    /// Returns [`LmError::MalformedJson`] when no JSON value can be recovered
    /// from the reply.
    fn get_json_response(
        &self,
        prompt: &str,
        history: &[ChatMessage],
    ) -> LmResult<serde_json::Value> {
        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(prompt));
        let raw = self.chat(&messages, true)?;
        extract_json(&raw)
    }
}

/// Recover a JSON value from LM output.
///
/// Accepts bare JSON, JSON wrapped in a Markdown code fence, or a JSON object
/// or array embedded in surrounding prose.
pub fn extract_json(raw: &str) -> LmResult<serde_json::Value> {
    let trimmed = strip_code_fence(raw.trim());

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return Ok(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if end > start {
                if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                    return Ok(value);
                }
            }
        }
    }

    Err(LmError::MalformedJson {
        message: "no JSON value found in reply".into(),
        raw: raw.to_string(),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip an optional language tag on the opening fence line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

// ---------------------------------------------------------------------------
// Knowledge injection
// ---------------------------------------------------------------------------

const KNOWLEDGE_INJECTION_TEMPLATE: &str = "\
PLEASE ADD THE FOLLOWING TO YOUR KNOWLEDGE TO BE USED IN PLANNING, REASONING & PROBLEM SOLVING:

START OF KNOWLEDGE PIECE >>>
****************************


{knowledge}


****************************
<<< END OF KNOWLEDGE PIECE
";

/// One system message per knowledge piece, in the knowledge set's order.
pub fn knowledge_messages(knowledge: &Knowledge) -> Vec<ChatMessage> {
    knowledge
        .iter()
        .map(|piece| ChatMessage::system(KNOWLEDGE_INJECTION_TEMPLATE.replace("{knowledge}", piece)))
        .collect()
}
