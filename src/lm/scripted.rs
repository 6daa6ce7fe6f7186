//! Deterministic [`LanguageModel`] for tests, benchmarks and dry runs.
//!
//! Replies come from, in order: the queue of scripted responses, an optional
//! responder closure, and an optional fallback string. Every call is recorded
//! so tests can assert on the exact prompts the core produced.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{ChatMessage, LanguageModel, LmError, LmResult, Role};

type Responder = Box<dyn Fn(&[ChatMessage]) -> String + Send + Sync>;

/// A recorded call to [`ScriptedLm`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub json_format: bool,
}

impl RecordedCall {
    /// Content of the last user message, i.e. the prompt.
    pub fn prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Scripted language model.
#[derive(Default)]
pub struct ScriptedLm {
    queue: Mutex<VecDeque<String>>,
    responder: Option<Responder>,
    fallback: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies, returned first-in first-out.
    pub fn with_responses<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for response in responses {
            self.push(response);
        }
        self
    }

    /// Compute replies from the messages once the queue is empty.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> String + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Reply used when neither the queue nor a responder applies.
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// Queue one more reply.
    pub fn push(&self, response: impl Into<String>) {
        lock(&self.queue).push_back(response.into());
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Prompts of all calls made so far.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|c| c.prompt().to_string())
            .collect()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Replies still queued.
    pub fn remaining(&self) -> usize {
        lock(&self.queue).len()
    }
}

impl LanguageModel for ScriptedLm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn chat(&self, messages: &[ChatMessage], json_format: bool) -> LmResult<String> {
        lock(&self.calls).push(RecordedCall {
            messages: messages.to_vec(),
            json_format,
        });

        if let Some(next) = lock(&self.queue).pop_front() {
            return Ok(next);
        }
        if let Some(responder) = &self.responder {
            return Ok(responder(messages));
        }
        self.fallback.clone().ok_or_else(|| LmError::RequestFailed {
            message: "scripted LM has no reply left".into(),
        })
    }
}

impl std::fmt::Debug for ScriptedLm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedLm")
            .field("queued", &self.remaining())
            .field("has_responder", &self.responder.is_some())
            .field("fallback", &self.fallback)
            .field("calls", &self.call_count())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
