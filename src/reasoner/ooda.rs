//! Observe-orient-decide-act reasoning.
//!
//! *Observe* collects every bound resource's answer plus any results handed
//! down from elsewhere. *Orient* asks the LM, in one JSON call, whether those
//! observations support a confident, concrete answer. *Decide* reads the
//! confidence flag, and *act* completes the task only when it is set.

use std::sync::Arc;

use serde_json::Value;

use crate::context::{AskAnsPair, SolveContext, format_other_result};
use crate::lm::{LanguageModel, LmError};
use crate::retry::{Attempt, RetryError, RetryPolicy};
use crate::task::Task;

use super::{ReasonError, ReasonResult, Reasoner, Verdict, prompts};

/// Parsed orientation reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orientation {
    pub confident: bool,
    pub answer: Option<String>,
}

impl Orientation {
    /// Validate an LM reply of the form `{"confident": bool, "answer": string|null}`.
    pub fn parse(value: &Value) -> Attempt<Self> {
        let Some(obj) = value.as_object() else {
            return Attempt::invalid("orientation is not a JSON object");
        };
        let Some(confident) = obj.get("confident").and_then(Value::as_bool) else {
            return Attempt::invalid("\"confident\" is missing or not a boolean");
        };
        let answer = match obj.get("answer") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Attempt::invalid("\"answer\" is neither a string nor null"),
        };
        if confident && answer.is_none() {
            return Attempt::invalid("confident orientation without an answer");
        }
        Attempt::Valid(Self { confident, answer })
    }
}

pub struct OodaReasoner {
    lm: Arc<dyn LanguageModel>,
    pub n_words: usize,
    pub retry: RetryPolicy,
}

impl OodaReasoner {
    pub fn new(lm: Arc<dyn LanguageModel>) -> Self {
        Self {
            lm,
            n_words: 300,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_n_words(mut self, n_words: usize) -> Self {
        self.n_words = n_words;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn observe(
        &self,
        task: &Task,
        ctx: &SolveContext<'_>,
        other_results: &[AskAnsPair],
    ) -> ReasonResult<Vec<String>> {
        let mut observations = Vec::with_capacity(task.resources.len() + other_results.len());
        for &id in &task.resources {
            if ctx.resources.get(id).is_none() {
                tracing::warn!(%id, ask = %task.ask, "skipping unknown resource");
                continue;
            }
            observations.push(ctx.resources.present_full_answer(id, &task.ask, self.n_words)?);
        }
        observations.extend(other_results.iter().map(format_other_result));
        Ok(observations)
    }

    fn orient(
        &self,
        task: &Task,
        ctx: &SolveContext<'_>,
        observations: &[String],
    ) -> ReasonResult<Orientation> {
        let prompt = prompts::orient(&task.ask, self.n_words, &observations.join("\n\n"));
        let history = ctx.history();

        self.retry
            .run("orient", |_| match self.lm.get_json_response(&prompt, &history) {
                Ok(value) => Ok(Orientation::parse(&value)),
                Err(LmError::MalformedJson { message, .. }) => Ok(Attempt::invalid(message)),
                Err(e) => Err(e),
            })
            .map_err(|e| match e {
                RetryError::Exhausted {
                    attempts,
                    last_reason,
                } => ReasonError::OrientExhausted {
                    attempts,
                    last_reason,
                },
                RetryError::Fatal(e) => ReasonError::Lm(e),
            })
    }
}

impl Reasoner for OodaReasoner {
    fn lm(&self) -> &dyn LanguageModel {
        self.lm.as_ref()
    }

    fn reason(
        &self,
        task: &mut Task,
        ctx: &SolveContext<'_>,
        other_results: &[AskAnsPair],
    ) -> ReasonResult<Verdict> {
        let observations = self.observe(task, ctx, other_results)?;
        let orientation = self.orient(task, ctx, &observations)?;

        // Decide & act.
        match orientation {
            Orientation {
                confident: true,
                answer: Some(answer),
            } => {
                task.complete(answer.clone())?;
                tracing::debug!(ask = %task.ask, observations = observations.len(), "confident");
                Ok(Verdict::Done(answer))
            }
            Orientation { answer, .. } => {
                tracing::info!(ask = %task.ask, "not confident, task needs decomposition");
                Ok(Verdict::NeedsDecomposition { tentative: answer })
            }
        }
    }
}

impl std::fmt::Debug for OodaReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OodaReasoner")
            .field("lm", &self.lm.model_name())
            .field("n_words", &self.n_words)
            .field("retry", &self.retry)
            .finish()
    }
}
