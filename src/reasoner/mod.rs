//! Reasoners resolve a single task.
//!
//! - [`BaseReasoner`]: asks the bound resources and consolidates; always done.
//! - [`OodaReasoner`]: observe, orient, decide, act. Only completes the task
//!   when the LM is confident, otherwise reports that the task needs
//!   decomposition.

mod base;
mod ooda;
pub(crate) mod prompts;

use miette::Diagnostic;
use thiserror::Error;

use crate::context::{AskAnsPair, SolveContext};
use crate::lm::{LanguageModel, LmError};
use crate::resource::ResourceError;
use crate::task::{Task, TaskError};

pub use base::BaseReasoner;
pub use ooda::{OodaReasoner, Orientation};

#[derive(Debug, Error, Diagnostic)]
pub enum ReasonError {
    #[error("orientation gave no usable verdict after {attempts} attempts: {last_reason}")]
    #[diagnostic(
        code(htp::reason::orient_exhausted),
        help(
            "The LM kept returning something other than {{\"confident\": bool, \"answer\": string|null}}. \
             Try a stronger model or raise `retry.max_attempts`."
        )
    )]
    OrientExhausted { attempts: u32, last_reason: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lm(#[from] LmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Task(#[from] TaskError),
}

pub type ReasonResult<T> = std::result::Result<T, ReasonError>;

/// Stand-in answer when a reasoner could not commit to one.
pub const NO_CONFIDENT_ANSWER: &str =
    "No confident answer could be reached from the available information.";

/// Outcome of reasoning about one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The task was completed with this result.
    Done(String),
    /// The task was left as it was; it should be broken down further.
    NeedsDecomposition { tentative: Option<String> },
}

impl Verdict {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Best available text: the result, the tentative answer, or
    /// [`NO_CONFIDENT_ANSWER`].
    pub fn into_text(self) -> String {
        match self {
            Self::Done(result) => result,
            Self::NeedsDecomposition { tentative } => {
                tentative.unwrap_or_else(|| NO_CONFIDENT_ANSWER.to_string())
            }
        }
    }
}

/// Resolves one task, possibly using its bound resources.
pub trait Reasoner: Send + Sync {
    /// The LM used for reasoning, also used for plan synthesis.
    fn lm(&self) -> &dyn LanguageModel;

    /// Work on `task`. On [`Verdict::Done`] the task is done with that result;
    /// on [`Verdict::NeedsDecomposition`] the task is unchanged. On error the
    /// task keeps its prior status.
    fn reason(
        &self,
        task: &mut Task,
        ctx: &SolveContext<'_>,
        other_results: &[AskAnsPair],
    ) -> ReasonResult<Verdict>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_text() {
        assert_eq!(Verdict::Done("A".into()).into_text(), "A");
        assert_eq!(
            Verdict::NeedsDecomposition {
                tentative: Some("maybe".into())
            }
            .into_text(),
            "maybe"
        );
        assert_eq!(
            Verdict::NeedsDecomposition { tentative: None }.into_text(),
            NO_CONFIDENT_ANSWER
        );
        assert!(!Verdict::NeedsDecomposition { tentative: None }.is_done());
    }
}
