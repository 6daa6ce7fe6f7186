use std::sync::Arc;

use crate::context::{AskAnsPair, SolveContext};
use crate::lm::LanguageModel;
use crate::task::Task;

use super::{ReasonResult, Reasoner, Verdict, prompts};

/// Forwards the task to its resources and consolidates their answers.
///
/// With no resources the LM answers directly; with one resource its answer
/// is used as is; with several, one LM call consolidates them.
pub struct BaseReasoner {
    lm: Arc<dyn LanguageModel>,
    pub n_words: usize,
}

impl BaseReasoner {
    pub fn new(lm: Arc<dyn LanguageModel>) -> Self {
        Self { lm, n_words: 300 }
    }

    pub fn with_n_words(mut self, n_words: usize) -> Self {
        self.n_words = n_words;
        self
    }

    fn answer(&self, task: &Task, ctx: &SolveContext<'_>) -> ReasonResult<String> {
        let known: Vec<_> = task
            .resources
            .iter()
            .copied()
            .filter(|&id| {
                let found = ctx.resources.get(id).is_some();
                if !found {
                    tracing::warn!(%id, ask = %task.ask, "skipping unknown resource");
                }
                found
            })
            .collect();

        match known.as_slice() {
            [] => Ok(self
                .lm
                .get_response(&prompts::direct(&task.ask, self.n_words), &ctx.history())?),
            [only] => Ok(ctx.resources.answer(*only, &task.ask, self.n_words)?),
            many => {
                let presented = many
                    .iter()
                    .map(|&id| ctx.resources.present_full_answer(id, &task.ask, self.n_words))
                    .collect::<Result<Vec<_>, _>>()?
                    .join("\n\n");
                let prompt = prompts::consolidation(&task.ask, self.n_words, &presented);
                Ok(self.lm.get_response(&prompt, &ctx.history())?)
            }
        }
    }
}

impl Reasoner for BaseReasoner {
    fn lm(&self) -> &dyn LanguageModel {
        self.lm.as_ref()
    }

    fn reason(
        &self,
        task: &mut Task,
        ctx: &SolveContext<'_>,
        _other_results: &[AskAnsPair],
    ) -> ReasonResult<Verdict> {
        let result = self.answer(task, ctx)?;
        task.complete(result.clone())?;
        tracing::debug!(ask = %task.ask, resources = task.resources.len(), "base reasoner done");
        Ok(Verdict::Done(result))
    }
}

impl std::fmt::Debug for BaseReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseReasoner")
            .field("lm", &self.lm.model_name())
            .field("n_words", &self.n_words)
            .finish()
    }
}
