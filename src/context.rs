//! Per-session context threaded through planning, reasoning and execution.

use std::collections::BTreeSet;

use crate::lm::{self, ChatMessage};
use crate::resource::ResourceRegistry;

/// Domain knowledge pieces, injected into LM calls as system messages.
pub type Knowledge = BTreeSet<String>;

/// A `(question, answer)` pair produced by an earlier task.
pub type AskAnsPair = (String, String);

/// Everything a solve call needs besides the plan itself.
#[derive(Debug, Clone, Copy)]
pub struct SolveContext<'a> {
    pub resources: &'a ResourceRegistry,
    pub knowledge: &'a Knowledge,
}

impl<'a> SolveContext<'a> {
    pub fn new(resources: &'a ResourceRegistry, knowledge: &'a Knowledge) -> Self {
        Self {
            resources,
            knowledge,
        }
    }

    /// Knowledge as an LM chat history.
    pub fn history(&self) -> Vec<ChatMessage> {
        lm::knowledge_messages(self.knowledge)
    }
}

/// Render an earlier task's outcome for inclusion in a reasoning prompt.
pub fn format_other_result((question, answer): &AskAnsPair) -> String {
    format!(
        "======================\n\
         ADDITIONAL INFORMATION:\n\
         \n\
         QUESTION:\n\
         -----------------------\n\
         {question}\n\
         -----------------------\n\
         \n\
         ANSWER:\n\
         -----------------------\n\
         {answer}\n\
         -----------------------\n\
         =======================\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_result_contains_question_and_answer() {
        let text = format_other_result(&("What is X?".into(), "X is 1.".into()));
        assert!(text.starts_with("======================\nADDITIONAL INFORMATION:"));
        assert!(text.contains("QUESTION:\n-----------------------\nWhat is X?\n"));
        assert!(text.contains("ANSWER:\n-----------------------\nX is 1.\n"));
    }

    #[test]
    fn history_mirrors_knowledge() {
        let registry = ResourceRegistry::new();
        let knowledge: Knowledge = ["fact".to_string()].into();
        let ctx = SolveContext::new(&registry, &knowledge);
        assert_eq!(ctx.history().len(), 1);

        let empty = Knowledge::new();
        assert!(SolveContext::new(&registry, &empty).history().is_empty());
    }
}
