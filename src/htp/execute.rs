//! Static plan execution and bottom-up synthesis.

use crate::context::{AskAnsPair, SolveContext};
use crate::lm::{LanguageModel, LmResult};
use crate::reasoner::Reasoner;

use super::prompts::{synthesis_inputs, synthesis_prompt};
use super::{Htp, HtpResult};

impl Htp {
    /// Execute the plan and return the root's result.
    ///
    /// The node is first resolved directly by `reasoner`. Sub-plans then run
    /// in order, each seeing its earlier siblings' results. A node with
    /// sub-plans gets its final result from one LM synthesis call; a leaf's
    /// result is the direct answer. Every executed node ends up done.
    pub fn execute(
        &mut self,
        reasoner: &dyn Reasoner,
        ctx: &SolveContext<'_>,
        other_results: &[AskAnsPair],
    ) -> HtpResult<String> {
        if let Some(cached) = cached_result(self) {
            return Ok(cached);
        }

        let baseline = reasoner
            .reason(&mut self.task, ctx, other_results)?
            .into_text();

        let result = if self.sub_plans.is_empty() {
            tracing::debug!(ask = %self.task.ask, "leaf resolved directly");
            baseline
        } else {
            let sub_results = run_sub_plans(&mut self.sub_plans, |sub, earlier| {
                sub.execute(reasoner, ctx, earlier)
            })?;
            synthesize(reasoner.lm(), ctx, &self.task.ask, &baseline, &sub_results, other_results)?
        };

        self.task.complete(result.clone())?;
        Ok(result)
    }
}

fn cached_result(plan: &Htp) -> Option<String> {
    if plan.task.is_done() {
        plan.task.result().map(str::to_string)
    } else {
        None
    }
}

/// Run `sub_plans` in order and collect `(ask, result)` pairs.
///
/// Sub-plans that are already done are not run again. `run` receives the
/// results of the earlier siblings.
pub(crate) fn run_sub_plans<E, F>(sub_plans: &mut [Htp], mut run: F) -> Result<Vec<AskAnsPair>, E>
where
    F: FnMut(&mut Htp, &[AskAnsPair]) -> Result<String, E>,
{
    let total = sub_plans.len();
    let mut results: Vec<AskAnsPair> = Vec::with_capacity(total);
    for (i, sub) in sub_plans.iter_mut().enumerate() {
        let result = match cached_result(sub) {
            Some(cached) => {
                tracing::debug!(sub_plan = i + 1, total, ask = %sub.task.ask, "reusing finished sub-plan");
                cached
            }
            None => {
                tracing::info!(sub_plan = i + 1, total, ask = %sub.task.ask, "executing sub-plan");
                run(sub, &results)?
            }
        };
        results.push((sub.task.ask.clone(), result));
    }
    Ok(results)
}

/// One LM call combining a node's direct answer with its sub-plans' results.
pub(crate) fn synthesize(
    lm: &dyn LanguageModel,
    ctx: &SolveContext<'_>,
    ask: &str,
    baseline: &str,
    sub_results: &[AskAnsPair],
    other_results: &[AskAnsPair],
) -> LmResult<String> {
    let info = synthesis_inputs(baseline, sub_results, other_results);
    let result = lm.get_response(&synthesis_prompt(ask, &info), &ctx.history())?;
    tracing::debug!(%ask, supporting = sub_results.len(), "synthesized result");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Knowledge;
    use crate::lm::{LanguageModel, ScriptedLm};
    use crate::reasoner::{ReasonResult, Verdict};
    use crate::resource::ResourceRegistry;
    use crate::task::{Task, TaskStatus};
    use std::sync::Mutex;

    /// Answers every task with `A:{ask}` and remembers what it saw.
    struct StubReasoner {
        lm: ScriptedLm,
        seen: Mutex<Vec<(String, usize)>>,
    }

    impl StubReasoner {
        fn new(lm: ScriptedLm) -> Self {
            Self {
                lm,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Reasoner for StubReasoner {
        fn lm(&self) -> &dyn LanguageModel {
            &self.lm
        }

        fn reason(
            &self,
            task: &mut Task,
            _ctx: &SolveContext<'_>,
            other_results: &[AskAnsPair],
        ) -> ReasonResult<Verdict> {
            self.seen
                .lock()
                .unwrap()
                .push((task.ask.clone(), other_results.len()));
            let answer = format!("A:{}", task.ask);
            task.complete(answer.clone())?;
            Ok(Verdict::Done(answer))
        }
    }

    fn all_done(plan: &Htp) -> bool {
        plan.task.status() == TaskStatus::Done
            && plan.task.result().is_some()
            && plan.sub_plans.iter().all(all_done)
    }

    #[test]
    fn leaf_result_is_direct_answer_without_lm_call() {
        let registry = ResourceRegistry::new();
        let knowledge = Knowledge::new();
        let ctx = SolveContext::new(&registry, &knowledge);
        let reasoner = StubReasoner::new(ScriptedLm::new());

        let mut plan = Htp::leaf("Q");
        let result = plan.execute(&reasoner, &ctx, &[]).unwrap();
        assert_eq!(result, "A:Q");
        assert_eq!(reasoner.lm.call_count(), 0);
        assert!(all_done(&plan));
    }

    #[test]
    fn synthesis_sees_every_sub_result() {
        let registry = ResourceRegistry::new();
        let knowledge: Knowledge = ["domain fact".to_string()].into();
        let ctx = SolveContext::new(&registry, &knowledge);
        let reasoner = StubReasoner::new(ScriptedLm::new().with_responses(["final"]));

        let mut plan = Htp::leaf("Q").with_sub_plans(vec![Htp::leaf("Q1"), Htp::leaf("Q2")]);
        let result = plan.execute(&reasoner, &ctx, &[]).unwrap();
        assert_eq!(result, "final");
        assert!(all_done(&plan));

        let calls = reasoner.lm.calls();
        assert_eq!(calls.len(), 1);
        let prompt = calls[0].prompt();
        assert!(prompt.contains("A:Q1"));
        assert!(prompt.contains("A:Q2"));
        assert!(prompt.contains("A:Q\n"));
        assert!(calls[0].messages[0].content.contains("domain fact"));

        // Later siblings see earlier results.
        let seen = reasoner.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![("Q".to_string(), 0), ("Q1".to_string(), 0), ("Q2".to_string(), 1)]
        );
    }

    #[test]
    fn finished_sub_plans_are_not_rerun() {
        let registry = ResourceRegistry::new();
        let knowledge = Knowledge::new();
        let ctx = SolveContext::new(&registry, &knowledge);
        let reasoner = StubReasoner::new(ScriptedLm::new().with_responses(["final"]));

        let mut plan = Htp::leaf("Q").with_sub_plans(vec![Htp::leaf("Q1"), Htp::leaf("Q2")]);
        plan.sub_plans[0].task.complete("cached").unwrap();
        plan.execute(&reasoner, &ctx, &[]).unwrap();

        let seen: Vec<String> = reasoner.seen.lock().unwrap().iter().map(|s| s.0.clone()).collect();
        assert_eq!(seen, vec!["Q", "Q2"]);
        assert!(reasoner.lm.calls()[0].prompt().contains("cached"));
    }

    #[test]
    fn done_root_returns_cached_result() {
        let registry = ResourceRegistry::new();
        let knowledge = Knowledge::new();
        let ctx = SolveContext::new(&registry, &knowledge);
        let reasoner = StubReasoner::new(ScriptedLm::new());

        let mut plan = Htp::leaf("Q");
        plan.task.complete("old").unwrap();
        assert_eq!(plan.execute(&reasoner, &ctx, &[]).unwrap(), "old");
        assert!(reasoner.seen.lock().unwrap().is_empty());
    }
}
