//! End-to-end tests for the agent.
//!
//! These drive the public API with a scripted language model and in-memory
//! resources, checking strategy selection, plan execution, synthesis inputs
//! and program-catalog reuse together.

use std::collections::HashMap;
use std::sync::Arc;

use htp_agent::agent::{Agent, Planning, StrategyKind};
use htp_agent::context::{AskAnsPair, SolveContext};
use htp_agent::htp::Htp;
use htp_agent::lm::{LanguageModel, ScriptedLm};
use htp_agent::planner::HtPlanner;
use htp_agent::program_space::ProgramSpace;
use htp_agent::reasoner::{BaseReasoner, OodaReasoner, ReasonResult, Reasoner, Verdict};
use htp_agent::resource::{Resource, ResourceRegistry, ResourceResult};
use htp_agent::retry::RetryPolicy;
use htp_agent::task::Task;

/// Answers every task with `A:{ask}`; uses the LM only for synthesis.
struct EchoReasoner {
    lm: Arc<ScriptedLm>,
}

impl Reasoner for EchoReasoner {
    fn lm(&self) -> &dyn LanguageModel {
        self.lm.as_ref()
    }

    fn reason(
        &self,
        task: &mut Task,
        _ctx: &SolveContext<'_>,
        _other_results: &[AskAnsPair],
    ) -> ReasonResult<Verdict> {
        let answer = format!("A:{}", task.ask);
        task.complete(answer.clone())?;
        Ok(Verdict::Done(answer))
    }
}

/// Resource that answers without an LM.
struct Notes {
    name: String,
}

impl Resource for Notes {
    fn unique_name(&self) -> &str {
        &self.name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn answer(&self, question: &str, _n_words: usize) -> ResourceResult<String> {
        Ok(format!("{}: {question}", self.name))
    }
}

fn notes(name: &str) -> Box<dyn Resource> {
    Box::new(Notes { name: name.into() })
}

fn quick_planner(lm: &Arc<ScriptedLm>) -> HtPlanner {
    HtPlanner::new(lm.clone()).with_retry(RetryPolicy::immediate(2))
}

fn assert_all_done(plan: &Htp) {
    assert!(plan.task.is_done(), "{} is not done", plan.task.ask);
    assert!(plan.task.result().is_some());
    plan.sub_plans.iter().for_each(assert_all_done);
}

#[test]
fn synthesis_sees_every_sub_result() {
    let lm = Arc::new(ScriptedLm::new().with_responses(["final"]));
    let agent = Agent::builder(Box::new(EchoReasoner { lm: lm.clone() })).build();

    let plan = Htp::from_json_str(
        r#"{"task": "Q", "sub-plans": [{"task": "Q1"}, {"task": "Q2"}]}"#,
        agent.resources(),
    )
    .unwrap();
    let solution = agent.solve_with_plan("Q", plan).unwrap();

    assert_eq!(solution.answer, "final");
    assert_eq!(solution.strategy, StrategyKind::ExplicitStaticPlan);
    assert_eq!(lm.call_count(), 1, "leaves must not cost extra LM calls");

    let prompt = &lm.prompts()[0];
    assert!(prompt.contains("A:Q1"));
    assert!(prompt.contains("A:Q2"));
    assert!(prompt.contains("A:Q\n"));

    let plan = solution.plan.unwrap();
    assert_all_done(&plan);
    assert_eq!(plan.sub_plans[1].task.result(), Some("A:Q2"));
}

#[test]
fn static_plan_binds_and_uses_resources() {
    let lm = Arc::new(ScriptedLm::new().with_responses([
        r#"{"task": {"ask": "Is AMD liquid?"},
            "sub-plans": [
                {"task": {"ask": "Current ratio?", "resource": "10k"}},
                {"task": {"ask": "Quick ratio?", "resource": null}}
            ]}"#,
        "AMD is liquid.",
    ]));
    let agent = Agent::builder(Box::new(BaseReasoner::new(lm.clone())))
        .planning(Planning::Static(quick_planner(&lm)))
        .resource(notes("10k"))
        .build();

    let solution = agent.solve("Is AMD liquid?").unwrap();
    assert_eq!(solution.strategy, StrategyKind::StaticPlan);
    assert_eq!(solution.answer, "AMD is liquid.");

    let plan = solution.plan.unwrap();
    assert_all_done(&plan);
    assert_eq!(plan.sub_plans[0].task.result(), Some("10k: Current ratio?"));
    // The unbound sub-task inherits the root's resources.
    assert_eq!(plan.sub_plans[1].task.result(), Some("10k: Quick ratio?"));
    assert_eq!(lm.call_count(), 2);
}

#[test]
fn dynamic_plan_decomposes_only_when_unsure() {
    let lm = Arc::new(ScriptedLm::new().with_responses([
        r#"{"confident": false, "answer": "unsure"}"#,
        r#"{"task": "Q", "sub-plans": [{"task": "Q1"}, {"task": "Q2"}]}"#,
        r#"{"confident": true, "answer": "one"}"#,
        r#"{"confident": false, "answer": "two-ish"}"#,
        "combined",
    ]));
    let reasoner = OodaReasoner::new(lm.clone()).with_retry(RetryPolicy::immediate(2));
    let agent = Agent::builder(Box::new(reasoner))
        .planning(Planning::Dynamic(quick_planner(&lm).with_limits(1, 3)))
        .build();

    let solution = agent.solve("Q").unwrap();
    assert_eq!(solution.strategy, StrategyKind::DynamicPlan);
    assert_eq!(solution.answer, "combined");

    let plan = solution.plan.unwrap();
    assert_eq!(plan.depth(), 1);
    assert_all_done(&plan);
    assert_eq!(plan.sub_plans[0].task.result(), Some("one"));
    // Depth is exhausted at the children, so the tentative answer stands.
    assert_eq!(plan.sub_plans[1].task.result(), Some("two-ish"));

    let prompts = lm.prompts();
    assert_eq!(prompts.len(), 5);
    assert!(prompts[4].contains("unsure"));
    assert!(prompts[4].contains("two-ish"));
    // The second child saw the first child's result.
    assert!(prompts[3].contains("ADDITIONAL INFORMATION"));
}

#[test]
fn explicit_dynamic_plan_keeps_given_structure() {
    let lm = Arc::new(ScriptedLm::new().with_responses([
        r#"{"confident": true, "answer": "root guess"}"#,
        r#"{"confident": false, "answer": null}"#,
        "final",
    ]));
    let reasoner = OodaReasoner::new(lm.clone()).with_retry(RetryPolicy::immediate(1));
    let agent = Agent::builder(Box::new(reasoner))
        .planning(Planning::Dynamic(quick_planner(&lm).with_limits(1, 3)))
        .build();

    let plan = Htp::leaf("Q").with_sub_plans(vec![Htp::leaf("Q1")]);
    let solution = agent.solve_with_plan("Q", plan).unwrap();

    assert_eq!(solution.strategy, StrategyKind::ExplicitDynamicPlan);
    assert_eq!(solution.answer, "final");
    assert_eq!(lm.call_count(), 3, "no planner call once depth is used up");
    let plan = solution.plan.unwrap();
    assert_eq!(plan.depth(), 1);
    assert_all_done(&plan);
}

#[test]
fn explicit_plan_gets_resources_from_planner() {
    let lm = Arc::new(ScriptedLm::new().with_responses([
        r#"{"task": {"ask": "Q"}, "sub-plans": [{"task": {"ask": "Q1", "resource": "10k"}}]}"#,
        // The root holds both resources, so its baseline is a consolidation.
        "consolidated",
        "synth",
    ]));
    let agent = Agent::builder(Box::new(BaseReasoner::new(lm.clone())))
        .planning(Planning::Static(quick_planner(&lm)))
        .resource(notes("10k"))
        .resource(notes("transcript"))
        .build();

    let plan = Htp::leaf("Q").with_sub_plans(vec![Htp::leaf("Q1")]);
    let solution = agent.solve_with_plan("Q", plan).unwrap();

    assert_eq!(solution.strategy, StrategyKind::ExplicitStaticPlan);
    assert_eq!(solution.answer, "synth");
    let plan = solution.plan.unwrap();
    assert_eq!(plan.task.resources, agent.resources().ids());
    assert_eq!(plan.sub_plans[0].task.result(), Some("10k: Q1"));
    assert!(lm.prompts()[0].contains("\"resource\": null"));
}

#[test]
fn catalog_match_is_adapted_and_run() {
    let lm = Arc::new(ScriptedLm::new().with_responses(["liquidity", "final"]));

    let mut space = ProgramSpace::new(lm.clone()).with_retry(RetryPolicy::immediate(2));
    space.add_or_update_program(
        "liquidity",
        "Is {company} liquid?",
        Htp::leaf("Is {company} liquid?").with_sub_plans(vec![Htp::leaf("Check {company} cash")]),
    ).unwrap();
    let agent = Agent::builder(Box::new(EchoReasoner { lm: lm.clone() }))
        .program_space(space)
        .build();

    let adaptations = HashMap::from([("company".to_string(), "AMD".to_string())]);
    let solution = agent.solve_adapted("Is AMD liquid now?", &adaptations).unwrap();

    assert_eq!(solution.strategy, StrategyKind::ExplicitStaticPlan);
    assert_eq!(solution.answer, "final");
    let plan = solution.plan.unwrap();
    assert_eq!(plan.task.ask, "Is AMD liquid now?");
    assert_eq!(plan.sub_plans[0].task.ask, "Check AMD cash");
    assert_eq!(plan.sub_plans[0].task.result(), Some("A:Check AMD cash"));
}

#[test]
fn saved_finished_program_is_solved_afresh() {
    let registry = ResourceRegistry::new();
    let mut stored = Htp::leaf("Is AMD liquid?").with_sub_plans(vec![Htp::leaf("Check cash")]);
    stored.sub_plans[0].task.complete("cash ok").unwrap();
    stored.task.complete("AMD is liquid (old answer)").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("programs.json");
    let mut space = ProgramSpace::new(Arc::new(ScriptedLm::new()));
    space.add_or_update_program("liquidity", "Is a company liquid?", stored).unwrap();
    space.save(&path, &registry).unwrap();

    let lm = Arc::new(ScriptedLm::new().with_responses(["liquidity", "fresh synthesis"]));
    let space = ProgramSpace::load(&path, &registry, lm.clone())
        .unwrap()
        .with_retry(RetryPolicy::immediate(2));
    let agent = Agent::builder(Box::new(EchoReasoner { lm: lm.clone() }))
        .resources(registry)
        .program_space(space)
        .build();

    let solution = agent.solve("Is Intel liquid?").unwrap();
    assert_eq!(solution.answer, "fresh synthesis");
    assert_eq!(lm.call_count(), 2);

    let synthesis = &lm.prompts()[1];
    assert!(synthesis.contains("A:Is Intel liquid?"));
    assert!(synthesis.contains("cash ok"), "finished sub-plans are reused");

    let plan = solution.plan.unwrap();
    assert_eq!(plan.task.ask, "Is Intel liquid?");
    assert_eq!(plan.task.result(), Some("fresh synthesis"));
}

#[test]
fn catalog_miss_falls_back_to_direct_reasoning() {
    let lm = Arc::new(ScriptedLm::new().with_responses(["NONE", "direct answer"]));
    let mut space = ProgramSpace::new(lm.clone());
    space.add_or_update_program("other", "Something else", Htp::leaf("Something else")).unwrap();

    let agent = Agent::builder(Box::new(BaseReasoner::new(lm.clone())))
        .program_space(space)
        .build();
    let solution = agent.solve("Q").unwrap();
    assert_eq!(solution.strategy, StrategyKind::DirectReason);
    assert_eq!(solution.answer, "direct answer");
}

#[test]
fn exhausted_planner_surfaces_as_error_text() {
    let lm = Arc::new(ScriptedLm::new().with_fallback("this is not json"));
    let agent = Agent::builder(Box::new(BaseReasoner::new(lm.clone())))
        .planning(Planning::Static(quick_planner(&lm)))
        .build();

    let answer = agent.answer("Q");
    assert!(answer.starts_with("ERROR: "), "{answer}");
    assert_eq!(lm.call_count(), 2);
}

#[test]
fn registry_can_be_prepared_before_the_agent() {
    let mut registry = ResourceRegistry::new();
    let id = registry.register(notes("10k"));
    let lm = Arc::new(ScriptedLm::new());

    let agent = Agent::builder(Box::new(BaseReasoner::new(lm.clone())))
        .resources(registry)
        .build();
    // One resource: its answer is the result, no LM involved.
    assert_eq!(agent.answer("Revenue?"), "10k: Revenue?");
    assert_eq!(agent.resources().unique_name(id), Some("10k"));
    assert_eq!(lm.call_count(), 0);
}
