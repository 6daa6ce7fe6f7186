//! Depth-bounded dynamic solving.
//!
//! A node is first given to the reasoner. Only when the reasoner cannot
//! resolve it confidently is it decomposed, one level at a time, and each
//! level consumes one unit of the planner's depth. Nodes that already carry
//! sub-plans (from an explicit plan) skip the decomposition step.

use tracing::{debug, info};

use super::AgentResult;
use crate::context::{AskAnsPair, SolveContext};
use crate::htp::{Htp, run_sub_plans, synthesize};
use crate::planner::HtPlanner;
use crate::reasoner::{NO_CONFIDENT_ANSWER, Reasoner, Verdict};

pub(super) fn solve_node(
    reasoner: &dyn Reasoner,
    planner: &HtPlanner,
    node: &mut Htp,
    ctx: &SolveContext<'_>,
    other_results: &[AskAnsPair],
) -> AgentResult<String> {
    if let Some(cached) = node.task.result().filter(|_| node.task.is_done()) {
        return Ok(cached.to_string());
    }
    if !node.sub_plans.is_empty() {
        return solve_interior(reasoner, planner, node, ctx, other_results);
    }

    let tentative = match reasoner.reason(&mut node.task, ctx, other_results)? {
        Verdict::Done(result) => return Ok(result),
        Verdict::NeedsDecomposition { tentative } => tentative,
    };
    let baseline = tentative.unwrap_or_else(|| NO_CONFIDENT_ANSWER.to_string());

    if planner.max_depth == 0 {
        debug!(ask = %node.task.ask, "depth exhausted, keeping tentative answer");
        node.task.complete(baseline.clone())?;
        return Ok(baseline);
    }

    node.task.mark_needs_decomposition()?;
    let mut decomposition = planner
        .one_level_deep()
        .plan(&node.task.ask, &node.task.resources, ctx)?;
    decomposition.truncate_depth(1);
    node.task.mark_decomposed()?;
    node.sub_plans = std::mem::take(&mut decomposition.sub_plans);
    node.fix_missing_resources();
    info!(
        ask = %node.task.ask,
        sub_plans = node.sub_plans.len(),
        remaining_depth = planner.max_depth - 1,
        "decomposed"
    );

    if node.sub_plans.is_empty() {
        node.task.complete(baseline.clone())?;
        return Ok(baseline);
    }

    let deeper = planner.one_fewer_level_deep();
    let sub_results = run_sub_plans(&mut node.sub_plans, |child, earlier| {
        solve_node(reasoner, &deeper, child, ctx, earlier)
    })?;
    let result = synthesize(
        reasoner.lm(),
        ctx,
        &node.task.ask,
        &baseline,
        &sub_results,
        other_results,
    )?;
    node.task.complete(result.clone())?;
    Ok(result)
}

/// A node that already has sub-plans: baseline, children one level down, synthesis.
fn solve_interior(
    reasoner: &dyn Reasoner,
    planner: &HtPlanner,
    node: &mut Htp,
    ctx: &SolveContext<'_>,
    other_results: &[AskAnsPair],
) -> AgentResult<String> {
    let baseline = reasoner.reason(&mut node.task, ctx, other_results)?.into_text();

    let deeper = planner.one_fewer_level_deep();
    let sub_results = run_sub_plans(&mut node.sub_plans, |child, earlier| {
        solve_node(reasoner, &deeper, child, ctx, earlier)
    })?;
    let result = synthesize(
        reasoner.lm(),
        ctx,
        &node.task.ask,
        &baseline,
        &sub_results,
        other_results,
    )?;
    node.task.complete(result.clone())?;
    Ok(result)
}
