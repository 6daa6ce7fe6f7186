//! LM-driven hierarchical task planner.
//!
//! [`HtPlanner::plan`] asks the LM for a whole plan as JSON, bounded by
//! `max_depth` and `max_subtasks_per_decomp`. When the reply is a JSON
//! object that is not plan-shaped, the planner falls back to a plainer
//! request for headed sub-task paragraphs. [`HtPlanner::update_plan_resources`]
//! asks the LM to bind resources to an existing plan.

pub(crate) mod prompts;

use std::collections::BTreeSet;
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

use crate::context::SolveContext;
use crate::htp::{Htp, HtpError};
use crate::lm::{LanguageModel, LmError};
use crate::resource::{ResourceError, ResourceId};
use crate::retry::{Attempt, RetryError, RetryPolicy};
use crate::task::Task;

#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    #[error("planner gave up after {attempts} attempts: {last_reason}")]
    #[diagnostic(
        code(htp::plan::exhausted),
        help("The LM kept returning malformed plans. Try a stronger model or raise `retry.max_attempts`.")
    )]
    Exhausted { attempts: u32, last_reason: String },

    #[error("cannot bind resources to a plan: no resources given")]
    #[diagnostic(
        code(htp::plan::no_resources),
        help("Register at least one resource before updating a plan's resources.")
    )]
    NoResources,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lm(#[from] LmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Htp(#[from] HtpError),
}

pub type PlanResult<T> = std::result::Result<T, PlanError>;

impl From<RetryError<LmError>> for PlanError {
    fn from(err: RetryError<LmError>) -> Self {
        match err {
            RetryError::Exhausted {
                attempts,
                last_reason,
            } => Self::Exhausted {
                attempts,
                last_reason,
            },
            RetryError::Fatal(e) => Self::Lm(e),
        }
    }
}

/// Hierarchical task planner.
#[derive(Clone)]
pub struct HtPlanner {
    lm: Arc<dyn LanguageModel>,
    pub max_depth: usize,
    pub max_subtasks_per_decomp: usize,
    pub retry: RetryPolicy,
}

impl HtPlanner {
    pub fn new(lm: Arc<dyn LanguageModel>) -> Self {
        Self {
            lm,
            max_depth: 2,
            max_subtasks_per_decomp: 3,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_limits(mut self, max_depth: usize, max_subtasks_per_decomp: usize) -> Self {
        self.max_depth = max_depth;
        self.max_subtasks_per_decomp = max_subtasks_per_decomp;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn lm(&self) -> &dyn LanguageModel {
        self.lm.as_ref()
    }

    /// Same planner, limited to a single level of decomposition.
    pub fn one_level_deep(&self) -> Self {
        Self {
            max_depth: 1,
            ..self.clone()
        }
    }

    /// Same planner with one level less depth, stopping at zero.
    pub fn one_fewer_level_deep(&self) -> Self {
        Self {
            max_depth: self.max_depth.saturating_sub(1),
            ..self.clone()
        }
    }

    /// Generate a plan for `problem`.
    ///
    /// With `resources`, the LM sees their overviews and may bind them to
    /// sub-tasks; the root receives the whole set if the LM bound nothing to
    /// it, and sub-plans without resources inherit their parent's.
    pub fn plan(
        &self,
        problem: &str,
        resources: &BTreeSet<ResourceId>,
        ctx: &SolveContext<'_>,
    ) -> PlanResult<Htp> {
        let overviews = if resources.is_empty() {
            None
        } else {
            Some(ctx.resources.overviews(resources)?)
        };
        let prompt = prompts::plan(
            problem,
            overviews.as_ref(),
            self.max_depth,
            self.max_subtasks_per_decomp,
        );

        let mut plan = match self.request_plan(&prompt, ctx)? {
            Ok(plan) => plan,
            Err(message) => {
                tracing::warn!(%message, "LM plan is not plan-shaped, using simplified decomposition");
                self.simplified_decomposition(problem, resources, overviews.as_ref(), ctx)?
            }
        };

        plan.truncate_depth(self.max_depth);
        if !resources.is_empty() {
            if plan.task.resources.is_empty() {
                plan.task.resources = resources.clone();
            }
            plan.fix_missing_resources();
        }

        tracing::debug!(
            max_depth = self.max_depth,
            nodes = plan.node_count(),
            "generated plan:\n{plan}"
        );
        Ok(plan)
    }

    /// Ask the LM to bind `resources` to the open resource slots of `plan`.
    ///
    /// Finished results in `plan` carry over wherever the updated plan keeps
    /// the same shape.
    pub fn update_plan_resources(
        &self,
        plan: &Htp,
        problem: &str,
        resources: &BTreeSet<ResourceId>,
        ctx: &SolveContext<'_>,
    ) -> PlanResult<Htp> {
        if resources.is_empty() {
            return Err(PlanError::NoResources);
        }
        let overviews = ctx.resources.overviews(resources)?;
        let htp_json = serde_json::to_string_pretty(&plan.to_json(ctx.resources))
            .map_err(|e| HtpError::Schema {
                message: e.to_string(),
            })?;
        let prompt = prompts::update_resources(problem, &overviews, &htp_json);
        let history = ctx.history();

        let mut updated = self.retry.run("update plan resources", |_| {
            let value = match self.lm.get_json_response(&prompt, &history) {
                Ok(value) => value,
                Err(LmError::MalformedJson { message, .. }) => return Ok(Attempt::invalid(message)),
                Err(e) => return Err(e),
            };
            if !is_non_empty_object(&value) {
                return Ok(Attempt::invalid("expected a non-empty JSON object"));
            }
            Ok(match Htp::from_json(&value, ctx.resources) {
                Ok(htp) => Attempt::Valid(htp),
                Err(e) => Attempt::invalid(e.to_string()),
            })
        })?;

        updated.carry_progress_from(plan);
        if updated.task.resources.is_empty() {
            updated.task.resources = resources.clone();
        }
        updated.fix_missing_resources();
        tracing::debug!("plan with resources:\n{updated}");
        Ok(updated)
    }

    /// Retry until the LM replies with a non-empty JSON object that either
    /// parses as a plan, or is not plan-shaped at all (`Err` with the schema
    /// message). Plan-shaped replies that break a task invariant are retried.
    fn request_plan(
        &self,
        prompt: &str,
        ctx: &SolveContext<'_>,
    ) -> PlanResult<Result<Htp, String>> {
        let history = ctx.history();
        let outcome = self.retry.run("plan", |_| {
            let value = match self.lm.get_json_response(prompt, &history) {
                Ok(value) if is_non_empty_object(&value) => value,
                Ok(_) => return Ok(Attempt::invalid("expected a non-empty JSON object")),
                Err(LmError::MalformedJson { message, .. }) => return Ok(Attempt::invalid(message)),
                Err(e) => return Err(e),
            };
            Ok(match Htp::from_json(&value, ctx.resources) {
                Ok(plan) => Attempt::Valid(Ok(plan)),
                Err(HtpError::Schema { message }) => Attempt::Valid(Err(message)),
                Err(e) => Attempt::invalid(e.to_string()),
            })
        })?;
        Ok(outcome)
    }

    fn simplified_decomposition(
        &self,
        problem: &str,
        resources: &BTreeSet<ResourceId>,
        overviews: Option<&std::collections::BTreeMap<String, String>>,
        ctx: &SolveContext<'_>,
    ) -> PlanResult<Htp> {
        let prompt =
            prompts::simplified_decomposition(problem, overviews, self.max_subtasks_per_decomp);
        let history = ctx.history();

        let sub_tasks = self.retry.run("simplified decomposition", |_| {
            let reply = self.lm.get_response(&prompt, &history)?;
            let parts = prompts::parse_sub_tasks(&reply, self.max_subtasks_per_decomp);
            Ok(if parts.is_empty() {
                Attempt::invalid(format!("no {} headers in reply", prompts::SUB_TASK_HEADER))
            } else {
                Attempt::Valid(parts)
            })
        })?;

        let root = Task::new(problem).with_resources(resources.clone());
        Ok(Htp::new(root).with_sub_plans(sub_tasks.into_iter().map(Htp::leaf).collect()))
    }
}

fn is_non_empty_object(value: &serde_json::Value) -> bool {
    value.as_object().is_some_and(|obj| !obj.is_empty())
}

impl std::fmt::Debug for HtPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtPlanner")
            .field("lm", &self.lm.model_name())
            .field("max_depth", &self.max_depth)
            .field("max_subtasks_per_decomp", &self.max_subtasks_per_decomp)
            .finish()
    }
}
