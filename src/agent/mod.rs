//! The problem-solving agent.
//!
//! An [`Agent`] owns the session's resources, knowledge, optional program
//! catalog, a reasoner, and a planning mode fixed at construction. Each
//! [`solve`](Agent::solve) picks exactly one [`Strategy`]:
//!
//! | plan given | planning  | strategy              |
//! |------------|-----------|-----------------------|
//! | no         | none      | `DirectReason`        |
//! | no         | static    | `StaticPlan`          |
//! | no         | dynamic   | `DynamicPlan`         |
//! | yes        | none      | `ExplicitStaticPlan`  |
//! | yes        | static    | `ExplicitStaticPlan`  |
//! | yes        | dynamic   | `ExplicitDynamicPlan` |
//!
//! A plan found in the program catalog counts as a given plan.

mod dynamic;

use std::collections::HashMap;

use miette::Diagnostic;
use thiserror::Error;

use crate::context::{Knowledge, SolveContext};
use crate::htp::{Htp, HtpError};
use crate::lm::LmError;
use crate::planner::{HtPlanner, PlanError};
use crate::program_space::{ProgramSpace, ProgramSpaceError};
use crate::reasoner::{ReasonError, Reasoner};
use crate::resource::{Resource, ResourceId, ResourceRegistry};
use crate::task::{Task, TaskError};

#[derive(Debug, Error, Diagnostic)]
pub enum AgentError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Reason(#[from] ReasonError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Htp(#[from] HtpError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ProgramSpace(#[from] ProgramSpaceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lm(#[from] LmError),
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;

/// How the agent plans, fixed when it is built.
#[derive(Debug, Clone, Default)]
pub enum Planning {
    /// No planner: reason directly, or run given plans as they are.
    #[default]
    None,
    /// Plan the whole tree up front, then execute it.
    Static(HtPlanner),
    /// Decompose only the tasks the reasoner cannot resolve confidently.
    Dynamic(HtPlanner),
}

/// The execution path of one solve.
#[derive(Debug)]
pub enum Strategy<'a> {
    DirectReason,
    StaticPlan(&'a HtPlanner),
    DynamicPlan(&'a HtPlanner),
    ExplicitStaticPlan {
        plan: Htp,
        planner: Option<&'a HtPlanner>,
    },
    ExplicitDynamicPlan {
        plan: Htp,
        planner: &'a HtPlanner,
    },
}

impl<'a> Strategy<'a> {
    pub fn select(plan: Option<Htp>, planning: &'a Planning) -> Self {
        match (plan, planning) {
            (None, Planning::None) => Self::DirectReason,
            (None, Planning::Static(planner)) => Self::StaticPlan(planner),
            (None, Planning::Dynamic(planner)) => Self::DynamicPlan(planner),
            (Some(plan), Planning::None) => Self::ExplicitStaticPlan {
                plan,
                planner: None,
            },
            (Some(plan), Planning::Static(planner)) => Self::ExplicitStaticPlan {
                plan,
                planner: Some(planner),
            },
            (Some(plan), Planning::Dynamic(planner)) => Self::ExplicitDynamicPlan { plan, planner },
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::DirectReason => StrategyKind::DirectReason,
            Self::StaticPlan(_) => StrategyKind::StaticPlan,
            Self::DynamicPlan(_) => StrategyKind::DynamicPlan,
            Self::ExplicitStaticPlan { .. } => StrategyKind::ExplicitStaticPlan,
            Self::ExplicitDynamicPlan { .. } => StrategyKind::ExplicitDynamicPlan,
        }
    }
}

/// Which [`Strategy`] produced a [`Solution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    DirectReason,
    StaticPlan,
    DynamicPlan,
    ExplicitStaticPlan,
    ExplicitDynamicPlan,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::DirectReason => "direct-reason",
            Self::StaticPlan => "static-plan",
            Self::DynamicPlan => "dynamic-plan",
            Self::ExplicitStaticPlan => "explicit-static-plan",
            Self::ExplicitDynamicPlan => "explicit-dynamic-plan",
        })
    }
}

/// Result of a solve.
#[derive(Debug, Clone)]
pub struct Solution {
    pub answer: String,
    /// The executed plan, with every node's result. `None` for direct reasoning.
    pub plan: Option<Htp>,
    pub strategy: StrategyKind,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct AgentBuilder {
    reasoner: Box<dyn Reasoner>,
    planning: Planning,
    resources: ResourceRegistry,
    knowledge: Knowledge,
    program_space: Option<ProgramSpace>,
}

impl AgentBuilder {
    pub fn new(reasoner: Box<dyn Reasoner>) -> Self {
        Self {
            reasoner,
            planning: Planning::None,
            resources: ResourceRegistry::new(),
            knowledge: Knowledge::new(),
            program_space: None,
        }
    }

    pub fn planning(mut self, planning: Planning) -> Self {
        self.planning = planning;
        self
    }

    /// Use an already populated registry, replacing any resources added so far.
    pub fn resources(mut self, registry: ResourceRegistry) -> Self {
        self.resources = registry;
        self
    }

    pub fn resource(mut self, resource: Box<dyn Resource>) -> Self {
        self.resources.register(resource);
        self
    }

    pub fn knowledge(mut self, piece: impl Into<String>) -> Self {
        self.knowledge.insert(piece.into());
        self
    }

    pub fn program_space(mut self, program_space: ProgramSpace) -> Self {
        self.program_space = Some(program_space);
        self
    }

    pub fn build(self) -> Agent {
        Agent {
            reasoner: self.reasoner,
            planning: self.planning,
            resources: self.resources,
            knowledge: self.knowledge,
            program_space: self.program_space,
        }
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

pub struct Agent {
    reasoner: Box<dyn Reasoner>,
    planning: Planning,
    resources: ResourceRegistry,
    knowledge: Knowledge,
    program_space: Option<ProgramSpace>,
}

impl Agent {
    pub fn builder(reasoner: Box<dyn Reasoner>) -> AgentBuilder {
        AgentBuilder::new(reasoner)
    }

    pub fn add_knowledge(&mut self, piece: impl Into<String>) {
        self.knowledge.insert(piece.into());
    }

    pub fn add_resource(&mut self, resource: Box<dyn Resource>) -> ResourceId {
        self.resources.register(resource)
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn knowledge(&self) -> &Knowledge {
        &self.knowledge
    }

    pub fn planning(&self) -> &Planning {
        &self.planning
    }

    pub fn program_space(&self) -> Option<&ProgramSpace> {
        self.program_space.as_ref()
    }

    pub fn program_space_mut(&mut self) -> Option<&mut ProgramSpace> {
        self.program_space.as_mut()
    }

    fn context(&self) -> SolveContext<'_> {
        SolveContext::new(&self.resources, &self.knowledge)
    }

    /// Solve `problem`, consulting the program catalog first.
    pub fn solve(&self, problem: &str) -> AgentResult<Solution> {
        self.solve_adapted(problem, &HashMap::new())
    }

    /// Like [`solve`](Self::solve); a catalog match has its `{placeholder}`s
    /// filled from `adaptations`.
    pub fn solve_adapted(
        &self,
        problem: &str,
        adaptations: &HashMap<String, String>,
    ) -> AgentResult<Solution> {
        let ctx = self.context();
        let mut found = None;
        if let Some(space) = &self.program_space {
            found = space.find_program(problem, &ctx, adaptations)?;
        }
        // The stored root answered a different problem; only its finished
        // sub-plans carry over.
        if let Some(plan) = found.as_mut() {
            let resources = std::mem::take(&mut plan.task.resources);
            plan.task = Task::new(problem).with_resources(resources);
        }
        self.run(problem, found, &ctx)
    }

    /// Solve `problem` along an expert-authored plan.
    pub fn solve_with_plan(&self, problem: &str, plan: Htp) -> AgentResult<Solution> {
        let ctx = self.context();
        self.run(problem, Some(plan), &ctx)
    }

    /// Solve and return the answer text; failures become `"ERROR: <message>"`.
    pub fn answer(&self, problem: &str) -> String {
        match self.solve(problem) {
            Ok(solution) => solution.answer,
            Err(e) => {
                tracing::warn!(error = %e, "solve failed");
                format!("ERROR: {e}")
            }
        }
    }

    fn run(&self, problem: &str, plan: Option<Htp>, ctx: &SolveContext<'_>) -> AgentResult<Solution> {
        let strategy = Strategy::select(plan, &self.planning);
        let kind = strategy.kind();
        tracing::info!(strategy = %kind, %problem, "solving");

        let (answer, plan) = match strategy {
            Strategy::DirectReason => (self.direct(problem, ctx)?, None),
            Strategy::StaticPlan(planner) => {
                let mut plan = planner.plan(problem, &self.resources.ids(), ctx)?;
                let answer = plan.execute(self.reasoner.as_ref(), ctx, &[])?;
                (answer, Some(plan))
            }
            Strategy::DynamicPlan(planner) => {
                let root = Task::new(problem).with_resources(self.resources.ids());
                let mut plan = Htp::new(root);
                let answer = dynamic::solve_node(self.reasoner.as_ref(), planner, &mut plan, ctx, &[])?;
                (answer, Some(plan))
            }
            Strategy::ExplicitStaticPlan { plan, planner } => {
                let mut plan = self.backfill_resources(plan, problem, planner, ctx)?;
                let answer = plan.execute(self.reasoner.as_ref(), ctx, &[])?;
                (answer, Some(plan))
            }
            Strategy::ExplicitDynamicPlan { plan, planner } => {
                let mut plan = self.backfill_resources(plan, problem, Some(planner), ctx)?;
                let answer = dynamic::solve_node(self.reasoner.as_ref(), planner, &mut plan, ctx, &[])?;
                (answer, Some(plan))
            }
        };

        tracing::info!(strategy = %kind, nodes = plan.as_ref().map_or(1, Htp::node_count), "solved");
        Ok(Solution {
            answer,
            plan,
            strategy: kind,
        })
    }

    fn direct(&self, problem: &str, ctx: &SolveContext<'_>) -> AgentResult<String> {
        let mut task = Task::new(problem).with_resources(self.resources.ids());
        let verdict = self.reasoner.reason(&mut task, ctx, &[])?;
        Ok(verdict.into_text())
    }

    /// Bind resources to a given plan: through the planner when there is one
    /// and resources exist, otherwise by giving the root every resource and
    /// letting sub-plans inherit.
    fn backfill_resources(
        &self,
        mut plan: Htp,
        problem: &str,
        planner: Option<&HtPlanner>,
        ctx: &SolveContext<'_>,
    ) -> AgentResult<Htp> {
        let all = self.resources.ids();
        if let Some(planner) = planner {
            if !all.is_empty() {
                return Ok(planner.update_plan_resources(&plan, problem, &all, ctx)?);
            }
        }
        if plan.task.resources.is_empty() {
            plan.task.resources = all;
        }
        plan.fix_missing_resources();
        Ok(plan)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("reasoner", &self.reasoner.lm().model_name())
            .field("planning", &self.planning)
            .field("resources", &self.resources)
            .field("knowledge", &self.knowledge.len())
            .field("program_space", &self.program_space)
            .finish()
    }
}
