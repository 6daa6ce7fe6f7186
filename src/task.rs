//! Tasks: the atomic unit of work in a plan.

use std::collections::BTreeSet;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::ResourceId;

#[derive(Debug, Error, Diagnostic)]
pub enum TaskError {
    #[error("invalid task transition: {from} -> {to}")]
    #[diagnostic(
        code(htp::task::invalid_transition),
        help("Task status only moves forward: pending -> needing_decomposition -> decomposed -> done.")
    )]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("task status {status} is inconsistent with its result")]
    #[diagnostic(
        code(htp::task::inconsistent_result),
        help("A task carries a result exactly when its status is done.")
    )]
    InconsistentResult { status: TaskStatus },
}

pub type TaskResult<T> = std::result::Result<T, TaskError>;

/// Lifecycle state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    NeedingDecomposition,
    Decomposed,
    Done,
}

impl TaskStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::NeedingDecomposition => 1,
            Self::Decomposed => 2,
            Self::Done => 3,
        }
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Status only moves forward. `Done -> Done` is allowed so that synthesis
    /// can refine an interior node's direct answer.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        next.rank() > self.rank() || (self == Self::Done && next == Self::Done)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::NeedingDecomposition => "needing_decomposition",
            Self::Decomposed => "decomposed",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A question or problem to answer, with the resources bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub ask: String,
    pub resources: BTreeSet<ResourceId>,
    status: TaskStatus,
    result: Option<String>,
}

impl Task {
    pub fn new(ask: impl Into<String>) -> Self {
        Self {
            ask: ask.into(),
            resources: BTreeSet::new(),
            status: TaskStatus::Pending,
            result: None,
        }
    }

    pub fn with_resources(mut self, resources: BTreeSet<ResourceId>) -> Self {
        self.resources = resources;
        self
    }

    /// Rebuild a task from stored parts, checking that `result` is present
    /// exactly when `status` is done.
    pub fn from_parts(
        ask: impl Into<String>,
        resources: BTreeSet<ResourceId>,
        status: TaskStatus,
        result: Option<String>,
    ) -> TaskResult<Self> {
        if (status == TaskStatus::Done) != result.is_some() {
            return Err(TaskError::InconsistentResult { status });
        }
        Ok(Self {
            ask: ask.into(),
            resources,
            status,
            result,
        })
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    fn transition(&mut self, next: TaskStatus) -> TaskResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record the final result and mark the task done.
    pub fn complete(&mut self, result: impl Into<String>) -> TaskResult<()> {
        self.transition(TaskStatus::Done)?;
        self.result = Some(result.into());
        Ok(())
    }

    pub fn mark_needs_decomposition(&mut self) -> TaskResult<()> {
        self.transition(TaskStatus::NeedingDecomposition)
    }

    pub fn mark_decomposed(&mut self) -> TaskResult<()> {
        self.transition(TaskStatus::Decomposed)
    }
}
