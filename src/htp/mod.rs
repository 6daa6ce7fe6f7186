//! Hierarchical Task Plans.
//!
//! An [`Htp`] pairs a [`Task`] with an ordered list of sub-plans. Execution
//! (see [`Htp::execute`]) resolves the node directly, then each sub-plan in
//! order, then synthesizes the node's final answer from all of them.

mod execute;
pub(crate) mod prompts;
pub mod wire;

use std::collections::{BTreeSet, HashMap};

use miette::Diagnostic;
use thiserror::Error;

use crate::lm::LmError;
use crate::reasoner::ReasonError;
use crate::resource::{ResourceId, ResourceRegistry};
use crate::task::{Task, TaskError};
use crate::template;

pub(crate) use execute::{run_sub_plans, synthesize};
use wire::{HtpDoc, TaskDoc, TaskSpec};

#[derive(Debug, Error, Diagnostic)]
pub enum HtpError {
    #[error("not a hierarchical task plan: {message}")]
    #[diagnostic(
        code(htp::plan::schema),
        help("A plan is a JSON object with a \"task\" (string or {{\"ask\": ...}}) and optional \"sub-plans\".")
    )]
    Schema { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reason(#[from] ReasonError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lm(#[from] LmError),
}

pub type HtpResult<T> = std::result::Result<T, HtpError>;

/// A node of a hierarchical task plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Htp {
    pub task: Task,
    pub sub_plans: Vec<Htp>,
}

impl Htp {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            sub_plans: Vec::new(),
        }
    }

    /// A single-node plan for `ask`.
    pub fn leaf(ask: impl Into<String>) -> Self {
        Self::new(Task::new(ask))
    }

    pub fn with_sub_plans(mut self, sub_plans: Vec<Htp>) -> Self {
        self.sub_plans = sub_plans;
        self
    }

    // -----------------------------------------------------------------------
    // JSON
    // -----------------------------------------------------------------------

    /// Build a plan from its JSON form, resolving resource names against
    /// `registry`. Unknown names are skipped.
    pub fn from_json(value: &serde_json::Value, registry: &ResourceRegistry) -> HtpResult<Self> {
        let doc: HtpDoc =
            serde_json::from_value(value.clone()).map_err(|e| HtpError::Schema {
                message: e.to_string(),
            })?;
        Self::from_doc(doc, registry)
    }

    pub fn from_json_str(json: &str, registry: &ResourceRegistry) -> HtpResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json).map_err(|e| HtpError::Schema {
            message: e.to_string(),
        })?;
        Self::from_json(&value, registry)
    }

    pub(crate) fn from_doc(doc: HtpDoc, registry: &ResourceRegistry) -> HtpResult<Self> {
        let resources = registry.resolve_names(doc.task.resource_names());
        let task = match doc.task {
            TaskDoc::Ask(ask) => Task::new(ask).with_resources(resources),
            TaskDoc::Spec(spec) => Task::from_parts(spec.ask, resources, spec.status, spec.result)?,
        };
        let sub_plans = doc
            .sub_plans
            .into_iter()
            .map(|sub| Self::from_doc(sub, registry))
            .collect::<HtpResult<Vec<_>>>()?;
        Ok(Self { task, sub_plans })
    }

    /// JSON form of the plan. Tasks without resources carry an open
    /// `"resource": null` slot.
    pub fn to_json(&self, registry: &ResourceRegistry) -> serde_json::Value {
        serde_json::to_value(self.to_doc(registry)).unwrap_or(serde_json::Value::Null)
    }

    pub(crate) fn to_doc(&self, registry: &ResourceRegistry) -> HtpDoc {
        let resources: Vec<String> = self
            .task
            .resources
            .iter()
            .filter_map(|&id| registry.unique_name(id).map(str::to_string))
            .collect();
        let resource = resources.is_empty().then_some(None);
        HtpDoc {
            task: TaskDoc::Spec(TaskSpec {
                ask: self.task.ask.clone(),
                resources,
                resource,
                status: self.task.status(),
                result: self.task.result().map(str::to_string),
            }),
            sub_plans: self.sub_plans.iter().map(|p| p.to_doc(registry)).collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Tree operations
    // -----------------------------------------------------------------------

    /// Give every sub-plan without resources its parent's resource set,
    /// top-down.
    pub fn fix_missing_resources(&mut self) {
        let parent = &self.task.resources;
        for sub in &mut self.sub_plans {
            if sub.task.resources.is_empty() {
                sub.task.resources = parent.clone();
            }
            sub.fix_missing_resources();
        }
    }

    /// Copy of the plan with `{name}` placeholders in every ask replaced
    /// from `params`. Unknown placeholders are left as they are.
    pub fn adapt(&self, params: &HashMap<String, String>) -> Htp {
        let mut adapted = self.clone();
        adapted.adapt_in_place(params);
        adapted
    }

    fn adapt_in_place(&mut self, params: &HashMap<String, String>) {
        if params.is_empty() {
            return;
        }
        self.task.ask =
            template::fill_with(&self.task.ask, |name| params.get(name).map(String::as_str));
        for sub in &mut self.sub_plans {
            sub.adapt_in_place(params);
        }
    }

    /// Number of levels below this node. A leaf has depth 0.
    pub fn depth(&self) -> usize {
        self.sub_plans
            .iter()
            .map(|p| p.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        1 + self.sub_plans.iter().map(Htp::node_count).sum::<usize>()
    }

    /// Drop every node more than `max_depth` levels below this one.
    pub fn truncate_depth(&mut self, max_depth: usize) {
        if max_depth == 0 {
            self.sub_plans.clear();
            return;
        }
        for sub in &mut self.sub_plans {
            sub.truncate_depth(max_depth - 1);
        }
    }

    /// Every resource id referenced anywhere in the tree.
    pub fn all_resources(&self) -> BTreeSet<ResourceId> {
        let mut out = self.task.resources.clone();
        for sub in &self.sub_plans {
            out.extend(sub.all_resources());
        }
        out
    }

    /// Copy finished results from `other` wherever both trees pose the same
    /// ask at the same position.
    pub fn carry_progress_from(&mut self, other: &Htp) {
        if self.task.ask != other.task.ask {
            return;
        }
        if other.task.is_done() && !self.task.is_done() {
            if let Some(result) = other.task.result() {
                let _ = self.task.complete(result);
            }
        }
        if self.sub_plans.len() == other.sub_plans.len() {
            for (mine, theirs) in self.sub_plans.iter_mut().zip(&other.sub_plans) {
                mine.carry_progress_from(theirs);
            }
        }
    }

    /// Indented outline of the tree, one ask per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(&mut out, 0);
        out
    }

    fn write_outline(&self, out: &mut String, level: usize) {
        out.push_str(&"  ".repeat(level));
        out.push_str("- ");
        out.push_str(&self.task.ask);
        if !self.task.resources.is_empty() {
            let ids: Vec<String> = self.task.resources.iter().map(|id| id.to_string()).collect();
            out.push_str(&format!(" [resources: {}]", ids.join(", ")));
        }
        if self.task.is_done() {
            out.push_str(" (done)");
        }
        out.push('\n');
        for sub in &self.sub_plans {
            sub.write_outline(out, level + 1);
        }
    }
}

impl std::fmt::Display for Htp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.outline().trim_end())
    }
}
