//! Informational resources and the per-session registry that owns them.
//!
//! A [`Resource`] answers questions from some body of information (a document,
//! a database, a search index). The core never implements resources; it only
//! asks them questions through the registry. Tasks refer to resources by
//! [`ResourceId`], an index into the [`ResourceRegistry`] arena.

pub mod text;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lm::LmError;

pub use text::TextResource;

/// Errors from the resource subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum ResourceError {
    #[error("resource {id} is not registered")]
    #[diagnostic(
        code(htp::resource::not_found),
        help("Resource ids are only valid for the registry that issued them.")
    )]
    NotFound { id: ResourceId },

    #[error("resource \"{resource}\" failed to answer: {message}")]
    #[diagnostic(
        code(htp::resource::answer_failed),
        help("Check that the resource's backing data is readable.")
    )]
    AnswerFailed { resource: String, message: String },

    #[error("failed to read resource file {path}: {message}")]
    #[diagnostic(
        code(htp::resource::read),
        help("Check that the file exists and is valid UTF-8 text.")
    )]
    Read { path: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lm(#[from] LmError),
}

pub type ResourceResult<T> = std::result::Result<T, ResourceError>;

/// Default answer length for resource queries.
pub const DEFAULT_N_WORDS: usize = 1000;

const RESOURCE_OVERVIEW_PROMPT: &str = "\
Considering that your informational resource is named \"{name}\" (if that is helpful or relevant), \
identify the chief ENTITY/ENTITIES of interest, state the main TIME PERIOD(S) of interest, \
and give an overview of the key KINDS of INFO contained in your resource, \
without mentioning specific facts.";

/// An informational resource that can answer questions.
pub trait Resource: Send + Sync {
    /// Globally unique name. Planners refer to resources by this name.
    fn unique_name(&self) -> &str;

    /// Human-friendly, possibly non-unique name.
    fn name(&self) -> &str;

    /// Answer `question` in at most `n_words` words.
    fn answer(&self, question: &str, n_words: usize) -> ResourceResult<String>;

    /// Name used when presenting this resource inside large prompts.
    fn full_name(&self) -> String {
        format!(
            "INFORMATIONAL RESOURCE NAMED \"{}\" (UNIQUELY NAMED \"{}\")",
            self.name(),
            self.unique_name()
        )
    }
}

/// Handle to a resource inside a [`ResourceRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Entry {
    resource: Box<dyn Resource>,
    overview: OnceLock<String>,
}

/// Arena of resources for one solve session.
pub struct ResourceRegistry {
    entries: Vec<Entry>,
    by_name: HashMap<String, ResourceId>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a resource and return its id.
    ///
    /// Registering a second resource under an existing unique name keeps the
    /// first one and returns its id.
    pub fn register(&mut self, resource: Box<dyn Resource>) -> ResourceId {
        if let Some(&id) = self.by_name.get(resource.unique_name()) {
            tracing::warn!(
                name = resource.unique_name(),
                %id,
                "resource already registered, keeping existing entry"
            );
            return id;
        }
        let id = ResourceId(self.entries.len() as u32);
        self.by_name.insert(resource.unique_name().to_string(), id);
        self.entries.push(Entry {
            resource,
            overview: OnceLock::new(),
        });
        id
    }

    /// Look up a resource id by unique name.
    pub fn lookup(&self, unique_name: &str) -> Option<ResourceId> {
        self.by_name.get(unique_name).copied()
    }

    pub fn get(&self, id: ResourceId) -> Option<&dyn Resource> {
        self.entries.get(id.0 as usize).map(|e| e.resource.as_ref())
    }

    pub fn unique_name(&self, id: ResourceId) -> Option<&str> {
        self.get(id).map(|r| r.unique_name())
    }

    /// Every registered id.
    pub fn ids(&self) -> BTreeSet<ResourceId> {
        (0..self.entries.len() as u32).map(ResourceId).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: ResourceId) -> ResourceResult<&Entry> {
        self.entries
            .get(id.0 as usize)
            .ok_or(ResourceError::NotFound { id })
    }

    /// Ask a resource a question.
    pub fn answer(&self, id: ResourceId, question: &str, n_words: usize) -> ResourceResult<String> {
        self.entry(id)?.resource.answer(question, n_words)
    }

    /// The resource's self-description, computed on first use and cached.
    pub fn overview(&self, id: ResourceId) -> ResourceResult<String> {
        let entry = self.entry(id)?;
        if let Some(cached) = entry.overview.get() {
            return Ok(cached.clone());
        }
        let prompt = RESOURCE_OVERVIEW_PROMPT.replace("{name}", entry.resource.name());
        let overview = entry.resource.answer(&prompt, DEFAULT_N_WORDS)?;
        tracing::debug!(resource = entry.resource.unique_name(), "computed resource overview");
        let _ = entry.overview.set(overview.clone());
        Ok(overview)
    }

    /// Overviews keyed by unique name. Unknown ids are skipped.
    pub fn overviews(&self, ids: &BTreeSet<ResourceId>) -> ResourceResult<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for &id in ids {
            let Some(resource) = self.get(id) else {
                tracing::warn!(%id, "skipping unknown resource");
                continue;
            };
            out.insert(resource.unique_name().to_string(), self.overview(id)?);
        }
        Ok(out)
    }

    /// Answer together with the resource's full name and overview, the form
    /// in which resource answers enter reasoning prompts.
    pub fn present_full_answer(
        &self,
        id: ResourceId,
        question: &str,
        n_words: usize,
    ) -> ResourceResult<String> {
        let entry = self.entry(id)?;
        let full_name = entry.resource.full_name();
        let overview = self.overview(id)?;
        let answer = entry.resource.answer(question, n_words)?;
        Ok(format!(
            "{full_name}\n\
             has the following overview:\n\
             ```\n{overview}\n```\n\
             \n\
             {full_name}\n\
             returns the following answer/solution:\n\
             ```\n{answer}\n```\n"
        ))
    }

    /// Map unique names to ids. Names that are not registered are skipped
    /// with a warning.
    pub fn resolve_names<'n, I>(&self, names: I) -> BTreeSet<ResourceId>
    where
        I: IntoIterator<Item = &'n str>,
    {
        names
            .into_iter()
            .filter_map(|name| {
                let id = self.lookup(name);
                if id.is_none() {
                    tracing::warn!(name, "skipping unknown resource name");
                }
                id
            })
            .collect()
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field(
                "resources",
                &self
                    .entries
                    .iter()
                    .map(|e| e.resource.unique_name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Format a word budget the way prompts show it: `1000` becomes `1,000`.
pub(crate) fn words(n_words: usize) -> String {
    let digits = n_words.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
