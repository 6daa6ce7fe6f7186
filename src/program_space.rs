//! Catalog of named, pre-built plans.
//!
//! A [`ProgramSpace`] maps a unique name to a description and an [`Htp`].
//! [`ProgramSpace::find_program`] shows the LM every `name: description` pair
//! and asks for the best-fitting name, or `NONE`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::SolveContext;
use crate::htp::wire::HtpDoc;
use crate::htp::{Htp, HtpError};
use crate::lm::{LanguageModel, LmError};
use crate::resource::ResourceRegistry;
use crate::retry::{Attempt, RetryError, RetryPolicy};
use crate::template::fill;

#[derive(Debug, Error, Diagnostic)]
pub enum ProgramSpaceError {
    #[error("program search gave up after {attempts} attempts: {last_reason}")]
    #[diagnostic(
        code(htp::program_space::exhausted),
        help("The LM kept answering with something other than a program name or NONE.")
    )]
    Exhausted { attempts: u32, last_reason: String },

    #[error("failed to read or write program catalog {path}: {message}")]
    #[diagnostic(
        code(htp::program_space::io),
        help("Check that the path exists and is writable.")
    )]
    Io { path: String, message: String },

    #[error("failed to parse program catalog {path}: {message}")]
    #[diagnostic(
        code(htp::program_space::parse),
        help("A catalog is a JSON object of {{\"name\": {{\"description\": ..., \"plan\": <plan>}}}}.")
    )]
    Parse { path: String, message: String },

    #[error("program name {name:?} is reserved")]
    #[diagnostic(
        code(htp::program_space::reserved_name),
        help("NONE is the reply for \"no program fits\"; store the program under another name.")
    )]
    ReservedName { name: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Htp(#[from] HtpError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lm(#[from] LmError),
}

pub type ProgramSpaceResult<T> = std::result::Result<T, ProgramSpaceError>;

/// Reply meaning that no stored program fits.
pub const NO_PROGRAM: &str = "NONE";

const PROGRAM_SEARCH_PROMPT: &str = "
Consider that you are trying to solve the following question/problem/task:

```
{problem}
```

and that you have access to a collection of executable solution programs
summarized by the below name-description pairs:

```json
{program_descriptions}
```

Please return the name of the most appropriate program for solving the stated question/problem/task,
ONLY IF at least one program is deemed applicable/relevant.

Otherwise, if no applicable/relevant programs are found in the collection,
please return the word NONE.
";

/// A stored plan and what it is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub description: String,
    pub plan: Htp,
}

#[derive(Serialize, Deserialize)]
struct ProgramDoc {
    description: String,
    plan: HtpDoc,
}

pub struct ProgramSpace {
    lm: Arc<dyn LanguageModel>,
    programs: BTreeMap<String, Program>,
    pub retry: RetryPolicy,
}

impl ProgramSpace {
    pub fn new(lm: Arc<dyn LanguageModel>) -> Self {
        Self {
            lm,
            programs: BTreeMap::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Insert or replace the program stored under `name`. Names that read
    /// as the `NONE` reply could never be matched and are rejected.
    pub fn add_or_update_program(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        plan: Htp,
    ) -> ProgramSpaceResult<()> {
        let name = name.into();
        if normalize_reply(&name) == NO_PROGRAM {
            return Err(ProgramSpaceError::ReservedName { name });
        }
        tracing::debug!(%name, "storing program");
        self.programs.insert(
            name,
            Program {
                description: description.into(),
                plan,
            },
        );
        Ok(())
    }

    pub fn remove_program(&mut self, name: &str) -> Option<Program> {
        self.programs.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Program> {
        self.programs.get(name)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// `name -> description` for every stored program.
    pub fn descriptions(&self) -> BTreeMap<&str, &str> {
        self.programs
            .iter()
            .map(|(name, p)| (name.as_str(), p.description.as_str()))
            .collect()
    }

    /// Ask the LM which stored program fits `problem`.
    ///
    /// Returns the matching plan with `{placeholder}`s filled from
    /// `adaptations`, or `None` when the catalog is empty or the LM answers
    /// `NONE`.
    pub fn find_program(
        &self,
        problem: &str,
        ctx: &SolveContext<'_>,
        adaptations: &HashMap<String, String>,
    ) -> ProgramSpaceResult<Option<Htp>> {
        if self.programs.is_empty() {
            return Ok(None);
        }

        let descriptions = serde_json::to_string_pretty(&self.descriptions()).unwrap_or_default();
        let prompt = fill(
            PROGRAM_SEARCH_PROMPT,
            &[("program_descriptions", &descriptions), ("problem", problem)],
        );
        let history = ctx.history();

        let name = self
            .retry
            .run("find program", |_| {
                let reply = self.lm.get_response(&prompt, &history)?;
                let name = normalize_reply(&reply);
                Ok::<_, LmError>(if name == NO_PROGRAM || self.programs.contains_key(name) {
                    Attempt::Valid(name.to_string())
                } else {
                    Attempt::invalid(format!("unknown program name {name:?}"))
                })
            })
            .map_err(|e| match e {
                RetryError::Exhausted {
                    attempts,
                    last_reason,
                } => ProgramSpaceError::Exhausted {
                    attempts,
                    last_reason,
                },
                RetryError::Fatal(e) => ProgramSpaceError::Lm(e),
            })?;

        if name == NO_PROGRAM {
            tracing::info!("no stored program fits the problem");
            return Ok(None);
        }
        tracing::info!(program = %name, "matched stored program");
        Ok(self.programs.get(&name).map(|p| p.plan.adapt(adaptations)))
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Load a catalog saved by [`save`](Self::save). Resource names in the
    /// plans are resolved against `registry`.
    pub fn load(
        path: &Path,
        registry: &ResourceRegistry,
        lm: Arc<dyn LanguageModel>,
    ) -> ProgramSpaceResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ProgramSpaceError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let docs: BTreeMap<String, ProgramDoc> =
            serde_json::from_str(&content).map_err(|e| ProgramSpaceError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let mut space = Self::new(lm);
        for (name, doc) in docs {
            let plan = Htp::from_doc(doc.plan, registry)?;
            space.add_or_update_program(name, doc.description, plan)?;
        }
        tracing::info!(path = %path.display(), programs = space.len(), "loaded program catalog");
        Ok(space)
    }

    pub fn save(&self, path: &Path, registry: &ResourceRegistry) -> ProgramSpaceResult<()> {
        let docs: BTreeMap<&str, ProgramDoc> = self
            .programs
            .iter()
            .map(|(name, p)| {
                (
                    name.as_str(),
                    ProgramDoc {
                        description: p.description.clone(),
                        plan: p.plan.to_doc(registry),
                    },
                )
            })
            .collect();
        let content = serde_json::to_string_pretty(&docs).map_err(|e| ProgramSpaceError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ProgramSpaceError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Strip whitespace, quotes and backticks the LM may wrap a name in.
fn normalize_reply(reply: &str) -> &str {
    reply
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim()
}

impl std::fmt::Debug for ProgramSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramSpace")
            .field("programs", &self.programs.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Knowledge;
    use crate::lm::ScriptedLm;
    use crate::resource::tests::EchoResource;
    use std::collections::BTreeSet;

    fn space(lm: &Arc<ScriptedLm>) -> ProgramSpace {
        ProgramSpace::new(lm.clone()).with_retry(RetryPolicy::immediate(3))
    }

    #[test]
    fn empty_catalog_returns_none_without_lm_call() {
        let lm = Arc::new(ScriptedLm::new());
        let registry = ResourceRegistry::new();
        let knowledge = Knowledge::new();
        let ctx = SolveContext::new(&registry, &knowledge);

        let found = space(&lm).find_program("Q", &ctx, &HashMap::new()).unwrap();
        assert!(found.is_none());
        assert_eq!(lm.call_count(), 0);
    }

    #[test]
    fn upsert_replaces_by_name() {
        let lm = Arc::new(ScriptedLm::new());
        let mut ps = space(&lm);
        ps.add_or_update_program("x", "first", Htp::leaf("A")).unwrap();
        ps.add_or_update_program("x", "second", Htp::leaf("B")).unwrap();
        assert_eq!(ps.len(), 1);
        assert_eq!(ps.get("x").unwrap().description, "second");
        assert_eq!(ps.descriptions(), BTreeMap::from([("x", "second")]));
        assert!(ps.remove_program("x").is_some());
        assert!(ps.is_empty());
    }

    #[test]
    fn none_is_not_a_storable_name() {
        let lm = Arc::new(ScriptedLm::new());
        let mut ps = space(&lm);
        for name in ["NONE", " `NONE` "] {
            assert!(matches!(
                ps.add_or_update_program(name, "desc", Htp::leaf("X")),
                Err(ProgramSpaceError::ReservedName { .. })
            ));
        }
        assert!(ps.is_empty());
        ps.add_or_update_program("NONE of the above", "desc", Htp::leaf("X")).unwrap();
        assert_eq!(ps.len(), 1);
    }

    #[test]
    fn descriptions_are_inserted_verbatim() {
        let lm = Arc::new(ScriptedLm::new().with_fallback("NONE"));
        let registry = ResourceRegistry::new();
        let knowledge = Knowledge::new();
        let ctx = SolveContext::new(&registry, &knowledge);

        let mut ps = space(&lm);
        ps.add_or_update_program("x", "Restate {problem} first", Htp::leaf("X")).unwrap();
        assert!(ps.find_program("Is AMD liquid?", &ctx, &HashMap::new()).unwrap().is_none());

        let prompt = &lm.prompts()[0];
        assert!(prompt.contains("\"x\": \"Restate {problem} first\""));
        assert_eq!(prompt.matches("Is AMD liquid?").count(), 1);
    }

    #[test]
    fn matching_description_finds_its_program() {
        // Picks the program whose description is the problem itself.
        let lm = Arc::new(ScriptedLm::new().with_responder(|msgs| {
            let prompt = &msgs[msgs.len() - 1].content;
            if prompt.contains("\"liquidity\": \"Is {company} liquid?\"") && prompt.contains("```\nIs {company} liquid?\n```") {
                "`liquidity`".to_string()
            } else {
                "NONE".to_string()
            }
        }));
        let registry = ResourceRegistry::new();
        let knowledge = Knowledge::new();
        let ctx = SolveContext::new(&registry, &knowledge);

        let mut ps = space(&lm);
        let stored = Htp::leaf("Is {company} liquid?").with_sub_plans(vec![Htp::leaf("Quick ratio of {company}?")]);
        ps.add_or_update_program("liquidity", "Is {company} liquid?", stored.clone()).unwrap();
        ps.add_or_update_program("growth", "Is revenue growing?", Htp::leaf("growth")).unwrap();

        let found = ps
            .find_program("Is {company} liquid?", &ctx, &HashMap::new())
            .unwrap()
            .unwrap();
        assert_eq!(found, stored);

        let adapted = ps
            .find_program(
                "Is {company} liquid?",
                &ctx,
                &HashMap::from([("company".to_string(), "AMD".to_string())]),
            )
            .unwrap()
            .unwrap();
        assert_eq!(adapted.sub_plans[0].task.ask, "Quick ratio of AMD?");

        assert!(ps.find_program("Unrelated", &ctx, &HashMap::new()).unwrap().is_none());
    }

    #[test]
    fn unknown_names_are_retried_then_exhausted() {
        let lm = Arc::new(ScriptedLm::new().with_responses(["maybe x?", "\"x\""]));
        let registry = ResourceRegistry::new();
        let knowledge = Knowledge::new();
        let ctx = SolveContext::new(&registry, &knowledge);

        let mut ps = space(&lm);
        ps.add_or_update_program("x", "desc", Htp::leaf("X")).unwrap();
        assert!(ps.find_program("Q", &ctx, &HashMap::new()).unwrap().is_some());
        assert_eq!(lm.call_count(), 2);

        let lm = Arc::new(ScriptedLm::new().with_fallback("no idea"));
        let mut ps = space(&lm);
        ps.add_or_update_program("x", "desc", Htp::leaf("X")).unwrap();
        assert!(matches!(
            ps.find_program("Q", &ctx, &HashMap::new()),
            Err(ProgramSpaceError::Exhausted { attempts: 3, .. })
        ));
    }

    #[test]
    fn save_and_load_catalog() {
        let lm = Arc::new(ScriptedLm::new());
        let mut registry = ResourceRegistry::new();
        let doc = registry.register(EchoResource::boxed("doc"));

        let mut ps = space(&lm);
        let plan = Htp::leaf("Q").with_sub_plans(vec![Htp::new(
            crate::task::Task::new("Q1").with_resources(BTreeSet::from([doc])),
        )]);
        ps.add_or_update_program("p", "a program", plan.clone()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("programs.json");
        ps.save(&path, &registry).unwrap();

        let loaded = ProgramSpace::load(&path, &registry, lm).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("p").unwrap().plan, plan);
        assert_eq!(loaded.get("p").unwrap().description, "a program");
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let registry = ResourceRegistry::new();
        let missing = ProgramSpace::load(
            Path::new("/nonexistent/programs.json"),
            &registry,
            Arc::new(ScriptedLm::new()),
        );
        assert!(matches!(missing, Err(ProgramSpaceError::Io { .. })));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"p\": 3}").unwrap();
        let bad = ProgramSpace::load(&path, &registry, Arc::new(ScriptedLm::new()));
        assert!(matches!(bad, Err(ProgramSpaceError::Parse { .. })));
    }

    #[test]
    fn reply_normalization() {
        assert_eq!(normalize_reply("  `liquidity`\n"), "liquidity");
        assert_eq!(normalize_reply("\"NONE\""), "NONE");
        assert_eq!(normalize_reply("x"), "x");
    }
}
