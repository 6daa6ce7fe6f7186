// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # htp-agent
//!
//! Recursive problem solving with Hierarchical Task Plans (HTPs).
//!
//! A problem becomes the root [`Task`](task::Task) of a tree; children are
//! sub-questions whose answers are synthesized bottom-up by a language model.
//!
//! ## Architecture
//!
//! - **Language models** (`lm`): the [`LanguageModel`](lm::LanguageModel) trait,
//!   an OpenAI-compatible client, and a scripted model for tests
//! - **Resources** (`resource`): informational sources behind an id arena
//! - **Plans** (`htp`): the tree, its JSON wire format, execution and synthesis
//! - **Planner** (`planner`): LM-generated plans and resource binding
//! - **Reasoners** (`reasoner`): base consolidation and confidence-gated OODA
//! - **Program space** (`program_space`): a catalog of reusable expert plans
//! - **Agent** (`agent`): strategy dispatch, including depth-bounded dynamic solving
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use htp_agent::agent::{Agent, Planning};
//! use htp_agent::lm::{OpenAiClient, OpenAiConfig};
//! use htp_agent::planner::HtPlanner;
//! use htp_agent::reasoner::OodaReasoner;
//!
//! let lm = Arc::new(OpenAiClient::new(OpenAiConfig::default()));
//! let agent = Agent::builder(Box::new(OodaReasoner::new(lm.clone())))
//!     .planning(Planning::Dynamic(HtPlanner::new(lm)))
//!     .knowledge("Amounts are in USD millions.")
//!     .build();
//! println!("{}", agent.answer("Is the company's quick ratio healthy?"));
//! ```

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod htp;
pub mod lm;
pub mod planner;
pub mod program_space;
pub mod reasoner;
pub mod resource;
pub mod retry;
pub mod task;

mod template;
