//! Crate-level error type.
//!
//! Each subsystem defines its own error enum with miette `#[diagnostic]`
//! derives (codes under `htp::<subsystem>::*`, help text, source chains).
//! [`SolverError`] wraps them all so callers that drive several subsystems
//! can use a single `?`-friendly type.

use miette::Diagnostic;
use thiserror::Error;

use crate::agent::AgentError;
use crate::config::ConfigError;
use crate::htp::HtpError;
use crate::lm::LmError;
use crate::planner::PlanError;
use crate::program_space::ProgramSpaceError;
use crate::reasoner::ReasonError;
use crate::resource::ResourceError;
use crate::task::TaskError;

#[derive(Debug, Error, Diagnostic)]
pub enum SolverError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lm(#[from] LmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Htp(#[from] HtpError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reason(#[from] ReasonError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ProgramSpace(#[from] ProgramSpaceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

pub type SolverResult<T> = std::result::Result<T, SolverError>;
