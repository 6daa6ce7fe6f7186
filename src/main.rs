//! htp CLI: solve problems with hierarchical task plans.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use htp_agent::agent::Agent;
use htp_agent::config::{PlanningMode, ReasonerKind, SolverConfig};
use htp_agent::context::{Knowledge, SolveContext};
use htp_agent::htp::Htp;
use htp_agent::lm::{LanguageModel, OpenAiClient};
use htp_agent::program_space::ProgramSpace;
use htp_agent::resource::{ResourceRegistry, TextResource};

#[derive(Parser)]
#[command(name = "htp", version, about = "Hierarchical task plan problem solver")]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a problem and print the answer.
    Solve {
        problem: String,

        /// Expert plan (HTP JSON) to follow.
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Program catalog (JSON) to search before planning.
        #[arg(long)]
        programs: Option<PathBuf>,

        /// Store the executed plan in the catalog under this name.
        #[arg(long, requires = "programs")]
        save_as: Option<String>,

        /// Text resource as NAME=FILE. Repeatable.
        #[arg(long = "resource", value_parser = parse_resource)]
        resources: Vec<(String, PathBuf)>,

        /// File with a piece of domain knowledge. Repeatable.
        #[arg(long)]
        knowledge: Vec<PathBuf>,

        /// Planning mode, overriding `[agent] mode`.
        #[arg(long)]
        mode: Option<ModeArg>,

        /// Reasoner, overriding `[reasoner] kind`.
        #[arg(long)]
        reasoner: Option<ReasonerArg>,

        /// Print the executed plan outline after the answer.
        #[arg(long)]
        show_plan: bool,
    },

    /// Generate a plan and print it as HTP JSON without executing it.
    Plan {
        problem: String,

        /// Text resource as NAME=FILE. Repeatable.
        #[arg(long = "resource", value_parser = parse_resource)]
        resources: Vec<(String, PathBuf)>,

        /// Maximum plan depth, overriding `[planner] max_depth`.
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Write a config file with every default filled in.
    InitConfig {
        #[arg(default_value = "htp.toml")]
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Direct,
    Static,
    Dynamic,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReasonerArg {
    Base,
    Ooda,
}

fn parse_resource(arg: &str) -> std::result::Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=FILE, got \"{arg}\"")),
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SolverConfig::load(path)?,
        None => SolverConfig::default(),
    };

    match cli.command {
        Commands::Solve {
            problem,
            plan,
            programs,
            save_as,
            resources,
            knowledge,
            mode,
            reasoner,
            show_plan,
        } => {
            if let Some(mode) = mode {
                config.agent.mode = match mode {
                    ModeArg::Direct => PlanningMode::Direct,
                    ModeArg::Static => PlanningMode::Static,
                    ModeArg::Dynamic => PlanningMode::Dynamic,
                };
            }
            if let Some(reasoner) = reasoner {
                config.reasoner.kind = match reasoner {
                    ReasonerArg::Base => ReasonerKind::Base,
                    ReasonerArg::Ooda => ReasonerKind::Ooda,
                };
            }

            let lm: Arc<dyn LanguageModel> = Arc::new(OpenAiClient::new(config.lm.clone()));
            let registry = load_resources(&resources, &lm)?;

            let explicit = match &plan {
                Some(path) => {
                    let content = std::fs::read_to_string(path).into_diagnostic()?;
                    Some(Htp::from_json_str(&content, &registry)?)
                }
                None => None,
            };

            let mut builder = Agent::builder(config.reasoner(lm.clone()))
                .planning(config.planning(lm.clone()));
            for path in &knowledge {
                builder = builder.knowledge(std::fs::read_to_string(path).into_diagnostic()?);
            }
            if let Some(path) = programs.as_deref().filter(|p| p.exists()) {
                let space = ProgramSpace::load(path, &registry, lm.clone())?
                    .with_retry(config.retry_policy());
                builder = builder.program_space(space);
            } else if programs.is_some() {
                builder = builder
                    .program_space(ProgramSpace::new(lm.clone()).with_retry(config.retry_policy()));
            }
            let mut agent = builder.resources(registry).build();

            let solution = match explicit {
                Some(plan) => agent.solve_with_plan(&problem, plan)?,
                None => agent.solve(&problem)?,
            };

            println!("{}", solution.answer);
            if show_plan {
                if let Some(plan) = &solution.plan {
                    eprintln!("\nPlan ({}):\n{}", solution.strategy, plan.outline());
                }
            }

            if let (Some(name), Some(path), Some(plan)) = (save_as, programs, solution.plan) {
                save_program(&mut agent, &name, &problem, plan, &path)?;
            }
        }

        Commands::Plan {
            problem,
            resources,
            max_depth,
        } => {
            if let Some(max_depth) = max_depth {
                config.planner.max_depth = max_depth;
            }
            let lm: Arc<dyn LanguageModel> = Arc::new(OpenAiClient::new(config.lm.clone()));
            let registry = load_resources(&resources, &lm)?;
            let knowledge = Knowledge::new();
            let ctx = SolveContext::new(&registry, &knowledge);

            let plan = config.planner(lm).plan(&problem, &registry.ids(), &ctx)?;
            let json = serde_json::to_string_pretty(&plan.to_json(&registry)).into_diagnostic()?;
            println!("{json}");
        }

        Commands::InitConfig { path } => {
            SolverConfig::default().save(&path)?;
            println!("Wrote default config to {}", path.display());
        }
    }

    Ok(())
}

fn load_resources(
    specs: &[(String, PathBuf)],
    lm: &Arc<dyn LanguageModel>,
) -> Result<ResourceRegistry> {
    let mut registry = ResourceRegistry::new();
    for (name, path) in specs {
        let resource = TextResource::from_file(name.clone(), path, lm.clone())?;
        registry.register(Box::new(resource));
    }
    Ok(registry)
}

fn save_program(agent: &mut Agent, name: &str, problem: &str, plan: Htp, path: &Path) -> Result<()> {
    if let Some(space) = agent.program_space_mut() {
        space.add_or_update_program(name, problem, plan)?;
    }
    if let Some(space) = agent.program_space() {
        space.save(path, agent.resources())?;
        eprintln!("Saved program \"{name}\" to {}", path.display());
    }
    Ok(())
}
