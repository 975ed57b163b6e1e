//! Plan-and-execute agent CLI.
//!
//! `agent plan` asks the model for a plan and prints it. `agent run` also
//! executes every step, printing the progress report as steps settle.

use std::path::{Path, PathBuf};

use agent::agents::executor::{ExecutionLoop, LoopSettings};
use agent::agents::planner::PlanningAgent;
use agent::cancel::CancelToken;
use agent::core::report::format_plan;
use agent::core::types::StepState;
use agent::exit_codes;
use agent::io::code::runner_from_config;
use agent::io::config::{AgentConfig, DEFAULT_CONFIG_PATH, load_config, write_config};
use agent::io::deepseek::DeepSeekGateway;
use agent::logging;
use agent::scheduler::execute_plan;
use anyhow::Context;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agent", version, about = "Plan a task with an LLM and execute it step by step")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Tracing filter used when `RUST_LOG` is unset (overrides the config).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Create a plan for TASK and print it.
    Plan { task: String },
    /// Create a plan for TASK and execute every step.
    Run { task: String },
}

/// Error paired with the exit code it maps to.
type CliResult = Result<(), (i32, anyhow::Error)>;

fn invalid(err: anyhow::Error) -> (i32, anyhow::Error) {
    (exit_codes::INVALID, err)
}

fn main() {
    let cli = Cli::parse();
    if let Err((code, err)) = run(cli) {
        eprintln!("{err:#}");
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> CliResult {
    if let Command::Init { force } = cli.command {
        return cmd_init(&cli.config, force).map_err(invalid);
    }

    let cfg = load_config(&cli.config).map_err(invalid)?;
    logging::init(cli.log_level.as_deref().unwrap_or(&cfg.log_level));

    match cli.command {
        Command::Init { .. } => Ok(()),
        Command::Plan { task } => cmd_plan(&cfg, &task),
        Command::Run { task } => cmd_run(&cfg, &task),
    }
}

fn cmd_init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        println!("{} already exists (use --force to overwrite)", path.display());
        return Ok(());
    }
    write_config(path, &AgentConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

fn cmd_plan(cfg: &AgentConfig, task: &str) -> CliResult {
    let gateway = DeepSeekGateway::new(cfg.llm.clone());
    let plan = PlanningAgent::new()
        .create_plan(&gateway, task, &CancelToken::new())
        .map_err(|err| (exit_codes::PLAN_CREATION_FAILED, err))?;
    print!("{}", format_plan(&plan));
    Ok(())
}

fn cmd_run(cfg: &AgentConfig, task: &str) -> CliResult {
    let gateway = DeepSeekGateway::new(cfg.llm.clone());
    let cancel = CancelToken::new();
    let mut plan = PlanningAgent::new()
        .create_plan(&gateway, task, &cancel)
        .map_err(|err| (exit_codes::PLAN_CREATION_FAILED, err))?;
    print!("{}", format_plan(&plan));

    let mut exec = ExecutionLoop::new(
        &gateway,
        runner_from_config(&cfg.code),
        LoopSettings::from_config(cfg),
    );
    let result = execute_plan(&mut plan, &mut exec, &cancel, |plan, outcome| {
        println!();
        println!(
            "Step {} {}: {}",
            outcome.index,
            outcome.state,
            outcome.result.lines().next().unwrap_or_default()
        );
        print!("{}", format_plan(plan));
    });
    drop(exec);

    println!();
    println!(
        "Finished plan {}: {} completed, {} blocked, {} total",
        plan.id,
        plan.count(StepState::Completed),
        plan.count(StepState::Blocked),
        plan.steps.len()
    );
    result.map_err(|err| (exit_codes::EXECUTION_HALTED, err))
}
