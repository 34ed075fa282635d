//! guardhouse - CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use guardhouse::{
    agent::{AgentLoop, LoopSettings},
    cli::{Args, Commands, Verbosity},
    config::Config,
    engine::AnthropicEngine,
    logging,
    session::{
        Assistant, ConversationStore, InMemoryConversationStore, JsonFileConversationStore,
    },
    telemetry::TelemetryCollector,
    tools::{PathIntent, ToolCall, ToolExecutor},
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    let verbosity = args.verbosity();
    logging::init(verbosity.log_filter().unwrap_or(config.logging.filter.as_str()));

    match &args.command {
        Commands::Chat {
            message,
            user,
            ephemeral,
        } => run_chat(&args, &config, message, user, *ephemeral).await?,
        Commands::Tools { json } => show_tools(&args, &config, *json)?,
        Commands::Exec { tool, args: raw } => run_exec(&args, &config, tool, raw).await?,
        Commands::CheckPath { path, write } => check_path(&args, &config, path, *write)?,
        Commands::CheckCommand { command } => check_command(&args, &config, command)?,
        Commands::History { user, limit, clear } => show_history(user, *limit, *clear).await?,
        Commands::Config => show_config(&args, &config)?,
    }

    Ok(())
}

fn build_executor(args: &Args, config: &Config) -> Result<ToolExecutor> {
    ToolExecutor::from_config(config, args.root.as_deref()).context("Failed to set up tool sandbox")
}

async fn run_chat(
    args: &Args,
    config: &Config,
    message: &str,
    user: &str,
    ephemeral: bool,
) -> Result<()> {
    let verbosity = args.verbosity();
    let executor = Arc::new(build_executor(args, config)?);
    let engine = Arc::new(
        AnthropicEngine::from_config(&config.engine).context("Failed to create engine client")?,
    );
    let telemetry = TelemetryCollector::new();

    let agent = AgentLoop::new(engine, executor, LoopSettings::from_config(config))
        .with_telemetry(telemetry.clone());

    let store: Arc<dyn ConversationStore> = if ephemeral {
        Arc::new(InMemoryConversationStore::new())
    } else {
        Arc::new(JsonFileConversationStore::new(
            JsonFileConversationStore::default_dir(),
        )?)
    };

    let assistant =
        Assistant::new(Arc::new(agent), store).with_history_limit(config.agent.history_limit);

    let reply = assistant.chat(user, message).await?;

    if reply.degraded && verbosity != Verbosity::Quiet {
        eprintln!("{}", "engine unavailable, answered in offline mode".yellow());
    }
    println!("{}", reply.text);

    if verbosity.show_events() {
        if let Some(outcome) = &reply.outcome {
            eprintln!();
            for result in &outcome.tool_results {
                let marker = if result.success {
                    "ok".green()
                } else {
                    "failed".red()
                };
                eprintln!("  {} {} ({} ms)", marker, result.tool, result.duration_ms);
            }
        }
        eprintln!("\n{}", telemetry.summary());
    }

    Ok(())
}

fn show_tools(args: &Args, config: &Config, json: bool) -> Result<()> {
    let executor = build_executor(args, config)?;
    let manifest = executor.registry().manifest();

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    for schema in &manifest {
        let access = if schema.read_only {
            "read-only".green()
        } else {
            "mutating".yellow()
        };
        println!("{} [{}]", schema.name.bold(), access);
        println!("  {}", schema.description);
        for (name, description) in schema.parameter_list() {
            println!("    {} {}", format!("{}:", name).cyan(), description);
        }
    }
    Ok(())
}

async fn run_exec(args: &Args, config: &Config, tool: &str, raw: &str) -> Result<()> {
    let executor = build_executor(args, config)?;
    let arguments: serde_json::Value =
        serde_json::from_str(raw).context("Tool arguments must be valid JSON")?;

    let result = executor
        .execute(&ToolCall::new("cli", tool, arguments))
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn check_path(args: &Args, config: &Config, path: &str, write: bool) -> Result<()> {
    let executor = build_executor(args, config)?;
    let intent = if write {
        PathIntent::Write
    } else {
        PathIntent::Read
    };

    match executor.path_guard().authorize(path, intent) {
        Ok(resolved) => {
            println!("{} {:?} {}", "allowed".green().bold(), intent, resolved.display());
            Ok(())
        }
        Err(denial) => {
            println!("{} {:?} {}", "denied".red().bold(), intent, denial);
            std::process::exit(1);
        }
    }
}

fn check_command(args: &Args, config: &Config, command: &str) -> Result<()> {
    let executor = build_executor(args, config)?;

    match executor.command_guard().authorize(command) {
        Ok(()) => {
            println!("{} {}", "allowed".green().bold(), command);
            Ok(())
        }
        Err(denial) => {
            println!("{} {}", "denied".red().bold(), denial);
            std::process::exit(1);
        }
    }
}

async fn show_history(user: &str, limit: usize, clear: bool) -> Result<()> {
    let store = JsonFileConversationStore::new(JsonFileConversationStore::default_dir())?;

    if clear {
        store.clear(user).await?;
        println!("Cleared history for {}", user.bold());
        return Ok(());
    }

    let turns = store.history(user, limit).await?;
    if turns.is_empty() {
        println!("No history for {}.", user);
        return Ok(());
    }

    for turn in turns {
        println!(
            "{} {}",
            turn.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            turn.user.cyan()
        );
        println!("  {}\n", turn.assistant);
    }
    Ok(())
}

fn show_config(args: &Args, config: &Config) -> Result<()> {
    println!("{}", "guardhouse configuration".bold());
    match &args.config {
        Some(path) => println!("  file: {}", path.display()),
        None => match Config::default_path() {
            Some(path) if path.exists() => println!("  file: {}", path.display()),
            _ => println!("  file: (built-in defaults)"),
        },
    }
    println!(
        "  root: {}",
        config.sandbox_root(args.root.as_deref()).display()
    );
    println!("  verbosity: {}\n", args.verbosity().as_str());

    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}
