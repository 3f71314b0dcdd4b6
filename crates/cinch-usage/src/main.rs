//! Inspect and tune tool usage for a cinch-rs agent.
//!
//! Reads the store and usage log from `.agents/tools/` unless `--store` /
//! `--log` (or `CINCH_USAGE_STORE` / `CINCH_USAGE_LOG`) point elsewhere.
//!
//! # Examples
//!
//! ```sh
//! # Status report as JSON
//! cinch-usage status
//!
//! # Record a failed 120 ms call
//! cinch-usage record webfetch 120 0
//!
//! # Disable idle tools, re-enable popular ones if too few remain
//! cinch-usage optimize
//!
//! # Drop image tools for a text-only model
//! cinch-usage configure gemini-3-flash
//!
//! # Rewrite an MCP config from current decisions
//! cinch-usage mcp-config --base .mcp.json
//!
//! # Interactive mode
//! cinch-usage
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use cinch_usage::config::MAX_IDLE_DAYS;
use cinch_usage::{RegistryConfig, RegistryResult, ToolRegistry, mcp_config};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding a tracing filter, e.g. `cinch_usage=debug`.
const LOG_LEVEL_ENV: &str = "CINCH_USAGE_LOG_LEVEL";

/// Inspect and tune tool usage for a cinch-rs agent.
#[derive(Parser)]
#[command(name = "cinch-usage")]
struct Cli {
    /// Backing store path (default: .agents/tools/usage-config.json)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Usage event log path (default: .agents/tools/usage-log.json)
    #[arg(long)]
    log: Option<PathBuf>,

    /// Days without use before an active tool counts as idle
    #[arg(long, value_parser = clap::value_parser!(i64).range(0..=MAX_IDLE_DAYS))]
    idle_days: Option<i64>,

    /// Use count below which a tool counts as under-used
    #[arg(long)]
    usage_threshold: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Command to run. Without one, starts interactive mode.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Print the status report
    Status,
    /// Run automatic optimization and print what changed
    Optimize,
    /// Record one tool use and save
    Record {
        tool: String,
        /// Duration in milliseconds
        duration: Option<f64>,
        /// "0" or "false" records a failure
        success: Option<String>,
    },
    /// Disable a tool
    Disable { tool: String },
    /// Enable a tool
    Enable { tool: String },
    /// Adjust tools for a model and print what changed
    Configure { model: String },
    /// Print tool names ranked by priority and use
    Active {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print one tool's statistics
    Show { tool: String },
    /// Print an MCP server config with registry decisions applied
    McpConfig {
        /// Base MCP config to rewrite
        #[arg(long)]
        base: Option<PathBuf>,
    },
}

/// One line of interactive input.
#[derive(Parser)]
#[command(name = "cinch-usage", no_binary_name = true)]
struct ReplLine {
    #[command(subcommand)]
    command: Command,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let registry = ToolRegistry::load(build_config(&cli));

    let result = match cli.command {
        Some(command) => run(&registry, command),
        None => {
            interactive(&registry);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .init();
}

fn build_config(cli: &Cli) -> RegistryConfig {
    let mut config = RegistryConfig::from_env();
    if let Some(ref path) = cli.store {
        config.store_path = path.clone();
    }
    if let Some(ref path) = cli.log {
        config.usage_log_path = path.clone();
    }
    if let Some(days) = cli.idle_days {
        config = config.with_idle_days(days);
    }
    if let Some(count) = cli.usage_threshold {
        config = config.with_usage_threshold(count);
    }
    config
}

fn run(registry: &ToolRegistry, command: Command) -> RegistryResult<()> {
    match command {
        Command::Status => print_json(&registry.get_status_report())?,
        Command::Optimize => print_json(&registry.auto_optimize()?)?,
        Command::Record {
            tool,
            duration,
            success,
        } => {
            let success = success.as_deref().is_none_or(parse_success);
            registry.record_usage(&tool, duration.unwrap_or(0.0), success);
            registry.save()?;
            println!("Recorded use of: {tool}");
        }
        Command::Disable { tool } => {
            if registry.disable_tool(&tool)? {
                println!("Tool disabled: {tool}");
            } else {
                println!("Tool not found: {tool}");
            }
        }
        Command::Enable { tool } => {
            if registry.enable_tool(&tool)? {
                println!("Tool enabled: {tool}");
            } else {
                println!("Tool not found: {tool}");
            }
        }
        Command::Configure { model } => print_json(&registry.optimize_for_model(&model)?)?,
        Command::Active { limit } => {
            for name in registry.get_active_tools(limit) {
                println!("{name}");
            }
        }
        Command::Show { tool } => match registry.tool(&tool) {
            Some(stat) => {
                let mut value = serde_json::to_value(&stat)?;
                if let Some(obj) = value.as_object_mut() {
                    obj.insert(
                        "average_duration_ms".into(),
                        serde_json::json!(stat.average_duration_ms()),
                    );
                }
                print_json(&value)?;
            }
            None => println!("Tool not found: {tool}"),
        },
        Command::McpConfig { base } => {
            print_json(&mcp_config::generate(registry, base.as_deref())?)?;
        }
    }
    Ok(())
}

/// Read commands from stdin until `exit`, `quit`, or EOF.
fn interactive(registry: &ToolRegistry) {
    println!("cinch-usage interactive mode");
    println!("Commands: status, optimize, record, disable, enable, configure, active, show, mcp-config, quit");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush().ok();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("error: failed to read input: {e}");
                break;
            }
            None => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        match ReplLine::try_parse_from(line.split_whitespace()) {
            Ok(parsed) => {
                if let Err(e) = run(registry, parsed.command) {
                    eprintln!("error: {e}");
                }
            }
            Err(e) => {
                e.print().ok();
            }
        }
    }
}

/// Anything but `0` or `false` counts as success.
fn parse_success(raw: &str) -> bool {
    !matches!(raw.trim().to_ascii_lowercase().as_str(), "0" | "false")
}

fn print_json<T: Serialize>(value: &T) -> RegistryResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
