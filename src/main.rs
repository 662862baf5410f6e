use anyhow::{Context, Result};
use argus::config::Config;
use argus::control::ControlPlane;
use argus::flow::Request;
use argus::init::{bootstrap_files, build_engine, setup_logging, spawn_retention_task};
use argus::{audit::retention_cutoff, flow::Verdict};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "argus", version, about = "Domain blocklist filter and traffic audit log")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "ARGUS_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep the filter warm: periodic reload, retention pruning, stats
    Run,

    /// Manage the block list
    Domains {
        #[command(subcommand)]
        command: DomainCommand,
    },

    /// Show or toggle global filtering
    Filtering {
        #[command(subcommand)]
        command: FilteringCommand,
    },

    /// Print a page of audit records, newest first
    Logs {
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Evaluate a URL against the current rules without recording it
    Check { url: String },

    /// Delete audit records older than the retention window
    Prune,
}

#[derive(Subcommand, Debug)]
enum DomainCommand {
    List,
    Add { domain: String },
    Remove { domain: String },
}

#[derive(Subcommand, Debug)]
enum FilteringCommand {
    Status,
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load Config
    let config_exists = cli.config.exists();
    let config = if config_exists {
        Config::load(&cli.config).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    if !config_exists {
        info!("Config file not found, using defaults.");
    }

    match cli.command {
        Command::Run => run(config).await,
        Command::Domains { command } => domains(&config, command),
        Command::Filtering { command } => filtering(&config, command),
        Command::Logs { page, per_page } => {
            let engine = build_engine(&config)?;
            let control = ControlPlane::for_engine(&engine);
            let page = control.logs(page, per_page.unwrap_or(config.audit.page_size))?;
            println!("{}", serde_json::to_string_pretty(&page)?);
            Ok(())
        }
        Command::Check { url } => {
            let engine = build_engine(&config)?;
            let request =
                Request::from_url("GET", &url).with_context(|| format!("Invalid URL: {}", url))?;
            match engine.decide(&request.host) {
                Verdict::Allowed => println!("ALLOWED {}", request.url),
                Verdict::Blocked { rule } => {
                    println!("BLOCKED {} (matched rule '{}')", request.url, rule)
                }
            }
            Ok(())
        }
        Command::Prune => {
            let engine = build_engine(&config)?;
            let removed = engine
                .audit()
                .prune_before(&retention_cutoff(config.audit.retention_hours))?;
            println!("Pruned {} audit records", removed);
            Ok(())
        }
    }
}

fn domains(config: &Config, command: DomainCommand) -> Result<()> {
    let engine = build_engine(config)?;
    let control = ControlPlane::for_engine(&engine);
    match command {
        DomainCommand::List => {
            for domain in control.domains()? {
                println!("{}", domain);
            }
        }
        DomainCommand::Add { domain } => println!("Added {}", control.add_domain(&domain)?),
        DomainCommand::Remove { domain } => println!("Removed {}", control.remove_domain(&domain)?),
    }
    Ok(())
}

fn filtering(config: &Config, command: FilteringCommand) -> Result<()> {
    let engine = build_engine(config)?;
    let control = ControlPlane::for_engine(&engine);
    match command {
        FilteringCommand::Status => {}
        FilteringCommand::On => control.set_filtering(true)?,
        FilteringCommand::Off => control.set_filtering(false)?,
    }
    println!(
        "Filtering is {}",
        if control.filtering_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    info!("Starting argus...");
    bootstrap_files(&config)?;

    let engine = Arc::new(build_engine(&config)?);

    let reload_task = engine.spawn_reload_task(config.reload_interval());
    let retention_task =
        spawn_retention_task(engine.audit().clone(), config.audit.retention_hours);

    let stats_task = config.stats.enable.then(|| {
        let stats = engine.stats().clone();
        let interval = Duration::from_secs(config.stats.log_interval_seconds.max(1));
        tokio::spawn(stats.run_logger(interval))
    });

    signal::ctrl_c().await?;
    info!("Shutdown signal received.");

    reload_task.abort();
    retention_task.abort();
    if let Some(task) = stats_task {
        task.abort();
    }
    engine.stats().dump_stats();

    Ok(())
}
