//! Command line entry point: environment server, benchmark runs, suite info.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mobench_client::{Env, EnvClient, HttpToolBackend, McpEnvClient, ToolClient};
use mobench_controller::AdbController;
use mobench_core::SuiteFamily;
use mobench_runner::{run_suite, Agent, ReplayAgent, RunnerConfig};
use mobench_server::{create_router, AppState};
use mobench_tasks::TaskRegistry;

/// Mobile agent benchmark toolkit.
#[derive(Parser)]
#[command(name = "mobench", about = "Benchmark runner for mobile GUI agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the environment server
    Serve {
        /// Bind host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Bind port
        #[arg(long, default_value = "8000")]
        port: u16,

        /// Suite family to serve
        #[arg(long, default_value = "mobile_world")]
        suite_family: String,

        /// Device serials to attach (repeatable)
        #[arg(long = "device", required = true)]
        devices: Vec<String>,

        /// Path to the adb binary
        #[arg(long, default_value = "adb")]
        adb_path: String,
    },

    /// Run a benchmark against a server
    Run {
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        url: String,

        /// Device serials to run on (repeatable)
        #[arg(long = "device", required = true)]
        devices: Vec<String>,

        /// Task names to run; all registered tasks when omitted
        #[arg(long = "task")]
        tasks: Vec<String>,

        /// Maximum actions per episode
        #[arg(long, default_value = "15")]
        max_steps: u32,

        /// Tool server endpoint; enables mcp actions
        #[arg(long)]
        tool_server: Option<String>,

        /// Recorded action trace to replay (JSONL, one action per line)
        #[arg(long)]
        replay: PathBuf,
    },

    /// Show suite statistics
    Info {
        /// Suite family to inspect
        #[arg(long, default_value = "mobile_world")]
        suite_family: String,

        /// Only count tasks carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },

    /// Check server health
    Health {
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mobench=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            suite_family,
            devices,
            adb_path,
        } => serve(host, port, suite_family, devices, adb_path).await,
        Commands::Run {
            url,
            devices,
            tasks,
            max_steps,
            tool_server,
            replay,
        } => run(url, devices, tasks, max_steps, tool_server, replay).await,
        Commands::Info { suite_family, tag } => info_command(suite_family, tag),
        Commands::Health { url } => health(url).await,
    }
}

async fn serve(
    host: String,
    port: u16,
    suite_family: String,
    devices: Vec<String>,
    adb_path: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let family: SuiteFamily = suite_family.parse()?;
    let state = AppState::new(family)?;

    for device in &devices {
        let controller =
            AdbController::connect(&adb_path, device, Duration::from_secs(30)).await?;
        state.register_device(Arc::new(controller)).await;
        info!(device = %device, "Device attached");
    }

    let router = create_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, suite_family = %family, "Environment server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn run(
    url: String,
    devices: Vec<String>,
    tasks: Vec<String>,
    max_steps: u32,
    tool_server: Option<String>,
    replay: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let mcp_enabled = tool_server.is_some();

    let mut envs: Vec<Box<dyn Env>> = Vec::new();
    for device in &devices {
        let client = EnvClient::new(&url, device)?.with_mcp_enabled(mcp_enabled);
        client.bind().await?;
        match &tool_server {
            Some(endpoint) => {
                let backend = HttpToolBackend::new(endpoint)?;
                envs.push(Box::new(McpEnvClient::new(client, ToolClient::new(backend))));
            }
            None => envs.push(Box::new(client)),
        }
    }

    let task_names = if tasks.is_empty() {
        envs[0]
            .task_list()
            .await?
            .into_iter()
            .map(|descriptor| descriptor.name)
            .collect()
    } else {
        tasks
    };

    let template = ReplayAgent::from_jsonl(&replay)?;
    let make_agent = move || Box::new(template.clone()) as Box<dyn Agent>;

    let config = RunnerConfig {
        max_steps,
        ..RunnerConfig::default()
    };
    let report = run_suite(envs, make_agent, &task_names, config).await;

    for record in &report.records {
        let reason = record.reason.as_deref().unwrap_or("-");
        println!(
            "{:<40} score={:.2} steps={:<3} {}",
            record.task_name, record.score, record.steps, reason
        );
    }
    println!(
        "\nrun {}: {}/{} passed, mean score {:.3}",
        report.run_id,
        report.passed(),
        report.total(),
        report.mean_score()
    );
    Ok(())
}

fn info_command(
    suite_family: String,
    tag: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let family: SuiteFamily = suite_family.parse()?;
    let registry = TaskRegistry::discover(family)?;

    let descriptors: Vec<_> = registry
        .descriptors()
        .filter(|d| tag.as_deref().map_or(true, |t| d.has_tag(t)))
        .collect();
    let cross_app = descriptors.iter().filter(|d| d.is_cross_app()).count();
    let with_tools = descriptors
        .iter()
        .filter(|d| d.has_tag("agent-mcp"))
        .count();

    println!("suite family: {family}");
    println!("tasks:        {}", descriptors.len());
    println!("cross-app:    {cross_app}");
    println!("tool-using:   {with_tools}");
    println!();
    for descriptor in descriptors {
        println!("{:<40} {}", descriptor.name, descriptor.goal);
    }
    Ok(())
}

async fn health(url: String) -> Result<(), Box<dyn std::error::Error>> {
    let client = EnvClient::new(&url, "health-probe")?;
    let ok = client.health().await?;
    println!("{}", if ok { "ok" } else { "unhealthy" });
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
