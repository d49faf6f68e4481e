use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lbstress_builder::FlowCatalog;
use lbstress_client::HttpClient;
use lbstress_config::Config;
use lbstress_runtime::{Runtime, RuntimeConfig, TracingNotifier, compile};
use lbstress_task::ProvisioningExecutor;

/// lbstress - drive load against a load-balancer provisioning API
#[derive(Parser)]
#[command(name = "lbstress")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the configuration file (TOML or JSON)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Enable debug logging
  #[arg(long, short, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a flow and run it against the configured endpoints
  Run {
    /// Flow builder to use instead of `test_params.test_flow`
    #[arg(long)]
    test_flow: Option<String>,

    /// Worker count instead of `engine.max_workers`
    #[arg(long)]
    max_workers: Option<usize>,
  },

  /// Build and compile a flow without making any remote calls
  Plan {
    /// Flow builder to use instead of `test_params.test_flow`
    #[arg(long)]
    test_flow: Option<String>,

    /// Print the flow graph as JSON
    #[arg(long)]
    json: bool,
  },

  /// List the registered flow builders
  Flows,
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match cli.command {
    Some(Commands::Run {
      test_flow,
      max_workers,
    }) => {
      let config = load_config(cli.config.as_ref(), test_flow, max_workers)?;
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run_flow(config).await })?;
    }
    Some(Commands::Plan { test_flow, json }) => {
      let config = load_config(cli.config.as_ref(), test_flow, None)?;
      show_plan(&config, json)?;
    }
    Some(Commands::Flows) => {
      for name in FlowCatalog::standard().names() {
        println!("{name}");
      }
    }
    None => {
      println!("lbstress - use --help to see available commands");
    }
  }

  Ok(())
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
    .with_writer(std::io::stderr)
    .init();
}

fn load_config(
  path: Option<&PathBuf>,
  test_flow: Option<String>,
  max_workers: Option<usize>,
) -> Result<Config> {
  let path = path.context("--config <file> is required")?;
  let mut config = Config::load(path)
    .with_context(|| format!("failed to load config file: {}", path.display()))?;

  if let Some(test_flow) = test_flow {
    config.test_params.test_flow = test_flow;
  }
  if let Some(max_workers) = max_workers {
    config.engine.max_workers = max_workers;
  }
  config.validate().context("invalid configuration")?;

  Ok(config)
}

fn show_plan(config: &Config, json: bool) -> Result<()> {
  let builder = FlowCatalog::standard().get(&config.test_params.test_flow)?;
  let flow = builder.build(&config.test_params);
  let plan = compile(&flow).context("failed to compile flow")?;

  if json {
    println!("{}", serde_json::to_string_pretty(&flow)?);
  } else {
    print!("{plan}");
  }
  eprintln!(
    "{} nodes, {} tasks, {} slots",
    plan.len(),
    plan.task_count(),
    plan.provider_count()
  );

  Ok(())
}

async fn run_flow(config: Config) -> Result<()> {
  let builder = FlowCatalog::standard().get(&config.test_params.test_flow)?;
  let flow = builder.build(&config.test_params);
  let plan = compile(&flow).context("failed to compile flow")?;

  info!(
    flow = builder.name(),
    tasks = plan.task_count(),
    creates = config.test_params.cardinalities().create_task_count(),
    "flow_built"
  );
  if config.engine.disable_revert {
    warn!("disable_revert is set but no task defines a revert action; it has no effect");
  }

  let api = HttpClient::new(&config.test_params.api_endpoint)
    .with_context(|| format!("invalid api_endpoint: {}", config.test_params.api_endpoint))?;
  let identity = HttpClient::new(&config.identity.auth_url)
    .with_context(|| format!("invalid auth_url: {}", config.identity.auth_url))?;
  let executor = ProvisioningExecutor::new(Arc::new(api), Arc::new(identity), &config);

  let runtime = Runtime::with_notifier(
    executor,
    RuntimeConfig {
      concurrency_limit: config.engine.concurrency_limit(),
    },
    TracingNotifier,
  );

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt_received");
      on_interrupt.cancel();
    }
  });

  match runtime.run(&plan, cancel).await {
    Ok(report) => {
      println!(
        "run {} completed: {} tasks, {} slots in {:.2}s",
        report.run_id,
        report.tasks_executed,
        report.slots_written,
        report.elapsed.as_secs_f64()
      );
      Ok(())
    }
    Err(e) => {
      if let Some(path) = e.path() {
        eprintln!("failed node: {path}");
      }
      Err(e).context("run failed")
    }
  }
}
