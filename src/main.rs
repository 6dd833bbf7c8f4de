mod demo;

use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use braid_runtime::{EngineConfig, ExecutionStatus, JoinStrategy, WorkflowEngine};
use braid_trigger::{EngineLauncher, ScheduledTrigger, TriggerService, parse_schedule};

/// Braid - a DAG workflow orchestration engine
#[derive(Parser)]
#[command(name = "braid")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Maximum number of nodes running at once within a layer
  #[arg(long, global = true)]
  max_parallel: Option<usize>,

  /// How nodes with several incoming edges are scheduled
  #[arg(long, global = true, value_enum, default_value_t = Join::Any)]
  join: Join,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Join {
  Any,
  All,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the built-in demo workflow once. Variables are read as JSON from stdin.
  Demo,

  /// Print the interval a schedule expression resolves to
  Schedule {
    /// e.g. every_30s, every_5m, hourly, daily
    expression: String,
  },

  /// Launch the demo workflow on a schedule
  Watch {
    /// Schedule expression
    #[arg(default_value = "every_5s")]
    schedule: String,

    /// Stop after this many launches
    #[arg(long, default_value_t = 3)]
    runs: usize,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .with_target(false)
    .init();

  let cli = Cli::parse();

  let mut config = EngineConfig::default().with_join_strategy(match cli.join {
    Join::Any => JoinStrategy::Any,
    Join::All => JoinStrategy::All,
  });
  if let Some(limit) = cli.max_parallel {
    config = config.with_max_parallel_nodes(limit);
  }

  match cli.command {
    Some(Commands::Demo) => run_demo(config)?,
    Some(Commands::Schedule { expression }) => {
      let interval = parse_schedule(&expression);
      println!("{}s", interval.as_secs());
    }
    Some(Commands::Watch { schedule, runs }) => watch_demo(config, schedule, runs)?,
    None => {
      println!("braid - use --help to see available commands");
    }
  }

  Ok(())
}

fn run_demo(config: EngineConfig) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run_demo_async(config).await })
}

async fn run_demo_async(config: EngineConfig) -> Result<()> {
  let variables = read_variables_from_stdin()?;
  eprintln!("Variables: {}", Value::Object(variables.clone()));

  let engine = WorkflowEngine::new(config);
  let ctx = engine.run(Arc::new(demo::workflow()), variables).await;

  eprintln!("Execution {} finished: {}", ctx.execution_id(), ctx.status());
  eprintln!("Nodes executed: {}", ctx.node_results().len());

  println!(
    "{}",
    serde_json::to_string_pretty(&ctx).context("failed to serialize execution context")?
  );

  if ctx.status() != ExecutionStatus::Completed {
    bail!("workflow did not complete: {}", ctx.status());
  }
  Ok(())
}

fn watch_demo(config: EngineConfig, schedule: String, runs: usize) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { watch_demo_async(config, schedule, runs).await })
}

async fn watch_demo_async(config: EngineConfig, schedule: String, runs: usize) -> Result<()> {
  let variables = read_variables_from_stdin()?;

  let launcher = Arc::new(EngineLauncher::new(WorkflowEngine::new(config)));
  launcher.register_workflow(demo::workflow());

  let service = TriggerService::new(launcher.clone());
  let trigger = ScheduledTrigger::new(demo::WORKFLOW_ID, schedule, Value::Object(variables));
  eprintln!("Launching {} every {}s", demo::WORKFLOW_ID, trigger.interval().as_secs());

  service
    .register_trigger("demo-schedule", Arc::new(trigger))
    .context("failed to register trigger")?;
  service.start().context("failed to start triggers")?;

  let engine = launcher.engine();
  loop {
    tokio::time::sleep(Duration::from_millis(200)).await;
    let finished = engine
      .list_executions()
      .into_iter()
      .filter(|summary| summary.status.is_terminal())
      .count();
    if finished >= runs {
      break;
    }
  }
  service.stop();

  for summary in engine.list_executions() {
    println!("{}\t{}", summary.execution_id, summary.status);
  }
  Ok(())
}

fn read_variables_from_stdin() -> Result<Map<String, Value>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(Map::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read variables from stdin")?;

  if input.trim().is_empty() {
    return Ok(Map::new());
  }

  let variables: Value =
    serde_json::from_str(&input).context("failed to parse variables JSON from stdin")?;
  match variables {
    Value::Object(map) => Ok(map),
    other => bail!("variables must be a JSON object, got: {}", other),
  }
}
