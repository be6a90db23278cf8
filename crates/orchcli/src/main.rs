use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use orchadapters::{EngineConfig, HttpPolicyInvoker, InMemoryRepository};
use orchcore::{
    ExecutionEvent, FlowContent, FlowDefinition, FlowDocument, FlowMetadata, FlowNode, Payload,
    PolicyContent, Record,
};
use orchruntime::{Orchestrator, RuntimeConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orch")]
#[command(about = "Policy Orchestrator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a flow file against a set of policies
    Run {
        /// Path to the flow document (YAML or JSON)
        #[arg(short, long)]
        flow: PathBuf,

        /// JSON file holding an array of policies with fixed ids
        #[arg(short, long)]
        policies: PathBuf,

        /// Input data as a JSON string
        #[arg(short, long, default_value = "{}")]
        data: String,

        /// Evaluation endpoint policies are POSTed to
        #[arg(long, env = "ENGINE_ADDRESS", default_value = "http://localhost:3000")]
        engine_address: String,

        /// Per-request engine timeout
        #[arg(long, env = "ENGINE_TIMEOUT_MS", default_value_t = 30_000)]
        engine_timeout_ms: u64,

        /// Deadline for the whole run
        #[arg(long, env = "FLOW_TIMEOUT_MS")]
        timeout_ms: Option<u64>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a flow file
    Validate {
        /// Path to the flow document (YAML or JSON)
        file: PathBuf,
    },

    /// Create an example flow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "flow.yaml")]
        output: PathBuf,
    },
}

/// One entry of the `--policies` file
#[derive(Deserialize)]
struct PolicyEntry {
    id: String,
    #[serde(flatten)]
    content: PolicyContent,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            flow,
            policies,
            data,
            engine_address,
            engine_timeout_ms,
            timeout_ms,
            verbose,
        } => {
            init_tracing(verbose);

            let engine = EngineConfig::new(engine_address).with_timeout_ms(engine_timeout_ms);
            let runtime = RuntimeConfig {
                max_execution_time_ms: timeout_ms,
                ..RuntimeConfig::default()
            };
            run_flow(&flow, &policies, &data, engine, runtime).await?;
        }

        Commands::Validate { file } => {
            validate_flow(&file)?;
        }

        Commands::Init { output } => {
            create_example_flow(&output)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_policies(path: &Path) -> Result<Vec<Record<PolicyContent>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policies from {}", path.display()))?;
    let entries: Vec<PolicyEntry> = serde_json::from_str(&text)
        .with_context(|| format!("{} must hold a JSON array of policies", path.display()))?;

    Ok(entries
        .into_iter()
        .map(|entry| Record::new_draft(entry.content).with_id(entry.id))
        .collect())
}

async fn run_flow(
    flow: &Path,
    policies: &Path,
    data: &str,
    engine: EngineConfig,
    runtime: RuntimeConfig,
) -> Result<()> {
    println!("🚀 Loading flow from: {}", flow.display());

    let flow_text = std::fs::read_to_string(flow)
        .with_context(|| format!("failed to read flow from {}", flow.display()))?;
    let data: Payload = serde_json::from_str(data).context("--data must be valid JSON")?;

    let policy_records = load_policies(policies)?;
    println!("📋 Policies: {}", policy_records.len());
    println!("   Engine: {}", engine.address);
    println!();

    let policy_repo = Arc::new(InMemoryRepository::<PolicyContent>::new());
    policy_repo.seed(policy_records).await;
    let flow_repo = Arc::new(InMemoryRepository::<FlowContent>::new());
    let invoker = Arc::new(HttpPolicyInvoker::new(engine)?);

    let orchestrator = Orchestrator::with_config(policy_repo, flow_repo, invoker, runtime);

    let mut events = orchestrator.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::FlowStarted { roots, .. } => {
                    println!("▶️  Flow started with {} root(s)", roots);
                }
                ExecutionEvent::NodeVisited {
                    node_id,
                    node_type,
                    effective_result,
                    ..
                } => {
                    println!("  ⚡ {} ({}) -> {}", node_id, node_type, effective_result);
                }
                ExecutionEvent::NodeFailed { node_id, error, .. } => {
                    println!("  ❌ Node {} failed: {}", node_id, error);
                }
                ExecutionEvent::FlowCompleted {
                    success,
                    duration_ms,
                    ..
                } => {
                    if success {
                        println!("✨ Flow completed in {}ms", duration_ms);
                    } else {
                        println!("💥 Flow failed after {}ms", duration_ms);
                    }
                }
            }
        }
    });

    let cancellation = CancellationToken::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling flow");
            on_interrupt.cancel();
        }
    });

    let result = orchestrator
        .run_ad_hoc_flow_with_cancel(&flow_text, &data, cancellation)
        .await;

    // Let the listener drain before printing the summary.
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    let result = result?;

    println!();
    println!("📊 Result:");
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

fn validate_flow(file: &Path) -> Result<()> {
    println!("🔍 Validating flow: {}", file.display());

    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read flow from {}", file.display()))?;
    let document = FlowDocument::parse(&text)?;

    println!("✅ Flow is valid:");
    println!("   Roots: {}", document.flow.roots.len());
    println!("   Nodes: {}", document.flow.node_count());

    // Unknown types and missing references only fail once a run reaches them.
    let mut pending: Vec<&FlowNode> = document.flow.roots.iter().collect();
    while let Some(node) = pending.pop() {
        match node.kind() {
            Ok(kind) if kind.evaluates_policy() && node.policy_ref.is_empty() => {
                println!("   ⚠️  Node {} has no policy reference", node.id);
            }
            Ok(_) => {}
            Err(e) => println!("   ⚠️  Node {}: {}", node.id, e),
        }
        pending.extend(node.on_true.iter());
        pending.extend(node.on_false.iter());
    }

    Ok(())
}

fn create_example_flow(output: &Path) -> Result<()> {
    let flow = FlowDefinition::new().with_root(
        FlowNode::start("licence-check", "driving-licence")
            .on_true(FlowNode::returning("granted", "granted"))
            .on_false(
                FlowNode::custom("refer", "manual review")
                    .on_true(FlowNode::returning("denied", "denied")),
            ),
    );

    let document = FlowDocument {
        metadata: Some(FlowMetadata {
            total_nodes: flow.node_count(),
            total_edges: flow.node_count().saturating_sub(flow.roots.len()),
            timestamp: None,
        }),
        flow,
    };

    std::fs::write(output, document.to_yaml()?)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("✨ Created example flow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  orch run --flow {} --policies policies.json --data '{{\"Person\": {{\"age\": 18}}}}'",
        output.display()
    );

    Ok(())
}
