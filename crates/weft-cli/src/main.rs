use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use weft_core::{Edge, FlowEvent, GraphBuilder, NodeRecord, NodeStatus, NodeType};
use weft_runtime::FlowRuntime;

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Weft flow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a flow file
    Run {
        /// Path to flow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input payload as a JSON value
        #[arg(short, long)]
        input: Option<String>,

        /// Seed execution at this node instead of the graph roots
        #[arg(short, long)]
        trigger: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a flow file without running it
    Validate {
        /// Path to flow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example flow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "flow.json")]
        output: PathBuf,
    },
}

/// On-disk flow definition: the structural graph plus a display name.
#[derive(Serialize, Deserialize)]
struct FlowFile {
    name: String,
    nodes: Vec<NodeRecord>,
    edges: Vec<Edge>,
}

fn load_flow(file: &PathBuf) -> Result<FlowFile> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let flow: FlowFile =
        serde_json::from_str(&text).with_context(|| format!("cannot parse {}", file.display()))?;
    Ok(flow)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            trigger,
            verbose,
        } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::WARN
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            run_flow(file, input, trigger).await?;
        }

        Commands::Validate { file } => {
            validate_flow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_flow(output)?;
        }
    }

    Ok(())
}

async fn run_flow(file: PathBuf, input: Option<String>, trigger: Option<String>) -> Result<()> {
    println!("🚀 Loading flow from: {}", file.display());
    let flow = load_flow(&file)?;

    println!("📋 Flow: {}", flow.name);
    println!("   Nodes: {}", flow.nodes.len());
    println!("   Edges: {}", flow.edges.len());
    println!();

    let input: serde_json::Value = match input {
        Some(text) => serde_json::from_str(&text).context("input is not valid JSON")?,
        None => serde_json::Value::Null,
    };

    let runtime = FlowRuntime::new(weft_nodes::clients::default_clients());

    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                FlowEvent::RunStarted { .. } => {
                    println!("▶️  Run started");
                }
                FlowEvent::NodeStateChanged { node_id, state, .. } => match state.status {
                    NodeStatus::Running => println!("  ⚡ {} running", node_id),
                    NodeStatus::Success => println!("  ✅ {} succeeded", node_id),
                    NodeStatus::Error => println!(
                        "  ❌ {} failed: {}",
                        node_id,
                        state.error.as_deref().unwrap_or("unknown error")
                    ),
                    NodeStatus::Idle => {}
                },
                FlowEvent::Log {
                    node_id, message, ..
                } => {
                    println!("     ℹ️  [{}] {}", node_id.as_deref().unwrap_or("-"), message);
                }
                FlowEvent::RunCompleted { duration_ms, .. } => {
                    println!("✨ Run settled in {}ms", duration_ms);
                }
            }
        }
    });

    let ctx = runtime
        .run_flow(flow.nodes, flow.edges, trigger, input)
        .await?;

    // Let the listener drain before printing the summary.
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", ctx.execution_id);

    let mut snapshot: Vec<_> = ctx.snapshot().into_iter().collect();
    snapshot.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (node_id, state) in snapshot {
        match state.status {
            NodeStatus::Success => {
                let result = state
                    .result
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "null".to_string());
                println!("   {} → success: {}", node_id, result);
            }
            NodeStatus::Error => {
                println!(
                    "   {} → error: {}",
                    node_id,
                    state.error.as_deref().unwrap_or("unknown error")
                );
            }
            NodeStatus::Idle => println!("   {} → idle (not reached)", node_id),
            NodeStatus::Running => println!("   {} → still running", node_id),
        }
    }

    Ok(())
}

fn validate_flow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating flow: {}", file.display());

    let flow = load_flow(&file)?;
    let graph = GraphBuilder::build(flow.nodes, flow.edges)?;

    println!("✅ Flow is valid:");
    println!("   Name: {}", flow.name);
    println!("   Nodes: {}", graph.node_count());
    println!("   Roots: {}", graph.roots().join(", "));

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let types = [
        (NodeType::Input, "Injects a configured value or the run input"),
        (NodeType::Output, "Records its input as a final result"),
        (NodeType::Llm, "Runs a prompt against an inference backend"),
        (NodeType::Api, "Calls an HTTP endpoint"),
        (
            NodeType::Conditional,
            "Routes its input down the true or false branch",
        ),
        (NodeType::Merger, "Accumulates inputs and renders them"),
        (NodeType::Group, "Iterates its members over a collection"),
        (NodeType::WebCrawler, "Fetches a web page"),
        (NodeType::HtmlParser, "Extracts fields from HTML by rule"),
    ];
    for (node_type, description) in types {
        println!("  • {}", node_type.as_str());
        println!("    {}", description);
    }
}

fn create_example_flow(output: PathBuf) -> Result<()> {
    let flow = FlowFile {
        name: "Example API flow".to_string(),
        nodes: vec![
            NodeRecord::new("fetch", NodeType::Api)
                .with_config("url", "https://api.github.com/zen".into())
                .with_config("method", "GET".into()),
            NodeRecord::new("result", NodeType::Output),
        ],
        edges: vec![Edge::new("fetch", "result")],
    };

    let json = serde_json::to_string_pretty(&flow)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example flow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  weft run --file {}", output.display());

    Ok(())
}
