//! Interactive chat against the built-in demo script.

use crate::console::ConsoleMessenger;
use anyhow::{Context as _, Result};
use chatflow_core::config::{PipelineConfig, StorageConfig};
use chatflow_core::context::NodeAddress;
use chatflow_core::script::{
    FlowSource, HandlerRegistry, NodeSource, ScriptGraph, ScriptSource,
    register_builtin_conditions,
};
use chatflow_core::store::ContextStore;
use chatflow_engine::{Pipeline, PipelineRunner};
use chatflow_storage::{FileContextStore, InMemoryContextStore};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn run(config_path: Option<PathBuf>, user: String, events: bool) -> Result<()> {
    let config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {:?}", path))?;
            PipelineConfig::from_toml_str(&content)?
        }
        None => PipelineConfig::default(),
    };

    let store: Arc<dyn ContextStore> = match &config.storage {
        StorageConfig::Memory => Arc::new(InMemoryContextStore::new()),
        StorageConfig::File { dir } => match dir {
            Some(dir) => Arc::new(FileContextStore::new(dir).await?),
            None => Arc::new(FileContextStore::default_location().await?),
        },
    };

    let graph = Arc::new(demo_graph()?);
    let mut pipeline = Pipeline::new(graph, store).with_config(&config);

    if events {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        pipeline = pipeline.with_event_sender(events_tx);
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => eprintln!("{}", line),
                    Err(e) => tracing::warn!(error = %e, "failed to encode turn event"),
                }
            }
        });
    }

    println!("Chatflow demo. Say anything to begin; 'bye' to end a conversation; Ctrl-D to quit.");
    let runner = PipelineRunner::new(Arc::new(pipeline));
    runner.run(Arc::new(ConsoleMessenger::new(user))).await?;
    Ok(())
}

/// The demo script: a small hub with an echo corner.
///
/// Any first message lands on the hub, which explains the commands.
/// "echo <text>" bounces the text back, "bye" says farewell, anything else
/// shows the menu again (the hub doubles as the fallback node).
fn demo_graph() -> Result<ScriptGraph> {
    let mut registry = HandlerRegistry::new();
    register_builtin_conditions(&mut registry);
    registry.register_condition_fn("wants_echo", |_, input| {
        input.as_str().is_some_and(|s| s.starts_with("echo "))
    });
    registry.register_condition_fn("says_bye", |_, input| input == &json!("bye"));
    registry.register_response_fn("menu", |ctx, _| {
        json!(format!(
            "Hi! Try 'echo <text>' or 'bye'. ({} turns so far)",
            ctx.turn_count()
        ))
    });
    registry.register_response_fn("echo_back", |_, input: &Value| {
        let text = input.as_str().and_then(|s| s.strip_prefix("echo ")).unwrap_or("");
        json!(text)
    });
    registry.register_response_fn("farewell", |_, _| json!("Goodbye!"));

    let hub = NodeAddress::new("demo", "hub");
    let transitions = |node: NodeSource| {
        node.with_transition("says_bye", NodeAddress::new("demo", "farewell"), 2)
            .with_transition("wants_echo", NodeAddress::new("demo", "echo"), 1)
            .with_transition("always", NodeAddress::new("demo", "hub"), 0)
    };

    let source = ScriptSource::new(NodeAddress::new("demo", "start"), hub)
        .with_flow(
            FlowSource::new("demo")
                .with_node(
                    NodeSource::new("start", "menu").with_transition(
                        "always",
                        NodeAddress::new("demo", "hub"),
                        0,
                    ),
                )
                .with_node(transitions(NodeSource::new("hub", "menu")))
                .with_node(transitions(NodeSource::new("echo", "echo_back")))
                .with_node(
                    NodeSource::new("farewell", "farewell").with_transition(
                        "always",
                        NodeAddress::new("demo", "hub"),
                        0,
                    ),
                ),
        );

    Ok(ScriptGraph::build(&source, &registry)?)
}
