//! Reference A2A server binary — wires configuration, the in-memory task
//! store, the queue/worker pool, the agent loop (backed by the bundled echo
//! LLM client), and the push notifier into a running axum server.
//!
//! This is a reference main program exercising the library crate end to end,
//! not a production deployment recipe.

use std::sync::Arc;
use std::time::Duration;

use a2a_rs::server::{
    a2a_router_with_extended_card, AgentLoop, AgentLoopConfig, AgentLoopExecutor,
    DefaultRequestHandler, EchoLlmClient, InMemoryTaskStore, PushNotifier, ToolRegistry,
};
use a2a_rs::AgentCardBuilder;
use a2a_rs::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    init_tracing();

    tracing::info!(
        agent_name = %config.agent_name,
        port = config.server.port,
        workers = config.queue.workers,
        "starting agentflow server"
    );

    let agent_loop = Arc::new(AgentLoop::new(
        Arc::new(EchoLlmClient),
        Arc::new(ToolRegistry::new()),
        AgentLoopConfig {
            max_iterations: config.agent.max_iterations,
            max_conversation_history: config.agent.max_conversation_history,
        },
    ));
    let executor = Arc::new(AgentLoopExecutor::new(agent_loop));

    let task_store = Arc::new(InMemoryTaskStore::new());
    task_store.spawn_cleanup(
        Duration::from_secs(config.queue.cleanup_interval_secs),
        Duration::from_secs(config.queue.task_retention_secs),
    );

    let mut handler = DefaultRequestHandler::new(executor, task_store);
    if config.capabilities.push_notifications {
        handler = handler.with_push_notifier(Arc::new(PushNotifier::new()));
    }
    let handler = Arc::new(handler);
    handler
        .enable_queue(config.queue.workers, config.queue.max_size)
        .await;

    let agent_card = AgentCardBuilder::new(
        config.agent_name.clone(),
        config.agent_description.clone(),
        config.agent_version.clone(),
    )
    .with_jsonrpc_interface(format!("{}/a2a", config.agent_url))
    .with_streaming(config.capabilities.streaming)
    .with_push_notifications(config.capabilities.push_notifications)
    .build();

    let app = a2a_router_with_extended_card(handler, agent_card, config.extended_card.enable);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
