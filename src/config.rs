//! Startup configuration — environment/CLI driven settings for every tunable
//! the runtime exposes.
//!
//! A single [`Config`] struct is parsed once (via `clap`, with every field
//! also settable by environment variable) and threaded through construction
//! — there is no ambient global config singleton.

use clap::Args;
use clap::Parser;

/// Top-level runtime configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "agentflow-server", about = "A2A protocol runtime", version)]
pub struct Config {
    /// Name advertised in the agent card.
    #[arg(long, env = "AGENT_NAME", default_value = "A2A Agent")]
    pub agent_name: String,

    /// Description advertised in the agent card.
    #[arg(long, env = "AGENT_DESCRIPTION", default_value = "An A2A-compatible agent")]
    pub agent_description: String,

    /// Version string advertised in the agent card.
    #[arg(long, env = "AGENT_VERSION", default_value = "1.0.0")]
    pub agent_version: String,

    /// Public URL this agent is reachable at.
    #[arg(long, env = "AGENT_URL", default_value = "http://localhost:7420")]
    pub agent_url: String,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub queue: QueueConfig,

    #[command(flatten)]
    pub agent: AgentConfig,

    #[command(flatten)]
    pub capabilities: CapabilitiesConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,

    #[command(flatten)]
    pub extended_card: ExtendedCardConfig,
}

/// HTTP server tunables.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Port the JSON-RPC / SSE endpoint listens on.
    #[arg(long = "server-port", env = "SERVER_PORT", default_value_t = 7420)]
    pub port: u16,

    /// Read timeout for incoming requests, in seconds.
    #[arg(long = "server-read-timeout", env = "SERVER_READ_TIMEOUT", default_value_t = 30)]
    pub read_timeout_secs: u64,

    /// Write timeout for outgoing responses, in seconds.
    #[arg(long = "server-write-timeout", env = "SERVER_WRITE_TIMEOUT", default_value_t = 30)]
    pub write_timeout_secs: u64,

    /// Idle keep-alive timeout for SSE connections, in seconds.
    #[arg(long = "server-idle-timeout", env = "SERVER_IDLE_TIMEOUT", default_value_t = 120)]
    pub idle_timeout_secs: u64,
}

/// Submission queue and worker pool tunables.
#[derive(Debug, Clone, Args)]
pub struct QueueConfig {
    /// Maximum number of in-flight submissions before `message/send(Stream)`
    /// rejects new work with `QUEUE_FULL`.
    #[arg(long = "queue-max-size", env = "QUEUE_MAX_SIZE", default_value_t = 256)]
    pub max_size: usize,

    /// How often the task store's TTL pruner sweeps for expired terminal
    /// tasks, in seconds.
    #[arg(long = "queue-cleanup-interval", env = "QUEUE_CLEANUP_INTERVAL", default_value_t = 60)]
    pub cleanup_interval_secs: u64,

    /// Number of worker tasks draining the queue.
    #[arg(long = "queue-workers", env = "QUEUE_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// How long a terminal task is retained before the TTL pruner deletes it,
    /// in seconds.
    #[arg(long = "queue-task-retention", env = "QUEUE_TASK_RETENTION", default_value_t = 3600)]
    pub task_retention_secs: u64,
}

/// Agent loop / LLM tunables.
#[derive(Debug, Clone, Args)]
pub struct AgentConfig {
    /// LLM provider identifier (left to the `LlmClient` implementation to interpret).
    #[arg(long = "agent-provider", env = "AGENT_PROVIDER", default_value = "echo")]
    pub provider: String,

    /// Model identifier to request from the provider.
    #[arg(long = "agent-model", env = "AGENT_MODEL", default_value = "")]
    pub model: String,

    /// Base URL for the LLM provider's API, when applicable.
    #[arg(long = "agent-base-url", env = "AGENT_BASE_URL", default_value = "")]
    pub base_url: String,

    /// System prompt prepended to every conversation.
    #[arg(long = "agent-system-prompt", env = "AGENT_SYSTEM_PROMPT", default_value = "")]
    pub system_prompt: String,

    /// Maximum LLM-call/tool-dispatch rounds per task before the loop fails.
    #[arg(
        long = "agent-max-iterations",
        env = "AGENT_MAX_CHAT_COMPLETION_ITERATIONS",
        default_value_t = 10
    )]
    pub max_iterations: usize,

    /// Maximum conversation history (messages) kept in the loop's working copy.
    #[arg(
        long = "agent-max-conversation-history",
        env = "AGENT_MAX_CONVERSATION_HISTORY",
        default_value_t = 50
    )]
    pub max_conversation_history: usize,

    /// Sampling temperature passed to the LLM client.
    #[arg(long = "agent-temperature", env = "AGENT_TEMPERATURE", default_value_t = 0.7)]
    pub temperature: f32,

    /// Maximum tokens requested per LLM completion.
    #[arg(long = "agent-max-tokens", env = "AGENT_MAX_TOKENS", default_value_t = 1024)]
    pub max_tokens: u32,
}

/// Advertised agent-card capability flags.
#[derive(Debug, Clone, Args)]
pub struct CapabilitiesConfig {
    /// Advertise `message/stream` support.
    #[arg(
        long = "capabilities-streaming",
        env = "CAPABILITIES_STREAMING",
        default_value_t = true
    )]
    pub streaming: bool,

    /// Advertise push-notification support.
    #[arg(
        long = "capabilities-push-notifications",
        env = "CAPABILITIES_PUSH_NOTIFICATIONS",
        default_value_t = true
    )]
    pub push_notifications: bool,

    /// Advertise that task history retains every state transition.
    #[arg(
        long = "capabilities-state-transition-history",
        env = "CAPABILITIES_STATE_TRANSITION_HISTORY",
        default_value_t = true
    )]
    pub state_transition_history: bool,
}

/// Authentication middleware configuration (the middleware itself is an
/// external collaborator — the core only needs to know whether to require it).
#[derive(Debug, Clone, Args)]
pub struct AuthConfig {
    /// Require authenticated requests.
    #[arg(id = "auth_enable", long = "auth-enable", env = "AUTH_ENABLE", default_value_t = false)]
    pub enable: bool,

    /// OIDC issuer URL, when `auth.enable` is set.
    #[arg(long = "auth-issuer-url", env = "AUTH_ISSUER_URL", default_value = "")]
    pub issuer_url: String,

    /// OAuth client ID.
    #[arg(long = "auth-client-id", env = "AUTH_CLIENT_ID", default_value = "")]
    pub client_id: String,

    /// OAuth client secret.
    #[arg(long = "auth-client-secret", env = "AUTH_CLIENT_SECRET", default_value = "")]
    pub client_secret: String,
}

/// Telemetry toggle. Recording itself is out of scope for the core; this
/// only controls whether the runtime emits the hooks an external collector
/// would consume.
#[derive(Debug, Clone, Args)]
pub struct TelemetryConfig {
    /// Enable telemetry hooks.
    #[arg(id = "telemetry_enable", long = "telemetry-enable", env = "TELEMETRY_ENABLE", default_value_t = false)]
    pub enable: bool,
}

/// Authenticated extended agent-card toggle (spec'd separately from the
/// public card so `-32007` can be returned when it's disabled).
#[derive(Debug, Clone, Args)]
pub struct ExtendedCardConfig {
    /// Serve an authenticated extended agent card at the extended-card endpoint.
    #[arg(
        id = "extended_card_enable",
        long = "extended-card-enable",
        env = "EXTENDED_CARD_ENABLE",
        default_value_t = false
    )]
    pub enable: bool,
}

impl Config {
    /// Parse configuration from CLI args and environment variables.
    pub fn load() -> Self {
        Config::parse()
    }
}
