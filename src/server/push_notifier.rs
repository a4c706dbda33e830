//! Push notifier — best-effort webhook delivery on task state transitions.
//!
//! Mirrors Python SDK's `PushNotificationSender` / `BasePushNotificationSender`
//! from `a2a.server.tasks.push_notification_sender`, adapted to the same
//! retry-with-backoff shape [`queue`](super::queue)'s worker loop uses for
//! lease contention.
//!
//! A notifier never blocks or fails task progress — delivery is fire-and-forget
//! from the caller's perspective; failures after retries are exhausted are
//! logged and dropped.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::types::{PushNotificationConfig, Task};

/// Maximum delivery attempts per notification before giving up.
const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Base delay between delivery retries; doubled on each attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Registry of per-task push notification configs plus an HTTP client for
/// delivering them.
///
/// Configs are associated with a task ID via [`set_config`](Self::set_config)
/// (wired to `tasks/pushNotificationConfig/set`) and consulted by
/// [`notify`](Self::notify) whenever a task reaches a new status.
pub struct PushNotifier {
    client: reqwest::Client,
    configs: RwLock<HashMap<String, Vec<PushNotificationConfig>>>,
}

impl PushNotifier {
    /// Create a notifier with a default-configured HTTP client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            configs: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace, by `id`) a push notification config for a task.
    pub async fn set_config(&self, task_id: &str, config: PushNotificationConfig) {
        let mut configs = self.configs.write().await;
        let entry = configs.entry(task_id.to_string()).or_default();
        if let Some(id) = config.id.as_deref() {
            entry.retain(|c| c.id.as_deref() != Some(id));
        }
        entry.push(config);
    }

    /// List the configs registered for a task.
    pub async fn list_configs(&self, task_id: &str) -> Vec<PushNotificationConfig> {
        self.configs
            .read()
            .await
            .get(task_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove a single config by id, or all configs for the task if `config_id` is `None`.
    pub async fn delete_config(&self, task_id: &str, config_id: Option<&str>) {
        let mut configs = self.configs.write().await;
        match config_id {
            Some(id) => {
                if let Some(entry) = configs.get_mut(task_id) {
                    entry.retain(|c| c.id.as_deref() != Some(id));
                }
            }
            None => {
                configs.remove(task_id);
            }
        }
    }

    /// Deliver the current task state to every configured webhook for this
    /// task, retrying each delivery up to [`MAX_DELIVERY_ATTEMPTS`] times with
    /// doubling backoff. Never returns an error — a failed delivery is logged
    /// and otherwise ignored, since push delivery is explicitly best-effort
    /// and must not block or fail task execution.
    pub async fn notify(&self, task: &Task) {
        let configs = {
            let configs = self.configs.read().await;
            configs.get(&task.id).cloned().unwrap_or_default()
        };

        if configs.is_empty() {
            return;
        }

        for config in configs {
            self.deliver(&config, task).await;
        }
    }

    async fn deliver(&self, config: &PushNotificationConfig, task: &Task) {
        let mut attempt = 0u32;
        let mut delay = RETRY_BASE_DELAY;

        loop {
            attempt += 1;
            let mut request = self.client.post(&config.url).json(task);
            if let Some(ref token) = config.token {
                request = request.header("X-A2A-Notification-Token", token);
            }
            if let Some(ref auth) = config.authentication {
                if let Some(ref creds) = auth.credentials {
                    request = request.bearer_auth(creds);
                }
            }

            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(task_id = %task.id, url = %config.url, attempt, "Push notification delivered");
                    return;
                }
                Ok(resp) => {
                    warn!(
                        task_id = %task.id,
                        url = %config.url,
                        status = %resp.status(),
                        attempt,
                        "Push notification rejected by endpoint"
                    );
                }
                Err(e) => {
                    warn!(task_id = %task.id, url = %config.url, attempt, error = %e, "Push notification delivery failed");
                }
            }

            if attempt >= MAX_DELIVERY_ATTEMPTS {
                warn!(task_id = %task.id, url = %config.url, "Push notification abandoned after retries");
                return;
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }
}

impl Default for PushNotifier {
    fn default() -> Self {
        Self::new()
    }
}
