//! Task loop - claim rewards for completed tasks

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use gameproto::msg;

use crate::config::Config;
use crate::domain::TaskRecord;
use crate::session::{Session, SessionError};
use crate::state::StateCache;

use super::{PassStats, pace};

/// The task-reward automation loop
pub struct TaskLoop {
    session: Session,
    cache: Arc<StateCache>,
    config: Arc<Config>,
    /// Task ids already claimed in this session; claims are at-most-once
    /// even when the loop runs again before the cache refreshes
    claimed: HashSet<u32>,
}

/// Whether a claim should be attempted for this task
fn should_claim(task: &TaskRecord, claimed: &HashSet<u32>) -> bool {
    task.claimable() && !claimed.contains(&task.id)
}

impl TaskLoop {
    pub fn new(session: Session, cache: Arc<StateCache>, config: Arc<Config>) -> Self {
        Self {
            session,
            cache,
            config,
            claimed: HashSet::new(),
        }
    }

    /// Run passes until stopped or the session goes away
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        info!("task loop started");
        loop {
            if *stop.borrow() {
                break;
            }
            match self.pass().await {
                Ok(stats) => info!(actions = stats.actions, failures = stats.failures, "task pass complete"),
                Err(error) if error.is_fatal() => {
                    debug!(%error, "session gone, task loop ending");
                    break;
                }
                Err(error) => warn!(%error, "task pass aborted"),
            }

            let interval = Duration::from_secs(self.config.intervals.task_secs);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("task loop stopped");
    }

    /// Fetch the task list and claim every completed, unclaimed reward
    pub async fn pass(&mut self) -> Result<PassStats, SessionError> {
        let mut stats = PassStats::default();

        self.session.request(msg::TASK_LIST_REQUEST, json!({})).await?;

        for task in self.cache.tasks() {
            if !should_claim(&task, &self.claimed) {
                continue;
            }

            // Share-multiplier path first; the claim proceeds regardless of
            // the share result
            if task.shareable {
                pace(&self.config.pacing).await;
                match self.session.request(msg::SHARE_TASK_REQUEST, json!({ "task": task.id })).await {
                    Ok(_) => stats.actions += 1,
                    Err(error) if error.is_fatal() => return Err(error),
                    Err(error) => debug!(task = task.id, %error, "share attempt failed"),
                }
            }

            pace(&self.config.pacing).await;
            match self.session.request(msg::CLAIM_TASK_REQUEST, json!({ "task": task.id })).await {
                Ok(response) if response.get("ok").and_then(Value::as_bool) == Some(true) => {
                    // Only a confirmed claim marks the task done for good
                    self.claimed.insert(task.id);
                    stats.actions += 1;
                    info!(task = task.id, "task reward claimed");
                }
                Ok(response) => {
                    let reason = response.get("reason").and_then(Value::as_str).unwrap_or("unspecified");
                    stats.failures += 1;
                    warn!(task = task.id, reason, "claim rejected");
                }
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    stats.failures += 1;
                    warn!(task = task.id, %error, "claim failed");
                }
            }
        }
        Ok(stats)
    }
}
