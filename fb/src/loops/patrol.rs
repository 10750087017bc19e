//! Friend-patrol loop - help friends' farms and steal what's ripe

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use gameproto::msg;

use crate::config::Config;
use crate::domain::{Friend, GrowthStage, Plot};
use crate::session::{Session, SessionError};
use crate::state::StateCache;

use super::{PassStats, pace};

// Assistance action selectors on the wire
const HELP_WATER: u8 = 1;
const HELP_WEED: u8 = 2;
const HELP_SPRAY: u8 = 3;

/// The friend-patrol automation loop
pub struct PatrolLoop {
    session: Session,
    cache: Arc<StateCache>,
    config: Arc<Config>,
    visited: HashMap<u64, Instant>,
}

impl PatrolLoop {
    pub fn new(session: Session, cache: Arc<StateCache>, config: Arc<Config>) -> Self {
        Self {
            session,
            cache,
            config,
            visited: HashMap::new(),
        }
    }

    /// Run passes until stopped or the session goes away
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        info!("friend-patrol loop started");
        loop {
            if *stop.borrow() {
                break;
            }
            match self.pass().await {
                Ok(stats) => info!(actions = stats.actions, failures = stats.failures, "patrol pass complete"),
                Err(error) if error.is_fatal() => {
                    debug!(%error, "session gone, patrol loop ending");
                    break;
                }
                Err(error) => warn!(%error, "patrol pass aborted"),
            }

            let interval = Duration::from_secs(self.config.intervals.friend_secs);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("friend-patrol loop stopped");
    }

    /// One sweep over the whole friend list
    ///
    /// A friend whose every command fails does not stop the pass; the next
    /// friend is visited regardless.
    pub async fn pass(&mut self) -> Result<PassStats, SessionError> {
        let mut stats = PassStats::default();

        self.session.request(msg::FRIEND_LIST_REQUEST, json!({})).await?;

        let friends = self.cache.friends();
        for friend in &friends {
            match self.visit(friend, &mut stats).await {
                Ok(()) => {
                    self.visited.insert(friend.id, Instant::now());
                }
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    stats.failures += 1;
                    warn!(friend = friend.id, name = %friend.name, %error, "visit failed, continuing with next friend");
                }
            }
        }
        Ok(stats)
    }

    /// Visit one friend: fetch a snapshot, assist flagged plots, steal a
    /// bounded amount from mature ones
    async fn visit(&self, friend: &Friend, stats: &mut PassStats) -> Result<(), SessionError> {
        if let Some(last) = self.visited.get(&friend.id) {
            debug!(friend = friend.id, since = ?last.elapsed(), "visiting again");
        }

        pace(&self.config.pacing).await;
        let snapshot = self
            .session
            .request(msg::FRIEND_FARM_REQUEST, json!({ "friend": friend.id }))
            .await?;

        // Short-lived snapshot for this visit only; deliberately not cached
        let plots: Vec<Plot> = match snapshot.get("plots").cloned().map(serde_json::from_value) {
            Some(Ok(plots)) => plots,
            _ => {
                warn!(friend = friend.id, "friend farm snapshot was malformed");
                stats.failures += 1;
                return Ok(());
            }
        };

        let mut budget = self.config.patrol.action_budget;
        let mut stolen = 0u32;

        for plot in &plots {
            if budget == 0 {
                debug!(friend = friend.id, "action budget exhausted");
                break;
            }

            let command = if plot.stage == GrowthStage::Mature && stolen < self.config.patrol.steal_limit {
                stolen += 1;
                (msg::STEAL_REQUEST, json!({ "friend": friend.id, "plot": plot.index }))
            } else if plot.pests {
                (msg::HELP_REQUEST, help_value(friend.id, plot.index, HELP_SPRAY))
            } else if plot.weeds {
                (msg::HELP_REQUEST, help_value(friend.id, plot.index, HELP_WEED))
            } else if plot.dry {
                (msg::HELP_REQUEST, help_value(friend.id, plot.index, HELP_WATER))
            } else {
                continue;
            };

            budget -= 1;
            pace(&self.config.pacing).await;
            match self.session.request(command.0, command.1).await {
                Ok(_) => stats.actions += 1,
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    stats.failures += 1;
                    warn!(friend = friend.id, plot = plot.index, %error, "assist command failed");
                }
            }
        }
        Ok(())
    }
}

fn help_value(friend: u64, plot: u32, action: u8) -> Value {
    json!({ "friend": friend, "plot": plot, "action": action })
}
