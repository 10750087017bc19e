//! Warehouse loop - sell everything the shop will take

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::{Notify, watch};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use gameproto::msg;

use crate::config::Config;
use crate::session::{Session, SessionError};
use crate::state::StateCache;

use super::{PassStats, pace};

/// The warehouse-sell automation loop
pub struct WarehouseLoop {
    session: Session,
    cache: Arc<StateCache>,
    config: Arc<Config>,
}

impl WarehouseLoop {
    pub fn new(session: Session, cache: Arc<StateCache>, config: Arc<Config>) -> Self {
        Self { session, cache, config }
    }

    /// Run passes until stopped or the session goes away
    ///
    /// One early pass runs a short fixed delay after startup so inventory
    /// accumulated before launch is not left unsold for a whole cadence.
    /// `sell_now` forces an immediate extra pass.
    pub async fn run(self, mut stop: watch::Receiver<bool>, sell_now: Arc<Notify>) {
        info!("warehouse loop started");

        let initial = Duration::from_secs(self.config.intervals.warehouse_initial_delay_secs);
        tokio::select! {
            _ = tokio::time::sleep(initial) => {}
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    info!("warehouse loop stopped");
                    return;
                }
            }
        }

        loop {
            if *stop.borrow() {
                break;
            }
            match self.pass().await {
                Ok(stats) => info!(actions = stats.actions, failures = stats.failures, "warehouse pass complete"),
                Err(error) if error.is_fatal() => {
                    debug!(%error, "session gone, warehouse loop ending");
                    break;
                }
                Err(error) => warn!(%error, "warehouse pass aborted"),
            }

            let interval = Duration::from_secs(self.config.intervals.warehouse_secs);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = sell_now.notified() => {
                    info!("manual sell trigger");
                }
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("warehouse loop stopped");
    }

    /// Fetch inventory and sell every sellable stack
    ///
    /// Cached quantities drop only when the confirmed sell response comes
    /// back through the session's cache-update path.
    pub async fn pass(&self) -> Result<PassStats, SessionError> {
        let mut stats = PassStats::default();

        self.session.request(msg::INVENTORY_REQUEST, json!({})).await?;

        for item in self.cache.inventory() {
            if !item.sellable || item.quantity == 0 {
                continue;
            }

            pace(&self.config.pacing).await;
            let value = json!({ "item": item.id, "quantity": item.quantity });
            match self.session.request(msg::SELL_ITEM_REQUEST, value).await {
                Ok(response) if response.get("ok").and_then(Value::as_bool) == Some(true) => {
                    let earned = response.get("earned").and_then(Value::as_u64).unwrap_or(0);
                    stats.actions += 1;
                    debug!(item = item.id, quantity = item.quantity, earned, "stack sold");
                }
                Ok(response) => {
                    let reason = response.get("reason").and_then(Value::as_str).unwrap_or("unspecified");
                    stats.failures += 1;
                    warn!(item = item.id, reason, "sell rejected");
                }
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    stats.failures += 1;
                    warn!(item = item.id, %error, "sell failed");
                }
            }
        }
        Ok(stats)
    }
}
