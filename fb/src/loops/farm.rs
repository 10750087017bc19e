//! Own-farm loop - keep every plot harvested, healthy, and planted

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use gameproto::msg;

use crate::config::Config;
use crate::domain::{GrowthStage, Plot};
use crate::session::{Session, SessionError};
use crate::state::StateCache;

use super::{PassStats, pace};

/// What a pass does with one plot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlotAction {
    Harvest,
    Remove,
    Spray,
    Weed,
    Water,
    Plant,
    Skip,
}

/// Pick one action for a plot
///
/// Priority when several conditions hold: Harvest > Remove > Spray > Weed >
/// Water > Plant. Harvest and removal additionally free the plot for
/// replanting within the same pass, handled by the caller.
pub(crate) fn decide(plot: &Plot) -> PlotAction {
    match plot.stage {
        GrowthStage::Mature => PlotAction::Harvest,
        GrowthStage::Withered => PlotAction::Remove,
        _ if plot.pests => PlotAction::Spray,
        _ if plot.weeds => PlotAction::Weed,
        _ if plot.dry => PlotAction::Water,
        GrowthStage::Empty => PlotAction::Plant,
        GrowthStage::Growing => PlotAction::Skip,
    }
}

/// Seed bookkeeping for one pass
///
/// A failed purchase latches: planting is skipped for the rest of the pass
/// instead of retrying the shop on every empty plot.
struct SeedState {
    available: u32,
    buy_failed: bool,
}

/// The own-farm automation loop
pub struct FarmLoop {
    session: Session,
    cache: Arc<StateCache>,
    config: Arc<Config>,
}

impl FarmLoop {
    pub fn new(session: Session, cache: Arc<StateCache>, config: Arc<Config>) -> Self {
        Self { session, cache, config }
    }

    /// Run passes until stopped or the session goes away
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        info!("own-farm loop started");
        loop {
            if *stop.borrow() {
                break;
            }
            match self.pass().await {
                Ok(stats) => info!(actions = stats.actions, failures = stats.failures, "farm pass complete"),
                Err(error) if error.is_fatal() => {
                    debug!(%error, "session gone, farm loop ending");
                    break;
                }
                Err(error) => warn!(%error, "farm pass aborted"),
            }

            let interval = Duration::from_secs(self.config.intervals.farm_secs);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("own-farm loop stopped");
    }

    /// One full sweep over all plots, in index order
    pub async fn pass(&self) -> Result<PassStats, SessionError> {
        let mut stats = PassStats::default();

        // Refresh before acting; pushes alone are not trusted to be complete
        self.session.request(msg::FARM_STATE_REQUEST, json!({})).await?;

        let plots = self.cache.plots();
        let mut seeds = SeedState {
            available: self.cache.item_quantity(self.config.farm.seed_item),
            buy_failed: false,
        };

        for plot in &plots {
            let action = decide(plot);
            if action == PlotAction::Skip {
                continue;
            }
            if let Err(error) = self.act(plot, action, &mut seeds, &mut stats).await {
                if error.is_fatal() {
                    return Err(error);
                }
                stats.failures += 1;
                warn!(plot = plot.index, ?action, %error, "plot command failed, continuing pass");
            }
        }
        Ok(stats)
    }

    async fn act(
        &self,
        plot: &Plot,
        action: PlotAction,
        seeds: &mut SeedState,
        stats: &mut PassStats,
    ) -> Result<(), SessionError> {
        let target = json!({ "plot": plot.index });
        match action {
            PlotAction::Harvest => {
                self.command(msg::HARVEST_REQUEST, target, stats).await?;
                self.try_plant(plot.index, seeds, stats).await
            }
            PlotAction::Remove => {
                self.command(msg::SHOVEL_REQUEST, target, stats).await?;
                self.try_plant(plot.index, seeds, stats).await
            }
            PlotAction::Spray => self.command(msg::SPRAY_REQUEST, target, stats).await.map(drop),
            PlotAction::Weed => self.command(msg::WEED_REQUEST, target, stats).await.map(drop),
            PlotAction::Water => self.command(msg::WATER_REQUEST, target, stats).await.map(drop),
            PlotAction::Plant => self.try_plant(plot.index, seeds, stats).await,
            PlotAction::Skip => Ok(()),
        }
    }

    async fn command(&self, name: &str, value: Value, stats: &mut PassStats) -> Result<Value, SessionError> {
        pace(&self.config.pacing).await;
        let response = self.session.request(name, value).await?;
        stats.actions += 1;
        Ok(response)
    }

    /// Plant if a seed can be had; a failed purchase skips planting for the
    /// rest of the pass
    async fn try_plant(&self, index: u32, seeds: &mut SeedState, stats: &mut PassStats) -> Result<(), SessionError> {
        if !self.ensure_seed(seeds, stats).await? {
            debug!(plot = index, "no seed available, plant skipped");
            return Ok(());
        }
        let value = json!({ "plot": index, "crop": self.config.farm.crop });
        self.command(msg::PLANT_REQUEST, value, stats).await?;
        seeds.available = seeds.available.saturating_sub(1);
        Ok(())
    }

    async fn ensure_seed(&self, seeds: &mut SeedState, stats: &mut PassStats) -> Result<bool, SessionError> {
        if seeds.available > 0 {
            return Ok(true);
        }
        if seeds.buy_failed {
            return Ok(false);
        }

        let value = json!({
            "crop": self.config.farm.crop,
            "quantity": self.config.farm.seed_batch,
        });
        match self.command(msg::BUY_SEED_REQUEST, value, stats).await {
            Ok(response) if response.get("ok").and_then(Value::as_bool) == Some(true) => {
                seeds.available += self.config.farm.seed_batch;
                debug!(batch = self.config.farm.seed_batch, "seed restocked");
                Ok(true)
            }
            Ok(response) => {
                let reason = response.get("reason").and_then(Value::as_str).unwrap_or("unspecified");
                warn!(reason, "seed purchase rejected, planting skipped this pass");
                seeds.buy_failed = true;
                Ok(false)
            }
            Err(error) if error.is_fatal() => Err(error),
            Err(error) => {
                warn!(%error, "seed purchase failed, planting skipped this pass");
                seeds.buy_failed = true;
                stats.failures += 1;
                Ok(false)
            }
        }
    }
}
