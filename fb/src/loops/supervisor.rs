//! Supervisor - starts and stops the automation loops on session events
//!
//! Consumes the session's lifecycle event stream: a confirmed login starts
//! the loops, a disconnect stops them and hands the reason back to the
//! entry point, which owns retry policy. Each loop gets its own stop signal
//! so the `start_x/stop_x` pairs work independently.

use std::sync::Arc;

use tokio::sync::{Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::session::{DisconnectReason, Session, SessionEvent};
use crate::state::StateCache;

use super::{FarmLoop, PatrolLoop, TaskLoop, WarehouseLoop};

/// How long a loop gets to wind down after its stop signal
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the supervisor returned
#[derive(Debug)]
pub enum SupervisorExit {
    /// The backend rejected the credential; no loops were started
    AuthRejected { reason: String },

    /// A ready session was lost
    Disconnected { reason: DisconnectReason },

    /// The session's event stream ended without a disconnect event
    SessionGone,
}

struct LoopHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the four automation loops
pub struct Supervisor {
    session: Session,
    cache: Arc<StateCache>,
    config: Arc<Config>,
    farm: Option<LoopHandle>,
    patrol: Option<LoopHandle>,
    tasks: Option<LoopHandle>,
    warehouse: Option<LoopHandle>,
    sell_now: Arc<Notify>,
}

impl Supervisor {
    pub fn new(session: Session, cache: Arc<StateCache>, config: Arc<Config>) -> Self {
        Self {
            session,
            cache,
            config,
            farm: None,
            patrol: None,
            tasks: None,
            warehouse: None,
            sell_now: Arc::new(Notify::new()),
        }
    }

    /// Whether the own-farm loop should run
    pub fn farm_enabled(config: &Config) -> bool {
        config.intervals.farm_secs > 0
    }

    /// Whether the friend-patrol loop should run
    ///
    /// Gated on the friend interval; a zero friend interval disables the
    /// loop no matter what the farm interval says.
    pub fn patrol_enabled(config: &Config) -> bool {
        config.intervals.friend_secs > 0
    }

    /// Force an immediate warehouse sell pass (debug/manual trigger)
    pub fn trigger_sell(&self) {
        self.sell_now.notify_one();
    }

    pub fn start_farm_loop(&mut self) {
        if self.farm.is_some() {
            return;
        }
        let (stop, stop_rx) = watch::channel(false);
        let farm = FarmLoop::new(self.session.clone(), Arc::clone(&self.cache), Arc::clone(&self.config));
        let task = tokio::spawn(farm.run(stop_rx));
        self.farm = Some(LoopHandle { stop, task });
    }

    pub fn stop_farm_loop(&mut self) {
        stop(self.farm.take());
    }

    pub fn start_patrol_loop(&mut self) {
        if self.patrol.is_some() {
            return;
        }
        let (stop, stop_rx) = watch::channel(false);
        let patrol = PatrolLoop::new(self.session.clone(), Arc::clone(&self.cache), Arc::clone(&self.config));
        let task = tokio::spawn(patrol.run(stop_rx));
        self.patrol = Some(LoopHandle { stop, task });
    }

    pub fn stop_patrol_loop(&mut self) {
        stop(self.patrol.take());
    }

    pub fn start_task_loop(&mut self) {
        if self.tasks.is_some() {
            return;
        }
        let (stop, stop_rx) = watch::channel(false);
        let tasks = TaskLoop::new(self.session.clone(), Arc::clone(&self.cache), Arc::clone(&self.config));
        let task = tokio::spawn(tasks.run(stop_rx));
        self.tasks = Some(LoopHandle { stop, task });
    }

    pub fn stop_task_loop(&mut self) {
        stop(self.tasks.take());
    }

    pub fn start_warehouse_loop(&mut self) {
        if self.warehouse.is_some() {
            return;
        }
        let (stop, stop_rx) = watch::channel(false);
        let warehouse = WarehouseLoop::new(self.session.clone(), Arc::clone(&self.cache), Arc::clone(&self.config));
        let task = tokio::spawn(warehouse.run(stop_rx, Arc::clone(&self.sell_now)));
        self.warehouse = Some(LoopHandle { stop, task });
    }

    pub fn stop_warehouse_loop(&mut self) {
        stop(self.warehouse.take());
    }

    fn start_loops(&mut self) {
        if Self::farm_enabled(&self.config) {
            self.start_farm_loop();
        }
        if Self::patrol_enabled(&self.config) {
            self.start_patrol_loop();
        }
        self.start_task_loop();
        self.start_warehouse_loop();
    }

    /// Signal every loop to stop and wait for them to wind down
    pub async fn stop_all(&mut self) {
        let handles = [
            self.farm.take(),
            self.patrol.take(),
            self.tasks.take(),
            self.warehouse.take(),
        ];
        for handle in handles.into_iter().flatten() {
            let _ = handle.stop.send(true);
            if tokio::time::timeout(STOP_TIMEOUT, handle.task).await.is_err() {
                warn!("loop did not stop within {STOP_TIMEOUT:?}");
            }
        }
    }

    /// Drive loop lifecycle from the session event stream until the session
    /// ends one way or the other
    pub async fn run(mut self, mut events: broadcast::Receiver<SessionEvent>) -> SupervisorExit {
        loop {
            match events.recv().await {
                Ok(SessionEvent::LoginSucceeded { farmer_id }) => {
                    info!(farmer_id, "login confirmed, starting automation loops");
                    self.start_loops();
                }
                Ok(SessionEvent::LoginFailed { reason }) => {
                    self.stop_all().await;
                    return SupervisorExit::AuthRejected { reason };
                }
                Ok(SessionEvent::Disconnected { reason }) => {
                    self.stop_all().await;
                    return SupervisorExit::Disconnected { reason };
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.stop_all().await;
                    return SupervisorExit::SessionGone;
                }
            }
        }
    }
}

fn stop(handle: Option<LoopHandle>) {
    if let Some(handle) = handle {
        let _ = handle.stop.send(true);
        // The loop finishes its current pass and exits; no abort
    }
}
