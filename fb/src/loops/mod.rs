//! Automation loops
//!
//! Four independent, self-rescheduling loops share one session: own-farm,
//! friend-patrol, tasks, and warehouse. Each loop runs a pass to completion,
//! then sleeps for its configured interval before re-scanning, so a slow
//! pass can never overlap itself. Loops borrow the session and read cache
//! snapshots; they never write cached state directly.

mod farm;
mod patrol;
mod supervisor;
mod tasks;
mod warehouse;

pub use farm::FarmLoop;
pub use patrol::PatrolLoop;
pub use supervisor::{Supervisor, SupervisorExit};
pub use tasks::TaskLoop;
pub use warehouse::WarehouseLoop;

use rand::Rng;
use std::time::Duration;

use crate::config::PacingConfig;

/// Outcome counters for one pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    /// Commands that completed
    pub actions: u32,

    /// Commands that failed and were skipped over
    pub failures: u32,
}

/// Sleep the configured base delay plus random jitter before a command
///
/// This is the only pacing the client does; commands inside a pass are
/// strictly sequential anyway.
pub(crate) async fn pace(pacing: &PacingConfig) {
    let jitter = if pacing.jitter_ms == 0 {
        0
    } else {
        rand::rng().random_range(0..=pacing.jitter_ms)
    };
    tokio::time::sleep(Duration::from_millis(pacing.base_ms + jitter)).await;
}
