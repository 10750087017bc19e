//! FarmBot - unattended farm-game chore client
//!
//! FarmBot keeps a persistent session with the game backend over its binary
//! message protocol and performs the routine chores a player would otherwise
//! tap through by hand: harvesting, planting, maintenance, helping and
//! raiding friends, claiming task rewards, and selling the warehouse.
//!
//! # Core Concepts
//!
//! - **One session, many loops**: four automation loops share a single
//!   correlated request/response session; none opens its own connection
//! - **Confirmed state only**: cached game state changes only on inbound
//!   pushes and confirmed command responses, never speculatively
//! - **Completion-based scheduling**: a loop sleeps after its pass finishes,
//!   so a slow pass can never overlap itself
//!
//! # Modules
//!
//! - [`session`] - transport, login, heartbeat, request correlation
//! - [`state`] - in-memory mirror of plots, friends, tasks, inventory
//! - [`loops`] - the own-farm, friend-patrol, task, and warehouse loops
//! - [`domain`] - plain data types for cached game entities
//! - [`config`] - configuration types and loading
//! - [`credential`] - login-code persistence and acquisition
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod credential;
pub mod domain;
pub mod loops;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use cli::Cli;
pub use config::{Config, FarmConfig, IntervalsConfig, PacingConfig, PatrolConfig, ServerConfig, SessionTuning};
pub use credential::{Credential, CredentialAcquirer, CredentialSource, CredentialStore, Platform, PromptAcquirer};
pub use domain::{Friend, GrowthStage, InventoryItem, Plot, TaskRecord};
pub use loops::{FarmLoop, PassStats, PatrolLoop, Supervisor, SupervisorExit, TaskLoop, WarehouseLoop};
pub use session::{ConnState, DisconnectReason, Session, SessionConfig, SessionError, SessionEvent};
pub use state::StateCache;
