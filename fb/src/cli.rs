//! CLI definitions

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;
use crate::credential::Platform;

/// FarmBot - unattended farm-game chore bot
#[derive(Debug, Parser)]
#[command(
    name = "fb",
    about = "Unattended farm-game chore bot",
    version,
    after_help = "Logs are written to: ~/.local/share/farmbot/logs/farmbot.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Login code; overrides any saved credential
    #[arg(long)]
    pub code: Option<String>,

    /// Platform the login code was issued for
    #[arg(long, value_enum, default_value = "android")]
    pub platform: Platform,

    /// Own-farm interval in seconds (0 disables the loop)
    #[arg(long, value_name = "SECS")]
    pub farm_interval: Option<u64>,

    /// Friend-patrol interval in seconds (0 disables the loop)
    #[arg(long, value_name = "SECS")]
    pub friend_interval: Option<u64>,

    /// Discard any saved credential and acquire a fresh code
    #[arg(long)]
    pub fresh_login: bool,
}

impl Cli {
    /// Fold CLI overrides into a loaded configuration
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(secs) = self.farm_interval {
            config.intervals.farm_secs = secs;
        }
        if let Some(secs) = self.friend_interval {
            config.intervals.friend_secs = secs;
        }
    }
}
