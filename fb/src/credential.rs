//! Login-code persistence and acquisition
//!
//! The backend authenticates with a short-lived opaque code issued by the
//! platform's own login flow. This module owns the narrow interfaces around
//! it: a file-backed store, an acquisition seam for interactive flows, and
//! the explicit > saved > freshly-acquired resolution order.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// Platform the login code was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    /// Selector byte sent in the login request
    pub fn wire_value(self) -> u8 {
        match self {
            Platform::Ios => 1,
            Platform::Android => 2,
        }
    }
}

/// The opaque login credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Short-lived code from the platform's login flow
    pub code: String,

    /// Platform selector
    pub platform: Platform,
}

/// On-disk form, with a timestamp for humans debugging stale codes
#[derive(Debug, Serialize, Deserialize)]
struct SavedCredential {
    #[serde(flatten)]
    credential: Credential,
    saved_at: DateTime<Utc>,
}

/// Where the credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Passed on the command line
    Explicit,

    /// Read from the saved-credential file
    Saved,

    /// Freshly acquired this run
    Fresh,
}

/// File-backed credential storage
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    /// Store at the default location under the local data directory
    pub fn new() -> Self {
        let path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("farmbot")
            .join("credential.json");
        Self { path }
    }

    /// Store at a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the credential file
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Read the saved credential, if any
    ///
    /// A missing file is simply `None`; a corrupt file is logged and treated
    /// the same so a bad write never wedges startup.
    pub fn load(&self) -> Option<Credential> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no saved credential");
            return None;
        }
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "failed to read saved credential");
                return None;
            }
        };
        match serde_json::from_str::<SavedCredential>(&content) {
            Ok(saved) => {
                debug!(saved_at = %saved.saved_at, "loaded saved credential");
                Some(saved.credential)
            }
            Err(error) => {
                warn!(path = %self.path.display(), %error, "saved credential is corrupt, ignoring");
                None
            }
        }
    }

    /// Persist a credential, creating parent directories as needed
    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create credential directory")?;
        }
        let saved = SavedCredential {
            credential: credential.clone(),
            saved_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&saved).context("Failed to serialize credential")?;
        fs::write(&self.path, content).context("Failed to write credential file")?;
        info!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    /// Remove the saved credential; a no-op when none exists
    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to remove credential file")?;
            info!(path = %self.path.display(), "saved credential discarded");
        }
        Ok(())
    }
}

/// Seam for interactive credential acquisition
#[async_trait]
pub trait CredentialAcquirer: Send + Sync {
    /// Obtain a fresh credential from the user
    async fn acquire(&self) -> Result<Credential>;
}

/// Reads a pasted login code from stdin
///
/// The platform's own login flow (QR scan in a companion tool) hands the
/// user a short-lived code; this acquirer just collects it.
pub struct PromptAcquirer {
    platform: Platform,
}

impl PromptAcquirer {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl CredentialAcquirer for PromptAcquirer {
    async fn acquire(&self) -> Result<Credential> {
        eprintln!("Paste the login code from the platform's login flow:");
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        reader.read_line(&mut line).await.context("Failed to read login code")?;

        let code = line.trim().to_string();
        if code.is_empty() {
            return Err(eyre!("empty login code"));
        }
        Ok(Credential {
            code,
            platform: self.platform,
        })
    }
}

/// Resolve the credential to use: explicit > saved > freshly acquired
pub async fn resolve(
    explicit: Option<Credential>,
    store: &CredentialStore,
    acquirer: &dyn CredentialAcquirer,
) -> Result<(Credential, CredentialSource)> {
    if let Some(credential) = explicit {
        debug!("using credential from command line");
        return Ok((credential, CredentialSource::Explicit));
    }
    if let Some(credential) = store.load() {
        return Ok((credential, CredentialSource::Saved));
    }
    let credential = acquirer.acquire().await?;
    Ok((credential, CredentialSource::Fresh))
}
