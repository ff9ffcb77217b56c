//! The trust store: hashed command approvals with optional expiry.
//!
//! Expiry is a read-time predicate; expired entries may sit in the file
//! until a lazy [`TrustStore::clean_expired`] pass prunes them.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use vg_core::Paths;
use vg_core::fsx::{self, FileMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustEntry {
    pub command_hash: String,
    pub command_text: String,
    pub approved_at: DateTime<Utc>,
    pub approved_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub use_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl TrustEntry {
    /// Trusted iff not expired at `now`. Expiry is exact: an entry is
    /// untrusted from `expires_at` onwards.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

pub fn hash_command(command: &str) -> String {
    hex::encode(Sha256::digest(command.as_bytes()))
}

pub struct TrustStore {
    file: PathBuf,
}

impl TrustStore {
    pub fn new(paths: &Paths) -> Self {
        TrustStore {
            file: paths.trust_file(),
        }
    }

    fn load_map(&self) -> Result<BTreeMap<String, TrustEntry>> {
        Ok(fsx::read_json(&self.file)?.unwrap_or_default())
    }

    fn save_map(&self, map: &BTreeMap<String, TrustEntry>) -> Result<()> {
        fsx::write_json_atomic(&self.file, map, FileMode::Secret)
    }

    pub fn is_trusted(&self, command: &str) -> Result<bool> {
        let map = self.load_map()?;
        Ok(map
            .get(&hash_command(command))
            .is_some_and(|entry| entry.is_valid(Utc::now())))
    }

    /// Approve a command, optionally for a limited duration.
    pub fn add(
        &self,
        command: &str,
        approved_by: &str,
        ttl: Option<Duration>,
    ) -> Result<TrustEntry> {
        let now = Utc::now();
        let entry = TrustEntry {
            command_hash: hash_command(command),
            command_text: command.to_string(),
            approved_at: now,
            approved_by: approved_by.to_string(),
            expires_at: ttl.map(|d| now + d),
            use_count: 0,
            last_used: None,
        };
        let mut map = self.load_map()?;
        map.insert(entry.command_hash.clone(), entry.clone());
        self.save_map(&map)?;
        Ok(entry)
    }

    /// Bump the use counter for a trusted command.
    pub fn record_use(&self, command: &str) -> Result<()> {
        let mut map = self.load_map()?;
        if let Some(entry) = map.get_mut(&hash_command(command)) {
            entry.use_count += 1;
            entry.last_used = Some(Utc::now());
            self.save_map(&map)?;
        }
        Ok(())
    }

    /// Remove an approval. Returns whether an entry existed.
    pub fn remove(&self, command: &str) -> Result<bool> {
        let mut map = self.load_map()?;
        let removed = map.remove(&hash_command(command)).is_some();
        if removed {
            self.save_map(&map)?;
        }
        Ok(removed)
    }

    /// List valid entries; expired ones are hidden but not deleted.
    pub fn list(&self) -> Result<Vec<TrustEntry>> {
        let now = Utc::now();
        let map = self.load_map()?;
        Ok(map.into_values().filter(|e| e.is_valid(now)).collect())
    }

    /// Prune expired entries. Returns how many were removed.
    pub fn clean_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut map = self.load_map()?;
        let before = map.len();
        map.retain(|_, entry| entry.is_valid(now));
        let removed = before - map.len();
        if removed > 0 {
            self.save_map(&map)?;
        }
        Ok(removed)
    }
}
