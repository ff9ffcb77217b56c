//! Boundary types for the external vulnerability feed.
//!
//! The sync itself lives outside the core; only the cache-entry shape and
//! its freshness predicate are part of this workspace.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub ecosystem: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CveCacheEntry {
    pub package: PackageRef,
    #[serde(default)]
    pub vulnerabilities: Vec<String>,
    pub retrieved_at: DateTime<Utc>,
}

impl CveCacheEntry {
    /// An entry is fresh iff `now - retrieved_at <= max_age`.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.retrieved_at <= max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(retrieved_at: DateTime<Utc>) -> CveCacheEntry {
        CveCacheEntry {
            package: PackageRef {
                ecosystem: "npm".to_string(),
                name: "left-pad".to_string(),
                version: "1.3.0".to_string(),
            },
            vulnerabilities: Vec::new(),
            retrieved_at,
        }
    }

    #[test]
    fn test_fresh_within_max_age() {
        let now = Utc::now();
        assert!(entry(now - Duration::hours(1)).is_fresh(now, Duration::hours(24)));
    }

    #[test]
    fn test_stale_past_max_age() {
        let now = Utc::now();
        assert!(!entry(now - Duration::hours(25)).is_fresh(now, Duration::hours(24)));
    }

    #[test]
    fn test_exact_boundary_is_fresh() {
        let now = Utc::now();
        assert!(entry(now - Duration::hours(24)).is_fresh(now, Duration::hours(24)));
    }
}
