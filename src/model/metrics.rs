use serde::{Deserialize, Serialize};

use super::Timestamp;

/// Read-only mirror of a third-party repository's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetrics {
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
}

impl ExternalMetrics {
    pub fn zero() -> Self {
        Self::default()
    }
}
