use derive_new::new;
use serde::{Deserialize, Serialize};

use super::Timestamp;

/// Aggregate numbers for one owner, recomputed on every request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
#[serde(rename_all = "camelCase")]
pub struct OwnerStats {
    pub prompts_count: u64,
    /// Likes the owner has given, not likes received.
    pub likes_count: u64,
    pub joined_at: Timestamp,
}
