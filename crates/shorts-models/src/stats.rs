//! Dashboard statistics.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Counts shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DashboardStats {
    pub total_videos: u64,
    /// Queue entries with status `completed`
    pub completed: u64,
    /// Queue entries with status `pending`
    pub pending: u64,
    /// Metadata records not yet bound to a queue entry
    pub unused_metadata: u64,
}
