//! Completion summary published once per gathering cycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::query::Predicate;

/// Outcome of one completed gathering cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatherSummary {
    /// Predicate that was gathered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Predicate>,

    /// Result count reported by the native query
    pub total: usize,

    /// Number of values handed to the result sink
    pub delivered: usize,

    /// Update notifications received before gathering finished
    pub updates: u64,

    /// Extraction stopped early because the sink failed
    #[serde(default)]
    pub aborted: bool,

    /// The substrate failed to gather; `error` carries the reason
    #[serde(default)]
    pub failed: bool,

    /// Gather, attribute fetch or sink failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    pub finished_at: DateTime<Utc>,
}

impl GatherSummary {
    /// Whether extraction visited every reported result
    pub fn is_complete(&self) -> bool {
        !self.aborted && self.error.is_none()
    }
}
