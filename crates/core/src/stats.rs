//! Per-engine counters. Owned by the engine; never process-global.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub snapshots_ingested: u64,
    pub samples_appended: u64,
    pub out_of_order_rejections: u64,
    pub rejected_snapshots: u64,
    pub recommendations_emitted: u64,
    pub action_required_count: u64,
}
