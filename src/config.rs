//! Engine configuration.
//!
//! Everything here is data, not mechanism: the drop-rule constants and the
//! detail-capable app ids are service-specific business rules that callers
//! override per deployment. All fields use `#[serde(default)]` so any subset
//! of keys can be specified; missing keys fall back to `Default::default()`.

use crate::model::RawRecord;
use serde::Deserialize;

/// Rules that exclude a record from normal processing before enrichment.
///
/// A hit emits a `dropped` event instead of a `ready` one. Matching is
/// either a literal owner-id match or a record-id prefix match.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DropRules {
    /// Owner ids whose records are always dropped (known spam/ad accounts).
    pub owner_ids: Vec<i64>,
    /// Record-id prefixes marking injected content.
    pub record_id_prefixes: Vec<String>,
}

impl Default for DropRules {
    fn default() -> Self {
        Self {
            owner_ids: vec![20050606],
            record_id_prefixes: vec!["advertisement".to_string()],
        }
    }
}

impl DropRules {
    /// Whether `record` hits any drop rule. Logs the rule that fired.
    pub fn matches(&self, record: &RawRecord) -> bool {
        if self.owner_ids.contains(&record.owner_id()) {
            tracing::info!(owner_id = record.owner_id(), "drop rule hit: owner id");
            tracing::debug!(record = ?record, "dropped");
            return true;
        }

        if self
            .record_id_prefixes
            .iter()
            .any(|p| record.record_id().starts_with(p.as_str()))
        {
            tracing::info!(record_id = record.record_id(), "drop rule hit: id prefix");
            tracing::debug!(record = ?record, "dropped");
            return true;
        }

        false
    }
}

/// Tunables for the engine. See field docs for defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub drop_rules: DropRules,

    /// App ids for which the detail API is available (optimized dispatch).
    pub detail_app_ids: Vec<i32>,

    /// Hard upper bound on page iterations per fetch call. Guarantees
    /// termination even if the service misreports "has more".
    pub page_limit: usize,

    /// Consecutive page-fetch errors tolerated before the whole call fails.
    pub page_error_budget: usize,

    /// Attempts the media retry supervisor makes before giving up silently.
    pub media_retry_attempts: u32,

    /// Service error code meaning "album not assembled yet, ask again".
    pub album_not_ready_code: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            drop_rules: DropRules::default(),
            detail_app_ids: vec![311],
            page_limit: 1000,
            page_error_budget: 5,
            media_retry_attempts: 12,
            album_not_ready_code: -10001,
        }
    }
}
