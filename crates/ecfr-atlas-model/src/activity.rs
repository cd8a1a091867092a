// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};

/// Per-Title regulatory activity counts, keyed on `(title, snapshot_date)`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LsaActivity {
    pub title: String,
    pub snapshot_date: String,
    pub proposals: u64,
    pub amendments: u64,
    pub finals: u64,
    pub captured_at: DateTime<Utc>,
    pub source_hint: String,
}

/// Per-agency regulatory activity counts, keyed on
/// `(agency_id, snapshot_date)`. Counts are agency-scoped, not
/// Title-scoped: the upstream facet endpoint aggregates over recent time
/// independent of CFR Title.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AgencyLsa {
    pub agency_id: String,
    pub agency_name: String,
    pub proposed_rules: u64,
    pub final_rules: u64,
    pub notices: u64,
    pub total_documents: u64,
    pub snapshot_date: String,
    pub captured_at: DateTime<Utc>,
    pub source_hint: String,
}
