// SPDX-License-Identifier: Apache-2.0

use ecfr_atlas_core::SnapshotDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleOutcome {
    Ok,
    /// Upstream 404; the Title is reserved or absent.
    Skipped,
    Failed,
}

/// The seal record emitted once a snapshot run completes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SnapshotManifest {
    pub snapshot_date: SnapshotDate,
    pub titles_ok: u32,
    pub titles_skipped: u32,
    pub titles_failed: u32,
    pub section_count: u64,
    pub agency_lsa_count: u64,
    pub duration_ms: u64,
}

impl SnapshotManifest {
    #[must_use]
    pub fn new(snapshot_date: SnapshotDate) -> Self {
        Self {
            snapshot_date,
            titles_ok: 0,
            titles_skipped: 0,
            titles_failed: 0,
            section_count: 0,
            agency_lsa_count: 0,
            duration_ms: 0,
        }
    }

    pub fn record(&mut self, outcome: TitleOutcome, sections: u64) {
        match outcome {
            TitleOutcome::Ok => self.titles_ok += 1,
            TitleOutcome::Skipped => self.titles_skipped += 1,
            TitleOutcome::Failed => self.titles_failed += 1,
        }
        self.section_count += sections;
    }
}
