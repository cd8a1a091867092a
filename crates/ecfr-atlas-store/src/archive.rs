// SPDX-License-Identifier: Apache-2.0

//! The dated columnar archive: authoritative, append-only history keyed by
//! `(snapshot_date, title)`. The relational store can be rebuilt from it.

use std::sync::Arc;

use tracing::debug;

use ecfr_atlas_core::{Result, SnapshotDate};
use ecfr_atlas_model::{
    agency_lsa_object, diffs_object, sections_object, summaries_object, AgencyLsa, Section,
    SectionDiff, Summary, TitleId,
};

use crate::object_store::ObjectStore;
use crate::parquet_codec;

pub struct ArchiveRepo {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ArchiveRepo {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub async fn write_sections(
        &self,
        snapshot: SnapshotDate,
        title: TitleId,
        rows: &[Section],
    ) -> Result<()> {
        let key = sections_object(&self.prefix, snapshot, title);
        let bytes = parquet_codec::encode_sections(rows)?;
        debug!(key = %key, rows = rows.len(), "archive write sections");
        self.store.put(&key, &bytes).await
    }

    pub async fn read_sections(
        &self,
        snapshot: SnapshotDate,
        title: TitleId,
    ) -> Result<Vec<Section>> {
        let key = sections_object(&self.prefix, snapshot, title);
        let bytes = self.store.get(&key).await?;
        parquet_codec::decode_sections(bytes)
    }

    pub async fn write_diffs(
        &self,
        snapshot: SnapshotDate,
        title: TitleId,
        rows: &[SectionDiff],
    ) -> Result<()> {
        let key = diffs_object(&self.prefix, snapshot, title);
        let bytes = parquet_codec::encode_diffs(rows)?;
        self.store.put(&key, &bytes).await
    }

    pub async fn read_diffs(
        &self,
        snapshot: SnapshotDate,
        title: TitleId,
    ) -> Result<Vec<SectionDiff>> {
        let key = diffs_object(&self.prefix, snapshot, title);
        let bytes = self.store.get(&key).await?;
        parquet_codec::decode_diffs(bytes)
    }

    pub async fn write_agency_lsa(&self, snapshot: SnapshotDate, rows: &[AgencyLsa]) -> Result<()> {
        let key = agency_lsa_object(&self.prefix, snapshot);
        let bytes = parquet_codec::encode_agency_lsa(rows)?;
        self.store.put(&key, &bytes).await
    }

    pub async fn read_agency_lsa(&self, snapshot: SnapshotDate) -> Result<Vec<AgencyLsa>> {
        let key = agency_lsa_object(&self.prefix, snapshot);
        let bytes = self.store.get(&key).await?;
        parquet_codec::decode_agency_lsa(bytes)
    }

    pub async fn write_summaries(&self, snapshot: SnapshotDate, rows: &[Summary]) -> Result<()> {
        let key = summaries_object(&self.prefix, snapshot);
        let bytes = parquet_codec::encode_summaries(rows)?;
        self.store.put(&key, &bytes).await
    }

    pub async fn read_summaries(&self, snapshot: SnapshotDate) -> Result<Vec<Summary>> {
        let key = summaries_object(&self.prefix, snapshot);
        let bytes = self.store.get(&key).await?;
        parquet_codec::decode_summaries(bytes)
    }

    /// Dated prefixes under the archive root, ascending. Names that do not
    /// parse as `YYYY-MM-DD` are not snapshots and are ignored.
    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotDate>> {
        let names = self.store.list_dirs(&self.prefix).await?;
        let mut snapshots: Vec<SnapshotDate> = names
            .iter()
            .filter_map(|n| SnapshotDate::parse(n).ok())
            .collect();
        snapshots.sort();
        Ok(snapshots)
    }

    /// Greatest snapshot strictly before `snapshot`, if any.
    pub async fn previous_snapshot(&self, snapshot: SnapshotDate) -> Result<Option<SnapshotDate>> {
        Ok(self
            .list_snapshots()
            .await?
            .into_iter()
            .filter(|s| *s < snapshot)
            .next_back())
    }

    pub async fn latest_snapshot(&self) -> Result<Option<SnapshotDate>> {
        Ok(self.list_snapshots().await?.into_iter().next_back())
    }
}
