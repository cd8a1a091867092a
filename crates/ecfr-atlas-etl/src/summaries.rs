// SPDX-License-Identifier: Apache-2.0

//! Import of externally generated summaries.
//!
//! The summarizer is a separate batch job; its output lands here as a
//! JSON array and is persisted through the same writer actor and archive
//! objects as the snapshot run.

use std::fs;
use std::path::Path;

use chrono::Utc;
use tokio::sync::watch;
use tracing::info;

use ecfr_atlas_core::{EtlError, EtlErrorCode, Result, SnapshotDate};
use ecfr_atlas_db::{spawn_writer, SqliteRepo, WRITE_QUEUE_CAPACITY};
use ecfr_atlas_model::{Summary, SummaryKind};
use ecfr_atlas_store::ArchiveRepo;

#[derive(serde::Deserialize)]
struct SummaryRow {
    kind: String,
    key: String,
    text: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    created_at: Option<chrono::DateTime<Utc>>,
}

/// Read a summarizer output file into summary rows.
pub fn read_summary_file(path: &Path) -> Result<Vec<Summary>> {
    let raw = fs::read_to_string(path).map_err(|e| {
        EtlError::new(EtlErrorCode::Io, format!("reading {}: {e}", path.display()))
    })?;
    let rows: Vec<SummaryRow> = serde_json::from_str(&raw).map_err(|e| {
        EtlError::new(
            EtlErrorCode::InvalidData,
            format!("parsing {}: {e}", path.display()),
        )
    })?;
    rows.into_iter()
        .map(|r| {
            Ok(Summary {
                kind: SummaryKind::parse(&r.kind)?,
                key: r.key,
                text: r.text,
                model: if r.model.is_empty() {
                    "external".to_string()
                } else {
                    r.model
                },
                created_at: r.created_at.unwrap_or_else(Utc::now),
            })
        })
        .collect()
}

/// Persist imported summaries to both stores for `snapshot`.
pub async fn import_summaries(
    repo: SqliteRepo,
    archive: &ArchiveRepo,
    snapshot: SnapshotDate,
    rows: Vec<Summary>,
) -> Result<()> {
    archive.write_summaries(snapshot, &rows).await?;

    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let (writer, join) = spawn_writer(repo, WRITE_QUEUE_CAPACITY, cancel_rx);
    writer.upsert_summaries(rows.clone()).await?;
    drop(writer);
    join.await
        .map_err(|e| EtlError::new(EtlErrorCode::Internal, format!("writer join: {e}")))?;

    info!(rows = rows.len(), snapshot = %snapshot, "summaries imported");
    Ok(())
}
