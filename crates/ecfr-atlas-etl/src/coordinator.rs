// SPDX-License-Identifier: Apache-2.0

//! Snapshot orchestration.
//!
//! One run ingests all 50 Titles with at most four in flight, funnels
//! every relational write through the single writer actor, and seals the
//! snapshot once the agency-mode LSA batch lands and the write queue
//! drains. A Title failure is logged with its key and never aborts the
//! run; only writer startup failure or cancellation does.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use ecfr_atlas_client::{BulkDataClient, FederalRegisterClient};
use ecfr_atlas_core::{EtlError, EtlErrorCode, Result, SnapshotDate};
use ecfr_atlas_db::{spawn_writer, SqliteRepo, WriterHandle};
use ecfr_atlas_ingest::{load_agency_file, metricize_all, Metricizer, TitleXmlParser};
use ecfr_atlas_model::{RawSection, Section, SnapshotManifest, Title, TitleId, TitleOutcome};
use ecfr_atlas_store::{ArchiveRepo, ObjectStore};

use crate::differ::compute_diffs;

pub struct SnapshotCoordinator {
    worker: Arc<TitleWorker>,
    agencies_path: PathBuf,
    title_pool: usize,
    write_queue_capacity: usize,
}

/// Everything a single Title task needs, shared across the pool.
struct TitleWorker {
    bulk: Arc<BulkDataClient>,
    federal_register: Arc<FederalRegisterClient>,
    raw_store: Arc<dyn ObjectStore>,
    archive: Arc<ArchiveRepo>,
    metricizer: Arc<Metricizer>,
    metric_threads: usize,
}

impl SnapshotCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bulk: Arc<BulkDataClient>,
        federal_register: Arc<FederalRegisterClient>,
        raw_store: Arc<dyn ObjectStore>,
        archive: Arc<ArchiveRepo>,
        agencies_path: PathBuf,
        title_pool: usize,
        metric_threads: usize,
        write_queue_capacity: usize,
    ) -> Self {
        Self {
            worker: Arc::new(TitleWorker {
                bulk,
                federal_register,
                raw_store,
                archive,
                metricizer: Arc::new(Metricizer::new()),
                metric_threads,
            }),
            agencies_path,
            title_pool: title_pool.max(1),
            write_queue_capacity: write_queue_capacity.max(1),
        }
    }

    /// Run one dated snapshot to completion and return its manifest.
    pub async fn run(
        &self,
        snapshot: SnapshotDate,
        repo: SqliteRepo,
        cancel: watch::Receiver<bool>,
    ) -> Result<SnapshotManifest> {
        let started = Instant::now();
        info!(snapshot = %snapshot, titles = 50, pool = self.title_pool, "starting snapshot run");

        let (writer, writer_join) = spawn_writer(repo, self.write_queue_capacity, cancel.clone());

        // Agency refresh first: the forest must be committed before any
        // section lands so the aggregation join never sees a torn state.
        match load_agency_file(&self.agencies_path) {
            Ok(root) => {
                let nodes = root.node_count();
                match writer.replace_agencies(root).await {
                    Ok(()) => info!(agencies = nodes, "agency forest refreshed"),
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => warn!(error = %e, "agency refresh failed, continuing without mapping"),
                }
            }
            Err(e) => {
                warn!(path = %self.agencies_path.display(), error = %e, "agency file unavailable, continuing without mapping");
            }
        }

        let mut manifest = SnapshotManifest::new(snapshot);
        let semaphore = Arc::new(Semaphore::new(self.title_pool));
        let mut tasks: JoinSet<(TitleId, Result<(TitleOutcome, u64)>)> = JoinSet::new();

        for title in Title::enumerate() {
            let worker = Arc::clone(&self.worker);
            let semaphore = Arc::clone(&semaphore);
            let writer = writer.clone();
            let cancel = cancel.clone();
            let title_id = title.id();
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (title_id, Err(cancelled())),
                };
                let outcome = worker.process_title(title, snapshot, &writer, &cancel).await;
                (title_id, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok((outcome, sections)))) => manifest.record(outcome, sections),
                Ok((title, Err(e))) if e.is_cancelled() => {
                    warn!(title = %title, "title task cancelled");
                    manifest.record(TitleOutcome::Failed, 0);
                }
                Ok((title, Err(e))) => {
                    error!(title = %title, error = %e, "title ingest failed");
                    manifest.record(TitleOutcome::Failed, 0);
                }
                Err(e) => {
                    error!(error = %e, "title task panicked");
                    manifest.record(TitleOutcome::Failed, 0);
                }
            }
        }

        // Agency-mode LSA joins the snapshot after every Title settles.
        if !*cancel.borrow() {
            let rows = self
                .worker
                .federal_register
                .collect_agency_batch(snapshot)
                .await;
            manifest.agency_lsa_count = rows.len() as u64;
            if rows.is_empty() {
                warn!("agency lsa batch came back empty");
            } else {
                if let Err(e) = self.worker.archive.write_agency_lsa(snapshot, &rows).await {
                    error!(error = %e, "agency lsa archive write failed");
                }
                if let Err(e) = writer.upsert_agency_lsa(rows).await {
                    error!(error = %e, "agency lsa relational write failed");
                }
            }
        }

        // Close the queue and wait for the actor to drain; the snapshot
        // is sealed only after the last transaction commits.
        drop(writer);
        writer_join
            .await
            .map_err(|e| EtlError::new(EtlErrorCode::Internal, format!("writer join: {e}")))?;

        if *cancel.borrow() {
            return Err(cancelled());
        }

        manifest.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            snapshot = %snapshot,
            titles_ok = manifest.titles_ok,
            titles_skipped = manifest.titles_skipped,
            titles_failed = manifest.titles_failed,
            sections = manifest.section_count,
            agency_lsa = manifest.agency_lsa_count,
            duration_ms = manifest.duration_ms,
            "snapshot sealed"
        );
        Ok(manifest)
    }
}

impl TitleWorker {
    /// Fetch, parse, metricize, archive, upsert, diff, then title LSA
    /// for one Title. Partial failures past the parse stage are logged
    /// and the Title still counts as processed.
    async fn process_title(
        &self,
        title: Title,
        snapshot: SnapshotDate,
        writer: &WriterHandle,
        cancel: &watch::Receiver<bool>,
    ) -> Result<(TitleOutcome, u64)> {
        let title_id = title.id();
        if *cancel.borrow() {
            return Err(cancelled());
        }

        let key = match self.bulk.fetch_title_xml(title_id).await {
            Ok(key) => key,
            Err(e) if e.is_not_found() => {
                info!(title = %title_id, "title absent upstream, skipping");
                return Ok((TitleOutcome::Skipped, 0));
            }
            Err(e) => return Err(e),
        };

        let raws = match self.parse_title(&key).await {
            Ok(raws) => raws,
            Err(e) if e.code == EtlErrorCode::InvalidData => {
                // A corrupt cached object must not wedge every later run:
                // drop it, fetch once more, parse once more.
                warn!(title = %title_id, error = %e, "parse failed, refetching raw object");
                self.bulk.evict(title_id).await?;
                self.bulk.fetch_title_xml(title_id).await?;
                self.parse_title(&key).await?
            }
            Err(e) => return Err(e),
        };

        if *cancel.borrow() {
            return Err(cancelled());
        }

        let sections = self.metricize_title(title_id, snapshot, raws).await?;
        let section_count = sections.len() as u64;
        info!(title = %title_id, sections = section_count, "title metricized");

        // The archive write must land before the differ runs: diffs read
        // current rows from the archive, not from memory.
        let mut archived = true;
        if let Err(e) = self.archive.write_sections(snapshot, title_id, &sections).await {
            error!(title = %title_id, error = %e, "section archive write failed");
            archived = false;
        }

        writer.upsert_sections(sections).await?;

        if archived {
            match compute_diffs(&self.archive, snapshot, title_id).await {
                Ok(diffs) => {
                    if let Err(e) = self.archive.write_diffs(snapshot, title_id, &diffs).await {
                        error!(title = %title_id, error = %e, "diff archive write failed");
                    }
                }
                Err(e) => error!(title = %title_id, error = %e, "diff compute failed"),
            }
        }

        if *cancel.borrow() {
            return Err(cancelled());
        }

        let activity = self.federal_register.collect_for_title(&title, snapshot).await;
        writer.upsert_lsa_title(activity).await?;

        Ok((TitleOutcome::Ok, section_count))
    }

    /// Stream the cached raw object through the XML scanner off the async
    /// runtime; the scanner works a buffered reader, not a loaded string.
    async fn parse_title(&self, key: &str) -> Result<Vec<RawSection>> {
        let reader = self.raw_store.get_reader(key).await?;
        tokio::task::spawn_blocking(move || {
            TitleXmlParser::new(reader).collect::<Result<Vec<_>>>()
        })
        .await
        .map_err(|e| EtlError::new(EtlErrorCode::Internal, format!("parser task join: {e}")))?
    }

    /// Nested CPU pool: pure regex work fanned out to hardware
    /// parallelism inside this Title's task.
    async fn metricize_title(
        &self,
        title: TitleId,
        snapshot: SnapshotDate,
        raws: Vec<RawSection>,
    ) -> Result<Vec<Section>> {
        let metricizer = Arc::clone(&self.metricizer);
        let max_threads = self.metric_threads;
        tokio::task::spawn_blocking(move || {
            metricize_all(&metricizer, title, snapshot, &raws, max_threads)
        })
        .await
        .map_err(|e| EtlError::new(EtlErrorCode::Internal, format!("metricize task join: {e}")))
    }
}

fn cancelled() -> EtlError {
    EtlError::new(EtlErrorCode::Cancelled, "snapshot run cancelled")
}
