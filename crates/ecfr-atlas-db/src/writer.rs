// SPDX-License-Identifier: Apache-2.0

//! The single-writer actor for the relational store.
//!
//! A file-backed sqlite serializes writers under a global lock, so 50
//! parallel Title workers would spend the run contending. Exactly one
//! blocking task owns the connection and drains a bounded channel of
//! typed write messages; callers never touch the connection. Each message
//! commits its own transaction, errors are logged and the actor moves on,
//! and a cancellation flag is honored between messages.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use ecfr_atlas_core::{EtlError, EtlErrorCode, Result};
use ecfr_atlas_model::{AgencyLsa, AgencyRoot, LsaActivity, Section, Summary};

use crate::repo::SqliteRepo;

pub const WRITE_QUEUE_CAPACITY: usize = 100;

pub enum WriteMessage {
    UpsertSections(Vec<Section>),
    UpsertLsaTitle(LsaActivity),
    UpsertAgencyLsa(Vec<AgencyLsa>),
    /// Carries an ack so the coordinator can wait for the refresh before
    /// any section work starts.
    ReplaceAgencies(AgencyRoot, oneshot::Sender<Result<()>>),
    UpsertSummaries(Vec<Summary>),
}

/// Cloneable sending side. Dropping every handle closes the queue; the
/// actor drains what is buffered and exits.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<WriteMessage>,
    cancel: watch::Receiver<bool>,
}

impl WriterHandle {
    pub async fn upsert_sections(&self, rows: Vec<Section>) -> Result<()> {
        self.send(WriteMessage::UpsertSections(rows)).await
    }

    pub async fn upsert_lsa_title(&self, row: LsaActivity) -> Result<()> {
        self.send(WriteMessage::UpsertLsaTitle(row)).await
    }

    pub async fn upsert_agency_lsa(&self, rows: Vec<AgencyLsa>) -> Result<()> {
        self.send(WriteMessage::UpsertAgencyLsa(rows)).await
    }

    pub async fn upsert_summaries(&self, rows: Vec<Summary>) -> Result<()> {
        self.send(WriteMessage::UpsertSummaries(rows)).await
    }

    /// Replace the agency forest and wait for the transaction to commit.
    pub async fn replace_agencies(&self, root: AgencyRoot) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(WriteMessage::ReplaceAgencies(root, ack_tx)).await?;
        match ack_rx.await {
            Ok(result) => result,
            Err(_) => Err(EtlError::new(
                EtlErrorCode::Persistence,
                "writer exited before acking agency replace",
            )),
        }
    }

    /// Send with backpressure. Blocks while the queue is full; resolves to
    /// `cancelled` instead of blocking forever if the run is aborted.
    async fn send(&self, msg: WriteMessage) -> Result<()> {
        let mut cancel = self.cancel.clone();
        tokio::select! {
            res = self.tx.send(msg) => res.map_err(|_| {
                EtlError::new(EtlErrorCode::Persistence, "write queue closed")
            }),
            () = cancelled(&mut cancel) => {
                Err(EtlError::new(EtlErrorCode::Cancelled, "snapshot run cancelled"))
            }
        }
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    // A dropped sender is not a cancellation; park forever and let the
    // other select branch win.
    if rx.wait_for(|flag| *flag).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Start the actor. Returns the handle plus the join handle the
/// coordinator awaits after closing the queue.
pub fn spawn_writer(
    mut repo: SqliteRepo,
    capacity: usize,
    cancel: watch::Receiver<bool>,
) -> (WriterHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<WriteMessage>(capacity);
    let drain_cancel = cancel.clone();
    let join = tokio::task::spawn_blocking(move || {
        let mut applied: u64 = 0;
        while let Some(msg) = rx.blocking_recv() {
            apply(&mut repo, msg);
            applied += 1;
            if *drain_cancel.borrow() {
                info!(applied, "writer cancelled mid-drain, exiting after current transaction");
                return;
            }
        }
        info!(applied, "write queue drained, writer exiting");
    });
    (WriterHandle { tx, cancel }, join)
}

/// A failed message is logged and skipped; a persistent backend failure
/// surfaces as a run of such errors, not as an abort.
fn apply(repo: &mut SqliteRepo, msg: WriteMessage) {
    match msg {
        WriteMessage::UpsertSections(rows) => {
            if let Err(e) = repo.upsert_sections(&rows) {
                error!(rows = rows.len(), error = %e, "section upsert failed");
            }
        }
        WriteMessage::UpsertLsaTitle(row) => {
            if let Err(e) = repo.upsert_lsa_title(&row) {
                error!(title = %row.title, error = %e, "title lsa upsert failed");
            }
        }
        WriteMessage::UpsertAgencyLsa(rows) => {
            if let Err(e) = repo.upsert_agency_lsa(&rows) {
                error!(rows = rows.len(), error = %e, "agency lsa upsert failed");
            }
        }
        WriteMessage::ReplaceAgencies(root, ack) => {
            let result = repo.replace_agencies(&root);
            if let Err(e) = &result {
                error!(error = %e, "agency replace failed");
            }
            let _ = ack.send(result);
        }
        WriteMessage::UpsertSummaries(rows) => {
            if let Err(e) = repo.upsert_summaries(&rows) {
                error!(rows = rows.len(), error = %e, "summary upsert failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{spawn_writer, WriterHandle};
    use crate::repo::SqliteRepo;
    use ecfr_atlas_model::{AgencyNode, AgencyRoot, Section};
    use tempfile::tempdir;
    use tokio::sync::watch;

    fn section(id: &str, words: u32) -> Section {
        Section {
            id: id.to_string(),
            title: "40".to_string(),
            chapter: "I".to_string(),
            text: "text".to_string(),
            rev_date: None,
            checksum: format!("{words:064x}"),
            word_count: words,
            def_count: 0,
            xref_count: 0,
            modal_count: 0,
            rscs_raw: words,
            rscs_per_1k: 1000.0,
            snapshot_date: "2024-01-01".to_string(),
        }
    }

    async fn drain(handle: WriterHandle, join: tokio::task::JoinHandle<()>) {
        drop(handle);
        join.await.expect("writer join");
    }

    #[tokio::test]
    async fn same_key_upserts_apply_in_send_order() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("atlas.db");
        let repo = SqliteRepo::open(&path).expect("repo");
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let (handle, join) = spawn_writer(repo, 8, cancel_rx);

        handle
            .upsert_sections(vec![section("§ 40.1", 100)])
            .await
            .expect("send a");
        handle
            .upsert_sections(vec![section("§ 40.1", 110)])
            .await
            .expect("send b");
        drain(handle, join).await;

        let check = SqliteRepo::open(&path).expect("reopen");
        assert_eq!(check.section_count().expect("count"), 1);
        assert_eq!(check.section_word_count("§ 40.1").expect("get"), Some(110));
    }

    #[tokio::test]
    async fn replace_agencies_acks_after_commit() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("atlas.db");
        let repo = SqliteRepo::open(&path).expect("repo");
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let (handle, join) = spawn_writer(repo, 8, cancel_rx);

        let root = AgencyRoot {
            agencies: vec![AgencyNode {
                name: "EPA".into(),
                short_name: String::new(),
                display_name: String::new(),
                sortable_name: String::new(),
                slug: "epa".into(),
                children: Vec::new(),
                cfr_references: Vec::new(),
            }],
        };
        handle.replace_agencies(root).await.expect("replace acked");

        // The ack means a concurrent reader sees the committed forest.
        let check = SqliteRepo::open(&path).expect("reopen");
        assert_eq!(check.agency_count().expect("agencies"), 1);
        drain(handle, join).await;
    }

    #[tokio::test]
    async fn cancellation_unblocks_senders() {
        let dir = tempdir().expect("tempdir");
        let repo = SqliteRepo::open(&dir.path().join("atlas.db")).expect("repo");
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (handle, join) = spawn_writer(repo, 8, cancel_rx);

        cancel_tx.send(true).expect("cancel");
        // An in-flight send after cancellation resolves instead of
        // blocking; either outcome ends the run cleanly.
        let res = handle.upsert_sections(vec![section("§ 1.1", 1)]).await;
        if let Err(e) = res {
            assert!(e.is_cancelled());
        }
        drain(handle, join).await;
    }

    #[tokio::test]
    async fn queue_close_drains_buffered_messages() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("atlas.db");
        let repo = SqliteRepo::open(&path).expect("repo");
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let (handle, join) = spawn_writer(repo, 100, cancel_rx);

        for i in 0..25 {
            handle
                .upsert_sections(vec![section(&format!("§ 1.{i}"), i)])
                .await
                .expect("send");
        }
        drain(handle, join).await;

        let check = SqliteRepo::open(&path).expect("reopen");
        assert_eq!(check.section_count().expect("count"), 25);
    }
}
