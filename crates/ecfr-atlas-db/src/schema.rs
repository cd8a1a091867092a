// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use rusqlite::Connection;

use ecfr_atlas_core::{EtlError, EtlErrorCode, Result};

const PRAGMAS: &str = "
    PRAGMA journal_mode=WAL;
    PRAGMA synchronous=NORMAL;
    PRAGMA temp_store=MEMORY;
    PRAGMA cache_size=-32000;
";

/// `sections` caches only the latest snapshot per section id; the archive
/// owns history. `agency_id` holds the raw chapter label, not a foreign
/// key, because the agency join runs on `(title, chapter)`.
const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sections (
        id            TEXT PRIMARY KEY,
        title         TEXT NOT NULL,
        agency_id     TEXT NOT NULL,
        text          TEXT NOT NULL,
        rev_date      TEXT,
        checksum      TEXT NOT NULL,
        word_count    INTEGER NOT NULL,
        def_count     INTEGER NOT NULL,
        xref_count    INTEGER NOT NULL,
        modal_count   INTEGER NOT NULL,
        rscs_raw      INTEGER NOT NULL,
        rscs_per_1k   REAL NOT NULL,
        snapshot_date TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sections_title_chapter ON sections(title, agency_id);

    CREATE TABLE IF NOT EXISTS agencies (
        id            TEXT PRIMARY KEY,
        name          TEXT NOT NULL,
        short_name    TEXT,
        sortable_name TEXT,
        parent_id     TEXT,
        FOREIGN KEY(parent_id) REFERENCES agencies(id)
    );

    CREATE TABLE IF NOT EXISTS agency_cfr_references (
        agency_id TEXT NOT NULL,
        title     INTEGER NOT NULL,
        chapter   TEXT NOT NULL,
        FOREIGN KEY (agency_id) REFERENCES agencies(id)
    );
    CREATE INDEX IF NOT EXISTS idx_acr_title_chapter ON agency_cfr_references(title, chapter);
    CREATE INDEX IF NOT EXISTS idx_acr_agency ON agency_cfr_references(agency_id);

    CREATE TABLE IF NOT EXISTS lsa_activity (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        title         TEXT NOT NULL,
        snapshot_date TEXT NOT NULL,
        proposals     INTEGER NOT NULL DEFAULT 0,
        amendments    INTEGER NOT NULL DEFAULT 0,
        finals        INTEGER NOT NULL DEFAULT 0,
        captured_at   TEXT,
        source_hint   TEXT,
        UNIQUE(title, snapshot_date)
    );
    CREATE INDEX IF NOT EXISTS idx_lsa_title ON lsa_activity(title);

    CREATE TABLE IF NOT EXISTS agency_lsa (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        agency_id       TEXT NOT NULL,
        agency_name     TEXT NOT NULL,
        proposed_rules  INTEGER NOT NULL DEFAULT 0,
        final_rules     INTEGER NOT NULL DEFAULT 0,
        notices         INTEGER NOT NULL DEFAULT 0,
        total_documents INTEGER NOT NULL DEFAULT 0,
        snapshot_date   TEXT NOT NULL,
        captured_at     TEXT,
        source_hint     TEXT,
        UNIQUE(agency_id, snapshot_date)
    );
    CREATE INDEX IF NOT EXISTS idx_agency_lsa_agency ON agency_lsa(agency_id);
    CREATE INDEX IF NOT EXISTS idx_agency_lsa_snapshot ON agency_lsa(snapshot_date);

    CREATE TABLE IF NOT EXISTS summaries (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        kind       TEXT NOT NULL DEFAULT 'title',
        key        TEXT NOT NULL,
        text       TEXT NOT NULL,
        model      TEXT,
        created_at TEXT,
        UNIQUE(kind, key)
    );
    CREATE INDEX IF NOT EXISTS idx_summaries_kind_key ON summaries(kind, key);
";

pub(crate) fn db_err(e: impl std::fmt::Display) -> EtlError {
    EtlError::new(EtlErrorCode::Persistence, e.to_string())
}

pub(crate) fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path).map_err(db_err)?;
    init_connection(&conn)?;
    Ok(conn)
}

pub(crate) fn init_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(PRAGMAS).map_err(db_err)?;
    conn.execute_batch(SCHEMA).map_err(db_err)?;
    Ok(())
}
