// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use rusqlite::{params, Connection, Transaction};

use ecfr_atlas_core::Result;
use ecfr_atlas_model::{
    AgencyLsa, AgencyMetric, AgencyNode, AgencyRoot, LsaActivity, Section, Summary,
};

use crate::schema::{db_err, init_connection, open_db};

/// One agency per `agencies` row; `agency_cfr_references` holds the N:N
/// `(title, chapter)` pairs; the aggregation joins those onto the section
/// cache. Every batch method runs inside a single transaction.
pub struct SqliteRepo {
    conn: Connection,
}

const AGENCY_TOTALS_SQL: &str = "
    WITH agency_title_words AS (
        SELECT
            acr.agency_id,
            acr.title,
            COALESCE(SUM(s.word_count), 0) AS title_words
        FROM agency_cfr_references acr
        LEFT JOIN sections s
            ON s.title = CAST(acr.title AS TEXT)
            AND s.agency_id = acr.chapter
        GROUP BY acr.agency_id, acr.title
    ),
    agency_totals AS (
        SELECT agency_id, SUM(title_words) AS total_words
        FROM agency_title_words
        GROUP BY agency_id
    ),
    latest_agency_lsa AS (
        SELECT agency_id, total_documents
        FROM agency_lsa
        WHERE snapshot_date = (SELECT MAX(snapshot_date) FROM agency_lsa)
    )
    SELECT
        a.id,
        a.name,
        a.parent_id,
        COALESCE(at.total_words, 0) AS total_words,
        COALESCE(rscs.avg_rscs, 0) AS avg_rscs,
        COALESCE(lsa.total_documents, 0) AS lsa_counts
    FROM agencies a
    LEFT JOIN agency_totals at ON at.agency_id = a.id
    LEFT JOIN latest_agency_lsa lsa ON lsa.agency_id = a.id
    LEFT JOIN (
        SELECT
            acr.agency_id,
            AVG(s.rscs_per_1k) AS avg_rscs
        FROM agency_cfr_references acr
        LEFT JOIN sections s
            ON s.title = CAST(acr.title AS TEXT)
            AND s.agency_id = acr.chapter
        GROUP BY acr.agency_id
    ) rscs ON rscs.agency_id = a.id
    ORDER BY total_words DESC
";

/// Title-filtered variant. LSA counts stay agency-scoped; the filter
/// narrows words and RSCS only, and drops agencies with no words under
/// the filtered Title.
const AGENCY_TOTALS_BY_TITLE_SQL: &str = "
    WITH agency_title_words AS (
        SELECT
            acr.agency_id,
            acr.title,
            COALESCE(SUM(s.word_count), 0) AS title_words
        FROM agency_cfr_references acr
        LEFT JOIN sections s
            ON s.title = CAST(acr.title AS TEXT)
            AND s.agency_id = acr.chapter
        WHERE acr.title = CAST(?1 AS INTEGER)
        GROUP BY acr.agency_id, acr.title
    ),
    agency_totals AS (
        SELECT agency_id, SUM(title_words) AS total_words
        FROM agency_title_words
        GROUP BY agency_id
    ),
    latest_agency_lsa AS (
        SELECT agency_id, total_documents
        FROM agency_lsa
        WHERE snapshot_date = (SELECT MAX(snapshot_date) FROM agency_lsa)
    )
    SELECT
        a.id,
        a.name,
        a.parent_id,
        COALESCE(at.total_words, 0) AS total_words,
        COALESCE(rscs.avg_rscs, 0) AS avg_rscs,
        COALESCE(lsa.total_documents, 0) AS lsa_counts
    FROM agencies a
    LEFT JOIN agency_totals at ON at.agency_id = a.id
    LEFT JOIN latest_agency_lsa lsa ON lsa.agency_id = a.id
    LEFT JOIN (
        SELECT
            acr.agency_id,
            AVG(s.rscs_per_1k) AS avg_rscs
        FROM agency_cfr_references acr
        LEFT JOIN sections s
            ON s.title = CAST(acr.title AS TEXT)
            AND s.agency_id = acr.chapter
        WHERE acr.title = CAST(?2 AS INTEGER)
        GROUP BY acr.agency_id
    ) rscs ON rscs.agency_id = a.id
    WHERE at.total_words > 0
    ORDER BY total_words DESC
";

impl SqliteRepo {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        init_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn upsert_sections(&mut self, rows: &[Section]) -> Result<()> {
        let tx = self.conn.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR REPLACE INTO sections (
                        id, title, agency_id, text, rev_date, checksum,
                        word_count, def_count, xref_count, modal_count,
                        rscs_raw, rscs_per_1k, snapshot_date
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                )
                .map_err(db_err)?;
            for s in rows {
                stmt.execute(params![
                    s.id,
                    s.title,
                    s.chapter,
                    s.text,
                    s.rev_date.map(|d| d.to_string()),
                    s.checksum,
                    s.word_count,
                    s.def_count,
                    s.xref_count,
                    s.modal_count,
                    s.rscs_raw,
                    s.rscs_per_1k,
                    s.snapshot_date,
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)
    }

    pub fn upsert_lsa_title(&mut self, row: &LsaActivity) -> Result<()> {
        let tx = self.conn.transaction().map_err(db_err)?;
        tx.execute(
            "INSERT OR REPLACE INTO lsa_activity
                (title, snapshot_date, proposals, amendments, finals, captured_at, source_hint)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.title,
                row.snapshot_date,
                row.proposals as i64,
                row.amendments as i64,
                row.finals as i64,
                row.captured_at.to_rfc3339(),
                row.source_hint,
            ],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)
    }

    pub fn upsert_agency_lsa(&mut self, rows: &[AgencyLsa]) -> Result<()> {
        let tx = self.conn.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR REPLACE INTO agency_lsa
                        (agency_id, agency_name, proposed_rules, final_rules, notices,
                         total_documents, snapshot_date, captured_at, source_hint)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .map_err(db_err)?;
            for r in rows {
                stmt.execute(params![
                    r.agency_id,
                    r.agency_name,
                    r.proposed_rules as i64,
                    r.final_rules as i64,
                    r.notices as i64,
                    r.total_documents as i64,
                    r.snapshot_date,
                    r.captured_at.to_rfc3339(),
                    r.source_hint,
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)
    }

    /// Truncate and reinsert the agency forest, depth-first, in one
    /// transaction. References go first on delete (FK order) and each
    /// node's references are inserted with the node.
    pub fn replace_agencies(&mut self, root: &AgencyRoot) -> Result<()> {
        let tx = self.conn.transaction().map_err(db_err)?;
        tx.execute("DELETE FROM agency_cfr_references", [])
            .map_err(db_err)?;
        tx.execute("DELETE FROM agencies", []).map_err(db_err)?;
        for node in &root.agencies {
            insert_agency_tree(&tx, node, None)?;
        }
        tx.commit().map_err(db_err)
    }

    pub fn upsert_summaries(&mut self, rows: &[Summary]) -> Result<()> {
        let tx = self.conn.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR REPLACE INTO summaries (kind, key, text, model, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(db_err)?;
            for s in rows {
                stmt.execute(params![
                    s.kind.as_str(),
                    s.key,
                    s.text,
                    s.model,
                    s.created_at.to_rfc3339(),
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)
    }

    /// Per-agency totals: words and average RSCS through the
    /// `(title, chapter)` join, latest LSA document counts, descending by
    /// total words. Agencies without sections still appear (zeroed)
    /// unless a Title filter narrows the output.
    pub fn agency_totals(&self, title_filter: Option<&str>) -> Result<Vec<AgencyMetric>> {
        match title_filter {
            Some(title) if !title.is_empty() => {
                let stmt = self
                    .conn
                    .prepare(AGENCY_TOTALS_BY_TITLE_SQL)
                    .map_err(db_err)?;
                collect_metrics(stmt, &[&title, &title])
            }
            _ => {
                let stmt = self.conn.prepare(AGENCY_TOTALS_SQL).map_err(db_err)?;
                collect_metrics(stmt, &[])
            }
        }
    }

    // Read-side helpers for operators and tests.

    pub fn section_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM sections", [], |row| row.get(0))
            .map_err(db_err)
    }

    pub fn agency_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM agencies", [], |row| row.get(0))
            .map_err(db_err)
    }

    pub fn cfr_reference_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM agency_cfr_references", [], |row| {
                row.get(0)
            })
            .map_err(db_err)
    }

    pub fn section_word_count(&self, id: &str) -> Result<Option<i64>> {
        use rusqlite::OptionalExtension;
        self.conn
            .query_row(
                "SELECT word_count FROM sections WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
    }
}

fn collect_metrics(
    mut stmt: rusqlite::Statement<'_>,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<AgencyMetric>> {
    let rows = stmt
        .query_map(params, |row| {
            Ok(AgencyMetric {
                id: row.get(0)?,
                name: row.get(1)?,
                parent_id: row.get(2)?,
                total_words: row.get(3)?,
                avg_rscs: row.get(4)?,
                lsa_counts: row.get(5)?,
            })
        })
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

fn insert_agency_tree(tx: &Transaction<'_>, node: &AgencyNode, parent: Option<&str>) -> Result<()> {
    tx.execute(
        "INSERT INTO agencies (id, name, short_name, sortable_name, parent_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            node.slug,
            node.stored_name(),
            node.short_name,
            node.sortable_name,
            parent,
        ],
    )
    .map_err(db_err)?;

    // No conflict clause: duplicate (title, chapter) pairs across agencies
    // are the expected N:N shape.
    for r in &node.cfr_references {
        tx.execute(
            "INSERT INTO agency_cfr_references (agency_id, title, chapter)
             VALUES (?1, ?2, ?3)",
            params![node.slug, r.title, r.chapter],
        )
        .map_err(db_err)?;
    }

    for child in &node.children {
        insert_agency_tree(tx, child, Some(&node.slug))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::SqliteRepo;
    use chrono::Utc;
    use ecfr_atlas_model::{
        AgencyLsa, AgencyNode, AgencyRoot, CfrReference, LsaActivity, Section, Summary, SummaryKind,
    };

    fn section(id: &str, title: &str, chapter: &str, words: u32, rscs: f64) -> Section {
        Section {
            id: id.to_string(),
            title: title.to_string(),
            chapter: chapter.to_string(),
            text: "text".to_string(),
            rev_date: None,
            checksum: "c".repeat(64),
            word_count: words,
            def_count: 0,
            xref_count: 0,
            modal_count: 0,
            rscs_raw: words,
            rscs_per_1k: rscs,
            snapshot_date: "2024-01-01".to_string(),
        }
    }

    fn epa_root() -> AgencyRoot {
        AgencyRoot {
            agencies: vec![AgencyNode {
                name: "Environmental Protection Agency".into(),
                short_name: "EPA".into(),
                display_name: String::new(),
                sortable_name: "environmental-protection-agency".into(),
                slug: "epa".into(),
                children: vec![AgencyNode {
                    name: "Office of Water".into(),
                    short_name: String::new(),
                    display_name: String::new(),
                    sortable_name: String::new(),
                    slug: "office-of-water".into(),
                    children: Vec::new(),
                    cfr_references: Vec::new(),
                }],
                cfr_references: vec![CfrReference {
                    title: 40,
                    chapter: "I".into(),
                }],
            }],
        }
    }

    #[test]
    fn section_upsert_replaces_on_conflict() {
        let mut repo = SqliteRepo::open_in_memory().expect("repo");
        repo.upsert_sections(&[section("§ 40.1", "40", "I", 100, 5.0)])
            .expect("first");
        repo.upsert_sections(&[section("§ 40.1", "40", "I", 110, 6.0)])
            .expect("second");
        assert_eq!(repo.section_count().expect("count"), 1);
        assert_eq!(repo.section_word_count("§ 40.1").expect("get"), Some(110));
    }

    #[test]
    fn replace_agencies_rebuilds_the_forest_with_parents() {
        let mut repo = SqliteRepo::open_in_memory().expect("repo");
        repo.replace_agencies(&epa_root()).expect("first load");
        repo.replace_agencies(&epa_root()).expect("reload");
        assert_eq!(repo.agency_count().expect("agencies"), 2);
        assert_eq!(repo.cfr_reference_count().expect("refs"), 1);

        let metrics = repo.agency_totals(None).expect("totals");
        let child = metrics
            .iter()
            .find(|m| m.id == "office-of-water")
            .expect("child row");
        assert_eq!(child.parent_id.as_deref(), Some("epa"));
    }

    #[test]
    fn agency_totals_joins_words_rscs_and_lsa() {
        let mut repo = SqliteRepo::open_in_memory().expect("repo");
        repo.replace_agencies(&epa_root()).expect("agencies");
        repo.upsert_sections(&[
            section("§ 40.1", "40", "I", 100, 5.0),
            section("§ 40.2", "40", "I", 23, 10.0),
            section("§ 7.1", "7", "II", 999, 50.0),
        ])
        .expect("sections");
        repo.upsert_agency_lsa(&[AgencyLsa {
            agency_id: "epa".into(),
            agency_name: "Environmental Protection Agency".into(),
            proposed_rules: 1,
            final_rules: 2,
            notices: 3,
            total_documents: 6,
            snapshot_date: "2024-01-01".into(),
            captured_at: Utc::now(),
            source_hint: "federalregister-api-batch".into(),
        }])
        .expect("lsa");

        let metrics = repo.agency_totals(None).expect("totals");
        let epa = metrics.iter().find(|m| m.id == "epa").expect("epa row");
        assert_eq!(epa.total_words, 123);
        assert!((epa.avg_rscs - 7.5).abs() < 1e-9);
        assert_eq!(epa.lsa_counts, 6);

        // Agencies without matching sections still appear, zeroed.
        let child = metrics
            .iter()
            .find(|m| m.id == "office-of-water")
            .expect("child row");
        assert_eq!(child.total_words, 0);
        assert_eq!(child.lsa_counts, 0);

        // Ordered by total words descending.
        assert_eq!(metrics[0].id, "epa");
    }

    #[test]
    fn title_filter_narrows_words_and_drops_zero_rows() {
        let mut repo = SqliteRepo::open_in_memory().expect("repo");
        repo.replace_agencies(&epa_root()).expect("agencies");
        repo.upsert_sections(&[section("§ 40.1", "40", "I", 100, 5.0)])
            .expect("sections");

        let hit = repo.agency_totals(Some("40")).expect("filtered");
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].id, "epa");
        assert_eq!(hit[0].total_words, 100);

        let miss = repo.agency_totals(Some("7")).expect("filtered miss");
        assert!(miss.is_empty());
    }

    #[test]
    fn lsa_rows_are_unique_on_their_natural_keys() {
        let mut repo = SqliteRepo::open_in_memory().expect("repo");
        let mut row = LsaActivity {
            title: "40".into(),
            snapshot_date: "2024-01-01".into(),
            proposals: 1,
            amendments: 2,
            finals: 3,
            captured_at: Utc::now(),
            source_hint: "federalregister-api".into(),
        };
        repo.upsert_lsa_title(&row).expect("first");
        row.proposals = 9;
        repo.upsert_lsa_title(&row).expect("second");

        let count: i64 = repo
            .conn
            .query_row("SELECT COUNT(*) FROM lsa_activity", [], |r| r.get(0))
            .expect("count");
        assert_eq!(count, 1);
        let proposals: i64 = repo
            .conn
            .query_row(
                "SELECT proposals FROM lsa_activity WHERE title='40'",
                [],
                |r| r.get(0),
            )
            .expect("proposals");
        assert_eq!(proposals, 9);
    }

    #[test]
    fn summaries_upsert_on_kind_and_key() {
        let mut repo = SqliteRepo::open_in_memory().expect("repo");
        let summary = |text: &str| Summary {
            kind: SummaryKind::Title,
            key: "40".into(),
            text: text.into(),
            model: "external".into(),
            created_at: Utc::now(),
        };
        repo.upsert_summaries(&[summary("v1")]).expect("first");
        repo.upsert_summaries(&[summary("v2")]).expect("second");
        let text: String = repo
            .conn
            .query_row(
                "SELECT text FROM summaries WHERE kind='title' AND key='40'",
                [],
                |r| r.get(0),
            )
            .expect("text");
        assert_eq!(text, "v2");
    }
}
