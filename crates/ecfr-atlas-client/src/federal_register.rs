// SPDX-License-Identifier: Apache-2.0

//! Federal Register activity counts (the LSA collector's upstream).
//!
//! Two shapes: per-Title document counts since the Title's last amendment,
//! and a per-agency faceted batch over the trailing 30 days. A failed type
//! query degrades to a zero count rather than aborting the snapshot;
//! downstream joins simply see zeros.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use tracing::warn;

use ecfr_atlas_core::{EtlError, EtlErrorCode, Result, SnapshotDate};
use ecfr_atlas_model::{AgencyLsa, LsaActivity, Title};

pub const DOC_TYPE_PROPOSED: &str = "PRORULE";
pub const DOC_TYPE_FINAL: &str = "RULE";
pub const DOC_TYPE_NOTICE: &str = "NOTICE";

const SOURCE_HINT_TITLE: &str = "federalregister-api";
const SOURCE_HINT_BATCH: &str = "federalregister-api-batch";
const BATCH_WINDOW_DAYS: u64 = 30;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(serde::Deserialize)]
struct CountResponse {
    #[serde(default)]
    count: u64,
}

pub struct FederalRegisterClient {
    base_url: String,
    client: reqwest::Client,
}

impl FederalRegisterClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// `agency_slug -> count` of documents of `doc_type` published inside
    /// the window, from the agency facet endpoint.
    pub async fn facet_counts_by_agency(
        &self,
        doc_type: &str,
        gte: NaiveDate,
        lte: NaiveDate,
    ) -> Result<BTreeMap<String, u64>> {
        let url = format!("{}/documents/facets/agency", self.base_url);
        let gte = gte.to_string();
        let lte = lte.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("conditions[type][]", doc_type),
                ("conditions[publication_date][gte]", gte.as_str()),
                ("conditions[publication_date][lte]", lte.as_str()),
            ])
            .send()
            .await
            .map_err(|e| EtlError::new(EtlErrorCode::Transient, format!("GET {url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(EtlError::new(
                EtlErrorCode::Transient,
                format!("facets {doc_type}: status {}", resp.status()),
            ));
        }
        resp.json::<BTreeMap<String, u64>>()
            .await
            .map_err(|e| EtlError::new(EtlErrorCode::InvalidData, format!("facets body: {e}")))
    }

    /// Count of documents of `doc_type` touching a CFR Title inside the
    /// window. `per_page=1` because only the total matters.
    pub async fn title_document_count(
        &self,
        title_number: u16,
        doc_type: &str,
        gte: NaiveDate,
        lte: NaiveDate,
    ) -> Result<u64> {
        let url = format!("{}/documents.json", self.base_url);
        let title = title_number.to_string();
        let gte = gte.to_string();
        let lte = lte.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("conditions[cfr][title]", title.as_str()),
                ("conditions[type][]", doc_type),
                ("conditions[publication_date][gte]", gte.as_str()),
                ("conditions[publication_date][lte]", lte.as_str()),
                ("per_page", "1"),
            ])
            .send()
            .await
            .map_err(|e| EtlError::new(EtlErrorCode::Transient, format!("GET {url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(EtlError::new(
                EtlErrorCode::Transient,
                format!("documents {doc_type}: status {}", resp.status()),
            ));
        }
        resp.json::<CountResponse>()
            .await
            .map(|c| c.count)
            .map_err(|e| EtlError::new(EtlErrorCode::InvalidData, format!("documents body: {e}")))
    }

    /// Title-mode collection: counts since the Title's last amendment, or
    /// the trailing 30 days when the amendment date is unknown.
    pub async fn collect_for_title(&self, title: &Title, snapshot: SnapshotDate) -> LsaActivity {
        let today = Utc::now().date_naive();
        let since = title
            .latest_amended_on
            .unwrap_or_else(|| today.checked_sub_days(Days::new(BATCH_WINDOW_DAYS)).unwrap_or(today));

        let n = title.number;
        let proposals = self.zero_on_error(n, DOC_TYPE_PROPOSED, since, today).await;
        let amendments = self.zero_on_error(n, DOC_TYPE_NOTICE, since, today).await;
        let finals = self.zero_on_error(n, DOC_TYPE_FINAL, since, today).await;

        LsaActivity {
            title: title.id().key(),
            snapshot_date: snapshot.to_string(),
            proposals,
            amendments,
            finals,
            captured_at: Utc::now(),
            source_hint: SOURCE_HINT_TITLE.to_string(),
        }
    }

    async fn zero_on_error(&self, title: u16, doc_type: &str, gte: NaiveDate, lte: NaiveDate) -> u64 {
        match self.title_document_count(title, doc_type, gte, lte).await {
            Ok(count) => count,
            Err(e) => {
                warn!(title, doc_type, error = %e, "title activity query degraded to zero");
                0
            }
        }
    }

    /// Agency-mode batch: one faceted query per document type over the
    /// trailing 30 days, slugs unioned across the three maps.
    pub async fn collect_agency_batch(&self, snapshot: SnapshotDate) -> Vec<AgencyLsa> {
        let today = Utc::now().date_naive();
        let since = today
            .checked_sub_days(Days::new(BATCH_WINDOW_DAYS))
            .unwrap_or(today);

        let proposed = self.facets_or_empty(DOC_TYPE_PROPOSED, since, today).await;
        let finals = self.facets_or_empty(DOC_TYPE_FINAL, since, today).await;
        let notices = self.facets_or_empty(DOC_TYPE_NOTICE, since, today).await;

        let slugs: BTreeSet<&String> = proposed
            .keys()
            .chain(finals.keys())
            .chain(notices.keys())
            .collect();

        let captured_at = Utc::now();
        slugs
            .into_iter()
            .map(|slug| {
                let p = proposed.get(slug).copied().unwrap_or(0);
                let f = finals.get(slug).copied().unwrap_or(0);
                let n = notices.get(slug).copied().unwrap_or(0);
                AgencyLsa {
                    agency_id: slug.clone(),
                    agency_name: slug.clone(),
                    proposed_rules: p,
                    final_rules: f,
                    notices: n,
                    total_documents: p + f + n,
                    snapshot_date: snapshot.to_string(),
                    captured_at,
                    source_hint: SOURCE_HINT_BATCH.to_string(),
                }
            })
            .collect()
    }

    async fn facets_or_empty(
        &self,
        doc_type: &str,
        gte: NaiveDate,
        lte: NaiveDate,
    ) -> BTreeMap<String, u64> {
        match self.facet_counts_by_agency(doc_type, gte, lte).await {
            Ok(map) => map,
            Err(e) => {
                warn!(doc_type, error = %e, "agency facet query degraded to empty");
                BTreeMap::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn snap() -> SnapshotDate {
        SnapshotDate::parse("2024-01-01").expect("date")
    }

    #[tokio::test]
    async fn agency_batch_unions_slugs_across_types() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/facets/agency"))
            .and(query_param("conditions[type][]", "PRORULE"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"epa": 2, "fda": 1})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/documents/facets/agency"))
            .and(query_param("conditions[type][]", "RULE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"epa": 3})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/documents/facets/agency"))
            .and(query_param("conditions[type][]", "NOTICE"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"usda": 5})),
            )
            .mount(&server)
            .await;

        let client = FederalRegisterClient::new(server.uri());
        let rows = client.collect_agency_batch(snap()).await;
        assert_eq!(rows.len(), 3);

        let epa = rows.iter().find(|r| r.agency_id == "epa").expect("epa row");
        assert_eq!(epa.proposed_rules, 2);
        assert_eq!(epa.final_rules, 3);
        assert_eq!(epa.notices, 0);
        assert_eq!(epa.total_documents, 5);
        assert_eq!(epa.source_hint, "federalregister-api-batch");

        let usda = rows.iter().find(|r| r.agency_id == "usda").expect("usda row");
        assert_eq!(usda.total_documents, 5);
    }

    #[tokio::test]
    async fn failed_type_query_degrades_to_zero_counts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/facets/agency"))
            .and(query_param("conditions[type][]", "PRORULE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"epa": 4})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/documents/facets/agency"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = FederalRegisterClient::new(server.uri());
        let rows = client.collect_agency_batch(snap()).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].agency_id, "epa");
        assert_eq!(rows[0].proposed_rules, 4);
        assert_eq!(rows[0].final_rules, 0);
        assert_eq!(rows[0].notices, 0);
        assert_eq!(rows[0].total_documents, 4);
    }

    #[tokio::test]
    async fn title_mode_reads_the_count_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents.json"))
            .and(query_param("conditions[cfr][title]", "40"))
            .and(query_param("per_page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"count": 7, "results": []})),
            )
            .mount(&server)
            .await;

        let client = FederalRegisterClient::new(server.uri());
        let title = Title {
            number: 40,
            name: "Title 40".to_string(),
            latest_amended_on: chrono::NaiveDate::from_ymd_opt(2023, 11, 1),
        };
        let activity = client.collect_for_title(&title, snap()).await;
        assert_eq!(activity.title, "40");
        assert_eq!(activity.proposals, 7);
        assert_eq!(activity.amendments, 7);
        assert_eq!(activity.finals, 7);
        assert_eq!(activity.source_hint, "federalregister-api");
        assert_eq!(activity.snapshot_date, "2024-01-01");
    }

    #[tokio::test]
    async fn title_mode_swallows_a_dead_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = FederalRegisterClient::new(server.uri());
        let title = Title {
            number: 12,
            name: "Title 12".to_string(),
            latest_amended_on: None,
        };
        let activity = client.collect_for_title(&title, snap()).await;
        assert_eq!(activity.proposals, 0);
        assert_eq!(activity.amendments, 0);
        assert_eq!(activity.finals, 0);
    }
}
