// SPDX-License-Identifier: Apache-2.0

//! Bulk-data XML fetcher.
//!
//! Title documents live at the predictable path
//! `{base}/title-{n}/ECFR-title{n}.xml`. The fetched object is cached in
//! the raw store under `{prefix}/ECFR-title{n}.xml`; an existing object is
//! reused without touching the upstream. No retries here: reruns of the
//! same snapshot are the recovery path.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, info};

use ecfr_atlas_core::{EtlError, EtlErrorCode, Result};
use ecfr_atlas_model::{raw_title_object, TitleId};
use ecfr_atlas_store::ObjectStore;

const FETCH_TIMEOUT: Duration = Duration::from_secs(600);
const ERROR_BODY_LIMIT: usize = 1024;

pub struct BulkDataClient {
    base_url: String,
    raw_store: Arc<dyn ObjectStore>,
    raw_prefix: String,
    client: reqwest::Client,
}

impl BulkDataClient {
    pub fn new(
        base_url: impl Into<String>,
        raw_store: Arc<dyn ObjectStore>,
        raw_prefix: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            raw_store,
            raw_prefix: raw_prefix.into(),
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    #[must_use]
    pub fn raw_object_key(&self, title: TitleId) -> String {
        raw_title_object(&self.raw_prefix, title)
    }

    /// Fetch one Title XML into the raw store and return its object key.
    ///
    /// 404 maps to `not_found` (several of the 50 Titles are reserved);
    /// other non-2xx statuses map to `transient` carrying the status and a
    /// truncated body for diagnostics.
    pub async fn fetch_title_xml(&self, title: TitleId) -> Result<String> {
        let key = self.raw_object_key(title);
        if self.raw_store.exists(&key).await? {
            debug!(title = %title, key = %key, "raw object already present, skipping fetch");
            return Ok(key);
        }

        let n = title.number();
        let url = format!("{}/title-{n}/ECFR-title{n}.xml", self.base_url);
        info!(title = %title, url = %url, "fetching title xml");

        let mut resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EtlError::new(EtlErrorCode::Transient, format!("GET {url}: {e}")))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Err(EtlError::not_found(format!("title {title} absent upstream"))),
            status if status.is_success() => {
                let mut body = Vec::new();
                while let Some(chunk) = resp.chunk().await.map_err(|e| {
                    EtlError::new(EtlErrorCode::Transient, format!("streaming {url}: {e}"))
                })? {
                    body.extend_from_slice(&chunk);
                }
                // A failed put never leaves a readable partial object; the
                // store commits whole objects only.
                self.raw_store.put(&key, &body).await?;
                Ok(key)
            }
            status => {
                let body = resp.bytes().await.unwrap_or_default();
                let sample = String::from_utf8_lossy(&body[..body.len().min(ERROR_BODY_LIMIT)])
                    .into_owned();
                Err(EtlError::new(
                    EtlErrorCode::Transient,
                    format!("GET {url}: status {status}, body: {sample:?}"),
                ))
            }
        }
    }

    /// Drop the cached raw object so the next fetch hits the upstream.
    /// Used after a parse failure on a cached document.
    pub async fn evict(&self, title: TitleId) -> Result<()> {
        self.raw_store.delete(&self.raw_object_key(title)).await
    }
}
