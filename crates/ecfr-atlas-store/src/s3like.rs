// SPDX-License-Identifier: Apache-2.0

use std::io::{BufRead, Cursor};
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;

use ecfr_atlas_core::{EtlError, EtlErrorCode, Result};

use crate::object_store::ObjectStore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Production backend speaking the S3-compatible HTTP surface: GET/PUT/
/// HEAD/DELETE per object, ListObjectsV2 with a `/` delimiter for prefix
/// discovery. A single PUT is the whole-object commit.
pub struct S3LikeStore {
    base_url: String,
    auth_bearer: Option<String>,
    allow_private_hosts: bool,
    client: reqwest::Client,
}

impl S3LikeStore {
    #[must_use]
    pub fn new(base_url: String, auth_bearer: Option<String>, allow_private_hosts: bool) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_bearer,
            allow_private_hosts,
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{key}", self.base_url)
    }

    fn validate_url(&self, url: &str) -> Result<()> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| EtlError::new(EtlErrorCode::InvalidData, format!("invalid store url: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| EtlError::new(EtlErrorCode::InvalidData, "store url missing host"))?
            .to_ascii_lowercase();
        if self.allow_private_hosts {
            return Ok(());
        }
        if host == "localhost" || host.ends_with(".localhost") {
            return Err(EtlError::new(
                EtlErrorCode::InvalidData,
                "blocked store host: localhost",
            ));
        }
        if let Ok(ip) = host.parse::<IpAddr>() {
            let private = match ip {
                IpAddr::V4(v4) => {
                    v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_broadcast()
                }
                IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified() || v6.is_unique_local(),
            };
            if private {
                return Err(EtlError::new(
                    EtlErrorCode::InvalidData,
                    "blocked private store host",
                ));
            }
        }
        Ok(())
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.auth_bearer {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                EtlError::new(EtlErrorCode::InvalidData, format!("invalid auth header: {e}"))
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

fn network_err(context: &str, e: impl std::fmt::Display) -> EtlError {
    EtlError::new(EtlErrorCode::Transient, format!("{context}: {e}"))
}

#[async_trait]
impl ObjectStore for S3LikeStore {
    fn backend_tag(&self) -> &'static str {
        "http_s3"
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.object_url(key);
        self.validate_url(&url)?;
        let resp = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(|e| network_err("store get", e))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(EtlError::not_found(format!("object absent: {key}"))),
            status if status.is_success() => resp
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| network_err("store get body", e)),
            status => Err(EtlError::new(
                EtlErrorCode::Transient,
                format!("store get {key}: status {status}"),
            )),
        }
    }

    async fn get_reader(&self, key: &str) -> Result<Box<dyn BufRead + Send>> {
        let bytes = self.get(key).await?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let url = self.object_url(key);
        self.validate_url(&url)?;
        let resp = self
            .client
            .put(&url)
            .headers(self.auth_headers()?)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| network_err("store put", e))?;
        if !resp.status().is_success() {
            return Err(EtlError::new(
                EtlErrorCode::Persistence,
                format!("store put {key}: status {}", resp.status()),
            ));
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let url = self.object_url(key);
        self.validate_url(&url)?;
        let resp = self
            .client
            .head(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(|e| network_err("store head", e))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(EtlError::new(
                EtlErrorCode::Transient,
                format!("store head {key}: status {status}"),
            )),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let url = self.object_url(key);
        self.validate_url(&url)?;
        let resp = self
            .client
            .delete(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(|e| network_err("store delete", e))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(EtlError::new(
                EtlErrorCode::Persistence,
                format!("store delete {key}: status {status}"),
            )),
        }
    }

    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/?list-type=2&prefix={}/&delimiter=/",
            self.base_url,
            prefix.trim_end_matches('/')
        );
        self.validate_url(&url)?;
        let resp = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(|e| network_err("store list", e))?;
        if !resp.status().is_success() {
            return Err(EtlError::new(
                EtlErrorCode::Transient,
                format!("store list {prefix}: status {}", resp.status()),
            ));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| network_err("store list body", e))?;
        let mut dirs = parse_common_prefixes(&body, prefix)?;
        dirs.sort();
        Ok(dirs)
    }
}

/// Extract child prefix names from a ListObjectsV2 response:
/// `<CommonPrefixes><Prefix>cfr/2024-01-01/</Prefix></CommonPrefixes>`.
fn parse_common_prefixes(xml: &str, prefix: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut in_prefix = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().local_name().as_ref() == b"Prefix" => {
                in_prefix = true;
            }
            Ok(Event::Text(ref t)) if in_prefix => {
                let full = t
                    .unescape()
                    .map_err(|e| EtlError::new(EtlErrorCode::InvalidData, e.to_string()))?;
                let trimmed = full
                    .trim_start_matches(&format!("{}/", prefix.trim_end_matches('/')))
                    .trim_end_matches('/');
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            }
            Ok(Event::End(ref e)) if e.name().local_name().as_ref() == b"Prefix" => {
                in_prefix = false;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(EtlError::new(
                    EtlErrorCode::InvalidData,
                    format!("list response: {e}"),
                ))
            }
            Ok(_) => {}
        }
    }
    Ok(out)
}
