// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use ecfr_atlas_core::{EtlError, EtlErrorCode, Result};
use ecfr_atlas_store::{LocalFsStore, ObjectStore, S3LikeStore};

const DEFAULT_BULKDATA_URL: &str = "https://www.govinfo.gov/bulkdata/ECFR";
const DEFAULT_FEDERAL_REGISTER_URL: &str = "https://www.federalregister.gov/api/v1";

fn env_str(name: &str, default: &str) -> String {
    env::var(name).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

/// Backend selection in the `local:/path` / `s3:https://…` scheme syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSpec {
    Local(PathBuf),
    S3 { base_url: String },
}

impl StoreSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        if let Some(path) = raw.strip_prefix("local:") {
            return Ok(Self::Local(PathBuf::from(path)));
        }
        if let Some(url) = raw.strip_prefix("s3:") {
            return Ok(Self::S3 {
                base_url: url.to_string(),
            });
        }
        Err(EtlError::new(
            EtlErrorCode::InvalidData,
            format!("unsupported store spec {raw}; use local:/path or s3:https://…"),
        ))
    }

    pub fn build(&self, bearer: Option<String>, allow_private_hosts: bool) -> Arc<dyn ObjectStore> {
        match self {
            Self::Local(path) => Arc::new(LocalFsStore::new(path.clone())),
            Self::S3 { base_url } => Arc::new(S3LikeStore::new(
                base_url.clone(),
                bearer,
                allow_private_hosts,
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub agencies_path: PathBuf,
    pub archive_store: StoreSpec,
    pub raw_store: StoreSpec,
    pub archive_prefix: String,
    pub raw_prefix: String,
    pub bulkdata_url: String,
    pub federal_register_url: String,
    pub store_bearer: Option<String>,
    pub allow_private_store_hosts: bool,
    /// Title workers in flight at once; bounds load on the upstream.
    pub title_pool: usize,
    /// Section metric workers per Title; 0 means hardware parallelism.
    pub metric_threads: usize,
    pub write_queue_capacity: usize,
}

impl EtlConfig {
    pub fn from_env() -> Result<Self> {
        let data_dir = PathBuf::from(env_str("ECFR_ATLAS_DATA_DIR", "data"));
        let default_archive = format!("local:{}", data_dir.join("archive").display());
        let default_raw = format!("local:{}", data_dir.join("rawxml").display());
        Ok(Self {
            db_path: data_dir.join("ecfr_atlas.db"),
            agencies_path: PathBuf::from(env_str(
                "ECFR_ATLAS_AGENCIES_JSON",
                "ecfr_agencies.json",
            )),
            archive_store: StoreSpec::parse(&env_str("ECFR_ATLAS_ARCHIVE_STORE", &default_archive))?,
            raw_store: StoreSpec::parse(&env_str("ECFR_ATLAS_RAW_STORE", &default_raw))?,
            archive_prefix: env_str("ECFR_ATLAS_ARCHIVE_PREFIX", "cfr"),
            raw_prefix: env_str("ECFR_ATLAS_RAW_PREFIX", "raw"),
            bulkdata_url: env_str("ECFR_ATLAS_BULKDATA_URL", DEFAULT_BULKDATA_URL),
            federal_register_url: env_str(
                "ECFR_ATLAS_FEDERAL_REGISTER_URL",
                DEFAULT_FEDERAL_REGISTER_URL,
            ),
            store_bearer: env::var("ECFR_ATLAS_STORE_BEARER").ok().filter(|v| !v.is_empty()),
            allow_private_store_hosts: env_bool("ECFR_ATLAS_ALLOW_PRIVATE_STORE_HOSTS", false),
            title_pool: env_usize("ECFR_ATLAS_TITLE_POOL", 4),
            metric_threads: env_usize("ECFR_ATLAS_METRIC_THREADS", 0),
            write_queue_capacity: env_usize(
                "ECFR_ATLAS_WRITE_QUEUE_CAPACITY",
                ecfr_atlas_db::WRITE_QUEUE_CAPACITY,
            ),
            data_dir,
        })
    }
}
