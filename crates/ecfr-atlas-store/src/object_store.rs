// SPDX-License-Identifier: Apache-2.0

use std::io::BufRead;

use async_trait::async_trait;

use ecfr_atlas_core::Result;

/// Whole-object storage behind the raw XML cache and the snapshot archive.
///
/// Keys are `/`-joined object names. `put` is all-or-nothing: a readable
/// key always holds a complete object (the local backend commits with a
/// temp-name rename, the remote backend with a single PUT). Concurrent
/// writers to distinct keys are independent; concurrent writers to the
/// same key are the caller's bug.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Streaming read where the backend supports it; the remote backend
    /// degrades to a cursor over one fetched object.
    async fn get_reader(&self, key: &str) -> Result<Box<dyn BufRead + Send>>;

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Idempotent: deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Names of the immediate "directories" under `prefix`, without the
    /// prefix itself. An absent prefix lists as empty.
    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>>;
}
