// SPDX-License-Identifier: Apache-2.0

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use ecfr_atlas_core::{EtlError, EtlErrorCode, Result};

use crate::object_store::ObjectStore;

/// Development backend over a directory tree. Commits are temp-name
/// writes followed by a rename, so readers never observe a half-written
/// object.
pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(EtlError::new(
                    EtlErrorCode::InvalidData,
                    format!("invalid object key: {key}"),
                ));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = File::create(path)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    Ok(())
}

fn sync_dir(dir: &Path) -> Result<()> {
    let f = OpenOptions::new().read(true).open(dir)?;
    f.sync_all()?;
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalFsStore {
    fn backend_tag(&self) -> &'static str {
        "localfs"
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.key_path(key)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EtlError::not_found(format!("object absent: {key}"))
            } else {
                EtlError::new(EtlErrorCode::Io, format!("reading {key}: {e}"))
            }
        })
    }

    async fn get_reader(&self, key: &str) -> Result<Box<dyn BufRead + Send>> {
        let path = self.key_path(key)?;
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EtlError::not_found(format!("object absent: {key}"))
            } else {
                EtlError::new(EtlErrorCode::Io, format!("opening {key}: {e}"))
            }
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.key_path(key)?;
        let parent = path.parent().ok_or_else(|| {
            EtlError::new(EtlErrorCode::InvalidData, format!("keyless object: {key}"))
        })?;
        fs::create_dir_all(parent)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!("{file_name}.tmp"));
        if let Err(e) = write_and_sync(&tmp, bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &path)?;
        sync_dir(parent)?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.key_path(key)?.exists())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EtlError::new(
                EtlErrorCode::Io,
                format!("deleting {key}: {e}"),
            )),
        }
    }

    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>> {
        let base = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.key_path(prefix)?
        };
        let entries = match fs::read_dir(&base) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(EtlError::new(
                    EtlErrorCode::Io,
                    format!("listing {prefix}: {e}"),
                ))
            }
        };
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                out.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        out.sort();
        Ok(out)
    }
}
