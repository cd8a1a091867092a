// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::Path;

use ecfr_atlas_core::{EtlError, EtlErrorCode, Result};
use ecfr_atlas_model::AgencyRoot;

/// Load the upstream agencies JSON document. Reloaded at the start of
/// every snapshot run; the writer replaces the stored forest wholesale.
pub fn load_agency_file(path: &Path) -> Result<AgencyRoot> {
    let raw = fs::read_to_string(path).map_err(|e| {
        EtlError::new(
            EtlErrorCode::Io,
            format!("reading {}: {e}", path.display()),
        )
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        EtlError::new(
            EtlErrorCode::InvalidData,
            format!("parsing {}: {e}", path.display()),
        )
    })
}
