#![forbid(unsafe_code)]

mod error;
mod hash;
mod snapshot;

pub use error::{EtlError, EtlErrorCode, Result};
pub use hash::sha256_hex;
pub use snapshot::SnapshotDate;

pub const CRATE_NAME: &str = "ecfr-atlas-core";

/// Env var controlling the log filter when `RUST_LOG` is unset.
pub const ENV_ATLAS_LOG: &str = "ECFR_ATLAS_LOG";
pub const ENV_ATLAS_LOG_JSON: &str = "ECFR_ATLAS_LOG_JSON";

/// Number of CFR Titles enumerated per snapshot run.
pub const TITLE_COUNT: u16 = 50;
