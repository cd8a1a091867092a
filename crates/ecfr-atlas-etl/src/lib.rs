#![forbid(unsafe_code)]

mod config;
mod coordinator;
mod differ;
mod summaries;

pub use config::{EtlConfig, StoreSpec};
pub use coordinator::SnapshotCoordinator;
pub use differ::compute_diffs;
pub use summaries::{import_summaries, read_summary_file};

pub const CRATE_NAME: &str = "ecfr-atlas-etl";
