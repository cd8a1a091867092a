#![forbid(unsafe_code)]

mod activity;
mod agency;
mod diff;
mod manifest;
mod paths;
mod section;
mod summary;
mod title;

pub use activity::{AgencyLsa, LsaActivity};
pub use agency::{Agency, AgencyMetric, AgencyNode, AgencyRoot, CfrReference};
pub use diff::SectionDiff;
pub use manifest::{SnapshotManifest, TitleOutcome};
pub use paths::{
    agency_lsa_object, diffs_object, raw_title_object, sections_object, snapshot_prefix,
    summaries_object,
};
pub use section::{RawSection, Section};
pub use summary::{Summary, SummaryKind};
pub use title::{Title, TitleId};

pub const CRATE_NAME: &str = "ecfr-atlas-model";
