#![forbid(unsafe_code)]

mod agencies;
mod metrics;
mod parallel;
mod parser;

pub use agencies::load_agency_file;
pub use metrics::Metricizer;
pub use parallel::{effective_parallelism, metricize_all};
pub use parser::TitleXmlParser;

pub const CRATE_NAME: &str = "ecfr-atlas-ingest";
