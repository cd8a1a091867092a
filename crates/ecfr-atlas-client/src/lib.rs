#![forbid(unsafe_code)]

mod bulkdata;
mod federal_register;

pub use bulkdata::BulkDataClient;
pub use federal_register::{FederalRegisterClient, DOC_TYPE_FINAL, DOC_TYPE_NOTICE, DOC_TYPE_PROPOSED};

pub const CRATE_NAME: &str = "ecfr-atlas-client";
