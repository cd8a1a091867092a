#![forbid(unsafe_code)]

mod archive;
mod local;
mod object_store;
mod parquet_codec;
mod s3like;

pub use archive::ArchiveRepo;
pub use local::LocalFsStore;
pub use object_store::ObjectStore;
pub use s3like::S3LikeStore;

pub const CRATE_NAME: &str = "ecfr-atlas-store";
