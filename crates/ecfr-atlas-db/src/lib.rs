#![forbid(unsafe_code)]

mod repo;
mod schema;
mod writer;

pub use repo::SqliteRepo;
pub use writer::{spawn_writer, WriteMessage, WriterHandle, WRITE_QUEUE_CAPACITY};

pub const CRATE_NAME: &str = "ecfr-atlas-db";
