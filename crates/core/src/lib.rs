pub mod chunk;
pub mod config;
pub mod document;
pub mod error;
pub mod fingerprint;
pub mod work_unit;

pub use chunk::{Chunk, ChunkBatch};
pub use config::IndexConfig;
pub use document::{ChunkParams, Document, Node, SourceMeta, split_document, split_into_nodes};
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use work_unit::{WorkUnit, partition_ceiling};
