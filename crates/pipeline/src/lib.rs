pub mod embed_worker;
pub mod index_service;
pub mod upsert_worker;

pub use embed_worker::EmbedWorker;
pub use index_service::IndexService;
pub use upsert_worker::UpsertWorker;
