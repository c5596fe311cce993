mod batch_store;
mod contact_service;
pub mod csv_parser;
pub mod csv_validator;
mod ingestion_service;
mod memory_batch_store;
mod pg_batch_store;

pub use batch_store::BatchStore;
pub use contact_service::ContactService;
pub use ingestion_service::IngestionService;
pub use memory_batch_store::InMemoryBatchStore;
pub use pg_batch_store::PgBatchStore;
