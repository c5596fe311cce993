mod ingestion_worker;

pub use ingestion_worker::{IngestionJob, IngestionQueue};
