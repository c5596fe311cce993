mod contact_batch;
mod csv_schema;
mod ingestion_stage;

pub use contact_batch::{BatchMetadata, ContactRecord, DateRange, NewBatch, RawFileContent};
pub use csv_schema::{ColumnMap, CsvSchema};
pub use ingestion_stage::IngestionStage;
