use async_trait::async_trait;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::contacts::models::{
    BatchMetadata, ContactRecord, DateRange, NewBatch, RawFileContent,
};
use crate::shared::constants::BATCH_NOT_FOUND;

/// Persistence for contact batches: metadata, raw file content and parsed rows.
///
/// Every read and delete is scoped by owner. A batch owned by someone else
/// is reported exactly like a batch that does not exist.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Record a batch. Rows and raw content are written first (concurrently),
    /// metadata last; metadata existence marks the batch as ingested.
    async fn create_batch(&self, batch: NewBatch, rows: Vec<ContactRecord>)
        -> Result<BatchMetadata>;

    /// Batches of `owner_id` uploaded within `range`, ordered by upload day then id
    async fn find_by_date_range(&self, owner_id: &str, range: DateRange)
        -> Result<Vec<BatchMetadata>>;

    /// All batches of `owner_id`, same ordering as `find_by_date_range`
    async fn list_batches(&self, owner_id: &str) -> Result<Vec<BatchMetadata>>;

    async fn get_metadata(&self, owner_id: &str, batch_id: Uuid) -> Result<BatchMetadata>;

    async fn get_raw_content(&self, owner_id: &str, batch_id: Uuid) -> Result<RawFileContent>;

    /// Parsed rows of an owned batch in file order
    async fn list_contacts(&self, owner_id: &str, batch_id: Uuid) -> Result<Vec<ContactRecord>>;

    /// Remove metadata, raw content and rows of an owned batch together
    async fn delete_batch(&self, owner_id: &str, batch_id: Uuid) -> Result<()>;

    /// Drop rows and raw content left behind by an ingestion that never
    /// committed metadata. Batches with metadata are left untouched.
    async fn discard_incomplete(&self, batch_id: Uuid) -> Result<()>;
}

pub(crate) fn batch_not_found() -> AppError {
    AppError::NotFound(BATCH_NOT_FOUND.to_string())
}
