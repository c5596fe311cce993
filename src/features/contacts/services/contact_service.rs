use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::batch_store::{batch_not_found, BatchStore};
use crate::core::error::{AppError, Result};
use crate::features::contacts::dtos::{
    BatchSummaryDto, ContactRecordDto, DeleteBatchResponseDto, RawDownload,
};
use crate::features::contacts::models::DateRange;

/// Owner-scoped reads and deletes over ingested batches
pub struct ContactService {
    store: Arc<dyn BatchStore>,
}

impl ContactService {
    pub fn new(store: Arc<dyn BatchStore>) -> Self {
        Self { store }
    }

    /// Batch ids are opaque to callers; anything that is not one of ours is simply not found
    fn parse_batch_id(raw: &str) -> Result<Uuid> {
        Uuid::parse_str(raw).map_err(|_| batch_not_found())
    }

    /// Batches of `owner_id`, optionally limited to an inclusive upload-day range
    pub async fn list(
        &self,
        owner_id: &str,
        range: Option<DateRange>,
    ) -> Result<Vec<BatchSummaryDto>> {
        let batches = match range {
            Some(range) => self.store.find_by_date_range(owner_id, range).await?,
            None => self.store.list_batches(owner_id).await?,
        };
        debug!(owner_id = %owner_id, batches = batches.len(), "Listed contact batches");

        Ok(batches.into_iter().map(BatchSummaryDto::from).collect())
    }

    pub async fn get_summary(&self, owner_id: &str, batch_id: &str) -> Result<BatchSummaryDto> {
        let batch_id = Self::parse_batch_id(batch_id)?;
        let metadata = self.store.get_metadata(owner_id, batch_id).await?;
        Ok(metadata.into())
    }

    /// Original upload bytes together with the filename they were uploaded under
    pub async fn get_raw(&self, owner_id: &str, batch_id: &str) -> Result<RawDownload> {
        let batch_id = Self::parse_batch_id(batch_id)?;
        let metadata = self.store.get_metadata(owner_id, batch_id).await?;
        let content = self.store.get_raw_content(owner_id, batch_id).await?;

        let bytes = content.decode().map_err(|e| {
            AppError::Internal(format!("Stored content of batch {} is corrupt: {}", batch_id, e))
        })?;

        Ok(RawDownload {
            filename: metadata.filename,
            bytes,
        })
    }

    pub async fn list_records(&self, owner_id: &str, batch_id: &str) -> Result<Vec<ContactRecordDto>> {
        let batch_id = Self::parse_batch_id(batch_id)?;
        let rows = self.store.list_contacts(owner_id, batch_id).await?;
        Ok(rows.into_iter().map(ContactRecordDto::from).collect())
    }

    pub async fn delete(&self, owner_id: &str, batch_id: &str) -> Result<DeleteBatchResponseDto> {
        let batch_id = Self::parse_batch_id(batch_id)?;
        self.store.delete_batch(owner_id, batch_id).await?;

        info!(batch_id = %batch_id, owner_id = %owner_id, "Contact batch removed");
        Ok(DeleteBatchResponseDto {
            batch_id,
            scheduled: true,
        })
    }
}
