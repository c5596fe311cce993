use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::batch_store::{batch_not_found, BatchStore};
use crate::core::error::{AppError, Result};
use crate::features::contacts::models::{
    BatchMetadata, ContactRecord, DateRange, NewBatch, RawFileContent,
};

/// In-process batch store.
///
/// Each collection sits behind its own lock. Deletion takes all three
/// write locks (batches, rows, contents, in that order) so no reader sees
/// a half-deleted batch.
#[derive(Default)]
pub struct InMemoryBatchStore {
    batches: RwLock<HashMap<Uuid, BatchMetadata>>,
    rows: RwLock<HashMap<Uuid, Vec<ContactRecord>>>,
    contents: RwLock<HashMap<Uuid, RawFileContent>>,
}

impl InMemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn owned_batches<F>(&self, owner_id: &str, keep: F) -> Vec<BatchMetadata>
    where
        F: Fn(&BatchMetadata) -> bool,
    {
        let mut found: Vec<BatchMetadata> = self
            .batches
            .read()
            .await
            .values()
            .filter(|b| b.owner_id == owner_id && keep(b))
            .cloned()
            .collect();
        found.sort_by(|a, b| (a.uploaded_at, a.batch_id).cmp(&(b.uploaded_at, b.batch_id)));
        found
    }
}

#[async_trait]
impl BatchStore for InMemoryBatchStore {
    async fn create_batch(
        &self,
        batch: NewBatch,
        rows: Vec<ContactRecord>,
    ) -> Result<BatchMetadata> {
        let metadata = batch.metadata(rows.len());
        let raw = batch.raw_content();
        let batch_id = batch.batch_id;

        let write_rows = async {
            self.rows.write().await.insert(batch_id, rows);
            Ok::<_, AppError>(())
        };
        let write_content = async {
            self.contents.write().await.insert(batch_id, raw);
            Ok::<_, AppError>(())
        };
        tokio::try_join!(write_rows, write_content)?;

        self.batches
            .write()
            .await
            .insert(batch_id, metadata.clone());

        Ok(metadata)
    }

    async fn find_by_date_range(
        &self,
        owner_id: &str,
        range: DateRange,
    ) -> Result<Vec<BatchMetadata>> {
        Ok(self
            .owned_batches(owner_id, |b| range.contains(b.uploaded_at))
            .await)
    }

    async fn list_batches(&self, owner_id: &str) -> Result<Vec<BatchMetadata>> {
        Ok(self.owned_batches(owner_id, |_| true).await)
    }

    async fn get_metadata(&self, owner_id: &str, batch_id: Uuid) -> Result<BatchMetadata> {
        self.batches
            .read()
            .await
            .get(&batch_id)
            .filter(|b| b.owner_id == owner_id)
            .cloned()
            .ok_or_else(batch_not_found)
    }

    async fn get_raw_content(&self, owner_id: &str, batch_id: Uuid) -> Result<RawFileContent> {
        let batches = self.batches.read().await;
        if !batches
            .get(&batch_id)
            .is_some_and(|b| b.owner_id == owner_id)
        {
            return Err(batch_not_found());
        }

        self.contents
            .read()
            .await
            .get(&batch_id)
            .cloned()
            .ok_or_else(|| AppError::Internal(format!("Raw content missing for batch {}", batch_id)))
    }

    async fn list_contacts(&self, owner_id: &str, batch_id: Uuid) -> Result<Vec<ContactRecord>> {
        let batches = self.batches.read().await;
        if !batches
            .get(&batch_id)
            .is_some_and(|b| b.owner_id == owner_id)
        {
            return Err(batch_not_found());
        }

        let mut rows = self
            .rows
            .read()
            .await
            .get(&batch_id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by_key(|r| r.row_number);
        Ok(rows)
    }

    async fn delete_batch(&self, owner_id: &str, batch_id: Uuid) -> Result<()> {
        let mut batches = self.batches.write().await;
        if !batches
            .get(&batch_id)
            .is_some_and(|b| b.owner_id == owner_id)
        {
            return Err(batch_not_found());
        }

        let mut rows = self.rows.write().await;
        let mut contents = self.contents.write().await;
        rows.remove(&batch_id);
        contents.remove(&batch_id);
        batches.remove(&batch_id);

        Ok(())
    }

    async fn discard_incomplete(&self, batch_id: Uuid) -> Result<()> {
        let batches = self.batches.read().await;
        if batches.contains_key(&batch_id) {
            return Ok(());
        }

        self.rows.write().await.remove(&batch_id);
        self.contents.write().await.remove(&batch_id);
        Ok(())
    }
}

#[cfg(test)]
impl InMemoryBatchStore {
    /// No metadata, rows or raw content held for any batch
    pub(crate) async fn is_empty(&self) -> bool {
        self.batches.read().await.is_empty()
            && self.rows.read().await.is_empty()
            && self.contents.read().await.is_empty()
    }
}
