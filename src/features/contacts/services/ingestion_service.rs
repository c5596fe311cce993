use chrono::{NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::csv_parser::read_header_row;
use super::csv_validator::validate;
use crate::core::error::Result;
use crate::features::contacts::dtos::UploadAcceptedDto;
use crate::features::contacts::models::{CsvSchema, IngestionStage, NewBatch};
use crate::features::contacts::workers::{IngestionJob, IngestionQueue};

/// Admits uploads and hands them to the ingestion workers.
///
/// Validation runs inline so a rejected file never reaches the store.
/// Everything after batch id assignment happens on the queue.
pub struct IngestionService {
    schema: CsvSchema,
    queue: IngestionQueue,
}

impl IngestionService {
    pub fn new(schema: CsvSchema, queue: IngestionQueue) -> Self {
        Self { schema, queue }
    }

    /// Validate an upload, assign its batch id and queue it for parsing and persistence.
    ///
    /// Returns as soon as the job is queued; callers poll the batch id to
    /// see the ingestion finish.
    pub fn ingest(
        &self,
        owner_id: &str,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadAcceptedDto> {
        self.ingest_on(owner_id, filename, content_type, bytes, Utc::now().date_naive())
    }

    fn ingest_on(
        &self,
        owner_id: &str,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
        uploaded_at: NaiveDate,
    ) -> Result<UploadAcceptedDto> {
        debug!(
            owner_id = %owner_id,
            filename = %filename,
            size = bytes.len(),
            stage = %IngestionStage::Received,
            "Upload received"
        );

        let header = read_header_row(&bytes);
        let columns = validate(content_type, &header, &self.schema).map_err(|reason| {
            info!(
                owner_id = %owner_id,
                filename = %filename,
                stage = %IngestionStage::Rejected,
                reason = %reason,
                "Upload rejected"
            );
            reason
        })?;
        debug!(filename = %filename, stage = %IngestionStage::Validated, "Header accepted");

        let batch_id = Uuid::new_v4();
        debug!(batch_id = %batch_id, stage = %IngestionStage::BatchIdAssigned, "Batch id assigned");

        self.queue.submit(IngestionJob {
            batch: NewBatch {
                batch_id,
                owner_id: owner_id.to_string(),
                filename: filename.to_string(),
                uploaded_at,
                raw_bytes: bytes,
            },
            columns,
        })?;

        info!(
            batch_id = %batch_id,
            owner_id = %owner_id,
            stage = %IngestionStage::Queued,
            "Upload queued for ingestion"
        );

        Ok(UploadAcceptedDto {
            batch_id,
            filename: filename.to_string(),
            content_type: content_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AppError;
    use crate::features::contacts::services::{BatchStore, InMemoryBatchStore};
    use crate::shared::test_helpers::CapturedLogs;
    use std::sync::Arc;
    use std::time::Duration;

    fn service(store: Arc<InMemoryBatchStore>) -> IngestionService {
        IngestionService::new(CsvSchema::default(), IngestionQueue::new(store, 16, 2))
    }

    async fn wait_for_batch(store: &InMemoryBatchStore, owner: &str, batch_id: Uuid) -> i64 {
        for _ in 0..100 {
            if let Ok(meta) = store.get_metadata(owner, batch_id).await {
                return meta.total_contacts;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("batch {} was never ingested", batch_id);
    }

    #[tokio::test]
    async fn test_ingest_returns_id_then_persists() {
        let store = Arc::new(InMemoryBatchStore::new());
        let service = service(store.clone());
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

        let accepted = service
            .ingest_on(
                "u1",
                "contacts.csv",
                "text/csv",
                b"firstName,lastName,email,companyName\nAnn,Lee,ann@x.com,Acme\nBo,Kim,bo@y.com,Globex\n"
                    .to_vec(),
                day,
            )
            .unwrap();

        assert_eq!(accepted.filename, "contacts.csv");
        assert_eq!(accepted.content_type, "text/csv");
        assert_eq!(wait_for_batch(&store, "u1", accepted.batch_id).await, 2);
        let meta = store.get_metadata("u1", accepted.batch_id).await.unwrap();
        assert_eq!(meta.uploaded_at, day);
    }

    #[tokio::test]
    async fn test_rejected_upload_never_reaches_store() {
        let store = Arc::new(InMemoryBatchStore::new());
        let service = service(store.clone());

        let missing = service
            .ingest(
                "u1",
                "contacts.csv",
                "text/csv",
                b"firstName,lastName,email\nAnn,Lee,ann@x.com\n".to_vec(),
            )
            .unwrap_err();
        assert!(
            matches!(missing, AppError::Validation(ref msg) if msg.contains("companyName"))
        );

        let wrong_type = service
            .ingest(
                "u1",
                "contacts.json",
                "application/json",
                b"firstName,lastName,email,companyName\n".to_vec(),
            )
            .unwrap_err();
        assert!(matches!(wrong_type, AppError::Validation(_)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.list_batches("u1").await.unwrap().is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_submission_logged_as_queued_not_accepted() {
        let (queue, _rx) = IngestionQueue::detached(4);
        let service = IngestionService::new(CsvSchema::default(), queue);
        let (logs, _guard) = CapturedLogs::install();

        service
            .ingest(
                "u1",
                "contacts.csv",
                "text/csv",
                b"firstName,lastName,email,companyName\nAnn,Lee,ann@x.com,Acme\n".to_vec(),
            )
            .unwrap();

        let output = logs.contents();
        assert!(output.contains("stage=queued"));
        assert!(!output.contains("stage=accepted"));
    }
}
