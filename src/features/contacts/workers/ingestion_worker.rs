use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;

use crate::core::error::{AppError, Result};
use crate::features::contacts::models::{
    BatchMetadata, ColumnMap, ContactRecord, IngestionStage, NewBatch,
};
use crate::features::contacts::services::csv_parser::ContactRowParser;
use crate::features::contacts::services::BatchStore;

/// Parse-and-persist work for one accepted upload
#[derive(Debug, Clone)]
pub struct IngestionJob {
    pub batch: NewBatch,
    pub columns: ColumnMap,
}

/// Bounded queue feeding a fixed-size pool of ingestion workers.
///
/// Jobs run at most once. Nothing is retried and the submitter is never
/// told the outcome; completion shows up only as committed batch metadata.
pub struct IngestionQueue {
    tx: mpsc::Sender<IngestionJob>,
}

impl IngestionQueue {
    /// Create the queue and spawn its worker pool.
    ///
    /// When `queue_size` jobs are already waiting, `submit()` fails instead of blocking.
    pub fn new(store: Arc<dyn BatchStore>, queue_size: usize, max_concurrent: usize) -> Self {
        let queue_size = queue_size.max(1);
        let max_concurrent = max_concurrent.max(1);
        let (tx, rx) = mpsc::channel(queue_size);

        tokio::spawn(async move {
            Self::worker_pool(rx, store, max_concurrent).await;
        });

        tracing::info!(
            queue_size = queue_size,
            max_concurrent = max_concurrent,
            "Ingestion queue initialized"
        );

        Self { tx }
    }

    #[tracing::instrument(skip(self, job), fields(batch_id = %job.batch.batch_id))]
    pub fn submit(&self, job: IngestionJob) -> Result<()> {
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => {
                tracing::warn!("Ingestion queue is full, rejecting upload");
                AppError::ServiceUnavailable(
                    "Too many uploads in progress, please try again later".to_string(),
                )
            }
            TrySendError::Closed(_) => {
                AppError::Internal("Ingestion workers are not running".to_string())
            }
        })
    }

    async fn worker_pool(
        mut rx: mpsc::Receiver<IngestionJob>,
        store: Arc<dyn BatchStore>,
        max_concurrent: usize,
    ) {
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        while let Some(job) = rx.recv().await {
            let permit = semaphore.clone().acquire_owned().await;
            let store = Arc::clone(&store);

            tokio::spawn(async move {
                let _permit = permit;
                let batch_id = job.batch.batch_id;
                if let Err(e) = process_job(job, store.as_ref()).await {
                    tracing::error!(
                        batch_id = %batch_id,
                        stage = %IngestionStage::Rejected,
                        error = %e,
                        "Ingestion failed"
                    );
                    // Metadata was never written, so only rows and content can be left over
                    if let Err(cleanup) = store.discard_incomplete(batch_id).await {
                        tracing::error!(
                            batch_id = %batch_id,
                            error = %cleanup,
                            "Failed to discard partial batch data"
                        );
                    }
                }
            });
        }

        tracing::info!("Ingestion queue closed, worker pool stopping");
    }
}

/// Parse every row, then hand the batch to the store.
/// A single malformed row fails the whole batch before anything is written.
async fn process_job(job: IngestionJob, store: &dyn BatchStore) -> Result<BatchMetadata> {
    let started = Instant::now();
    let IngestionJob { batch, columns } = job;
    let batch_id = batch.batch_id;

    let (batch, parsed) = tokio::task::spawn_blocking(move || {
        let rows: std::result::Result<Vec<ContactRecord>, _> = ContactRowParser::new(
            batch.raw_bytes.as_slice(),
            columns,
            batch.batch_id,
            batch.owner_id.clone(),
            batch.uploaded_at,
        )
        .collect();
        (batch, rows)
    })
    .await
    .map_err(|e| AppError::Internal(format!("CSV parser task failed: {}", e)))?;

    let rows = parsed.map_err(|defect| AppError::Validation(defect.to_string()))?;
    tracing::debug!(
        batch_id = %batch_id,
        stage = %IngestionStage::Parsed,
        rows = rows.len(),
        "Rows parsed"
    );

    let metadata = store.create_batch(batch, rows).await?;
    tracing::debug!(
        batch_id = %batch_id,
        stage = %IngestionStage::Persisted,
        "Batch persisted"
    );
    tracing::info!(
        batch_id = %batch_id,
        owner_id = %metadata.owner_id,
        stage = %IngestionStage::Accepted,
        rows = metadata.total_contacts,
        duration_ms = started.elapsed().as_millis() as u64,
        "Contact batch ingested"
    );

    Ok(metadata)
}

#[cfg(test)]
impl IngestionQueue {
    /// Queue with no workers; the receiver is handed back so tests control draining
    pub(crate) fn detached(queue_size: usize) -> (Self, mpsc::Receiver<IngestionJob>) {
        let (tx, rx) = mpsc::channel(queue_size);
        (Self { tx }, rx)
    }
}
