use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};
use uuid::Uuid;

use super::batch_store::{batch_not_found, BatchStore};
use crate::core::error::{AppError, Result};
use crate::features::contacts::models::{
    BatchMetadata, ContactRecord, DateRange, NewBatch, RawFileContent,
};

/// Rows per INSERT statement; 9 binds per row stays well under the
/// postgres limit of 65535 bind parameters
const ROW_INSERT_CHUNK: usize = 5000;

const BATCH_COLUMNS: &str = "batch_id, owner_id, filename, uploaded_at, total_contacts";

/// PostgreSQL-backed batch store
pub struct PgBatchStore {
    pool: PgPool,
}

impl PgBatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_rows(&self, rows: &[ContactRecord]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(ROW_INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO contacts (contact_id, batch_id, owner_id, row_number, \
                 first_name, last_name, email, company_name, uploaded_at) ",
            );
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(row.contact_id)
                    .push_bind(row.batch_id)
                    .push_bind(&row.owner_id)
                    .push_bind(row.row_number)
                    .push_bind(&row.first_name)
                    .push_bind(&row.last_name)
                    .push_bind(&row.email)
                    .push_bind(&row.company_name)
                    .push_bind(row.uploaded_at);
            });
            builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn insert_content(&self, content: &RawFileContent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO contact_batch_contents (batch_id, owner_id, content)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(content.batch_id)
        .bind(&content.owner_id)
        .bind(&content.content)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fails with NotFound unless `batch_id` has committed metadata owned by `owner_id`
    async fn ensure_owned(&self, owner_id: &str, batch_id: Uuid) -> Result<()> {
        let owned: Option<(Uuid,)> = sqlx::query_as(
            "SELECT batch_id FROM contact_batches WHERE batch_id = $1 AND owner_id = $2",
        )
        .bind(batch_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        owned.map(|_| ()).ok_or_else(batch_not_found)
    }
}

#[async_trait]
impl BatchStore for PgBatchStore {
    async fn create_batch(
        &self,
        batch: NewBatch,
        rows: Vec<ContactRecord>,
    ) -> Result<BatchMetadata> {
        let raw = batch.raw_content();
        let metadata = batch.metadata(rows.len());

        tokio::try_join!(self.insert_rows(&rows), self.insert_content(&raw))?;
        debug!(
            batch_id = %batch.batch_id,
            rows = rows.len(),
            "Contact rows and raw content written"
        );

        let created = sqlx::query_as::<_, BatchMetadata>(&format!(
            r#"
            INSERT INTO contact_batches ({BATCH_COLUMNS})
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {BATCH_COLUMNS}
            "#
        ))
        .bind(metadata.batch_id)
        .bind(&metadata.owner_id)
        .bind(&metadata.filename)
        .bind(metadata.uploaded_at)
        .bind(metadata.total_contacts)
        .fetch_one(&self.pool)
        .await?;

        info!(
            batch_id = %created.batch_id,
            owner_id = %created.owner_id,
            total_contacts = created.total_contacts,
            "Contact batch metadata saved"
        );

        Ok(created)
    }

    async fn find_by_date_range(
        &self,
        owner_id: &str,
        range: DateRange,
    ) -> Result<Vec<BatchMetadata>> {
        let batches = sqlx::query_as::<_, BatchMetadata>(&format!(
            r#"
            SELECT {BATCH_COLUMNS} FROM contact_batches
            WHERE owner_id = $1 AND uploaded_at BETWEEN $2 AND $3
            ORDER BY uploaded_at ASC, batch_id ASC
            "#
        ))
        .bind(owner_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    async fn list_batches(&self, owner_id: &str) -> Result<Vec<BatchMetadata>> {
        let batches = sqlx::query_as::<_, BatchMetadata>(&format!(
            r#"
            SELECT {BATCH_COLUMNS} FROM contact_batches
            WHERE owner_id = $1
            ORDER BY uploaded_at ASC, batch_id ASC
            "#
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    async fn get_metadata(&self, owner_id: &str, batch_id: Uuid) -> Result<BatchMetadata> {
        sqlx::query_as::<_, BatchMetadata>(&format!(
            r#"
            SELECT {BATCH_COLUMNS} FROM contact_batches
            WHERE batch_id = $1 AND owner_id = $2
            "#
        ))
        .bind(batch_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(batch_not_found)
    }

    async fn get_raw_content(&self, owner_id: &str, batch_id: Uuid) -> Result<RawFileContent> {
        // Joining on metadata hides content of batches that never finished ingesting
        sqlx::query_as::<_, RawFileContent>(
            r#"
            SELECT c.batch_id, c.owner_id, c.content
            FROM contact_batch_contents c
            JOIN contact_batches b ON b.batch_id = c.batch_id
            WHERE c.batch_id = $1 AND b.owner_id = $2
            "#,
        )
        .bind(batch_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(batch_not_found)
    }

    async fn list_contacts(&self, owner_id: &str, batch_id: Uuid) -> Result<Vec<ContactRecord>> {
        self.ensure_owned(owner_id, batch_id).await?;

        let rows = sqlx::query_as::<_, ContactRecord>(
            r#"
            SELECT contact_id, batch_id, owner_id, row_number,
                   first_name, last_name, email, company_name, uploaded_at
            FROM contacts
            WHERE batch_id = $1
            ORDER BY row_number ASC
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn delete_batch(&self, owner_id: &str, batch_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Lock the metadata row so a concurrent delete cannot interleave
        let owned: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT batch_id FROM contact_batches
            WHERE batch_id = $1 AND owner_id = $2
            FOR UPDATE
            "#,
        )
        .bind(batch_id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        if owned.is_none() {
            return Err(batch_not_found());
        }

        let removed_rows = sqlx::query("DELETE FROM contacts WHERE batch_id = $1")
            .bind(batch_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM contact_batch_contents WHERE batch_id = $1")
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM contact_batches WHERE batch_id = $1")
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit batch deletion: {:?}", e);
            AppError::Database(e)
        })?;

        info!(
            batch_id = %batch_id,
            removed_rows,
            "Contact batch deleted"
        );
        Ok(())
    }

    async fn discard_incomplete(&self, batch_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM contacts
            WHERE batch_id = $1
            AND NOT EXISTS (SELECT 1 FROM contact_batches WHERE batch_id = $1)
            "#,
        )
        .bind(batch_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            DELETE FROM contact_batch_contents
            WHERE batch_id = $1
            AND NOT EXISTS (SELECT 1 FROM contact_batches WHERE batch_id = $1)
            "#,
        )
        .bind(batch_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
