use base64::prelude::*;
use chrono::NaiveDate;
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for one uploaded CSV file
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct BatchMetadata {
    pub batch_id: Uuid,
    pub owner_id: String,
    pub filename: String,
    /// Upload day; time of day is discarded at write time
    pub uploaded_at: NaiveDate,
    pub total_contacts: i64,
}

/// Original file bytes of a batch, kept base64-encoded for download
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RawFileContent {
    pub batch_id: Uuid,
    pub owner_id: String,
    pub content: String,
}

impl RawFileContent {
    pub fn encode(batch_id: Uuid, owner_id: &str, bytes: &[u8]) -> Self {
        Self {
            batch_id,
            owner_id: owner_id.to_string(),
            content: BASE64_STANDARD.encode(bytes),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(&self.content)
    }
}

/// Database model for one parsed CSV row
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ContactRecord {
    pub contact_id: Uuid,
    pub batch_id: Uuid,
    pub owner_id: String,
    /// 1-based position among the data rows of the file
    pub row_number: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company_name: String,
    pub uploaded_at: NaiveDate,
}

/// Everything a store needs to record a batch besides its rows
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub batch_id: Uuid,
    pub owner_id: String,
    pub filename: String,
    pub uploaded_at: NaiveDate,
    pub raw_bytes: Vec<u8>,
}

impl NewBatch {
    pub fn metadata(&self, total_contacts: usize) -> BatchMetadata {
        BatchMetadata {
            batch_id: self.batch_id,
            owner_id: self.owner_id.clone(),
            filename: self.filename.clone(),
            uploaded_at: self.uploaded_at,
            total_contacts: i64::try_from(total_contacts).unwrap_or(i64::MAX),
        }
    }

    pub fn raw_content(&self) -> RawFileContent {
        RawFileContent::encode(self.batch_id, &self.owner_id, &self.raw_bytes)
    }
}

/// Inclusive range of upload days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}
