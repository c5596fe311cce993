use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::features::contacts::models::{BatchMetadata, ContactRecord};
use crate::shared::constants::DATE_FORMAT;

/// Upload request DTO for OpenAPI documentation
/// Note: This struct is for Swagger UI documentation only.
/// The actual handler uses axum's Multipart extractor directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadCsvDto {
    /// CSV file whose header contains firstName, lastName, email and companyName
    #[schema(format = Binary, content_media_type = "text/csv")]
    pub csv_file: String,
}

/// Returned as soon as an upload passes validation; ingestion continues in the background
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadAcceptedDto {
    /// Identifier to poll with `GET /contacts/{batchId}`
    pub batch_id: Uuid,
    pub filename: String,
    pub content_type: String,
}

/// One ingested CSV file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummaryDto {
    pub batch_id: Uuid,
    pub filename: String,
    /// Upload day as YYYY/MM/DD
    #[schema(example = "2024/01/15")]
    pub upload_date: String,
    /// Number of rows parsed from this file
    pub total_contacts: i64,
}

impl From<BatchMetadata> for BatchSummaryDto {
    fn from(meta: BatchMetadata) -> Self {
        Self {
            batch_id: meta.batch_id,
            filename: meta.filename,
            upload_date: meta.uploaded_at.format(DATE_FORMAT).to_string(),
            total_contacts: meta.total_contacts,
        }
    }
}

/// One parsed row of a batch
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecordDto {
    pub contact_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company_name: String,
}

impl From<ContactRecord> for ContactRecordDto {
    fn from(record: ContactRecord) -> Self {
        Self {
            contact_id: record.contact_id,
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            company_name: record.company_name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBatchResponseDto {
    pub batch_id: Uuid,
    pub scheduled: bool,
}

/// Query params for listing batches
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListContactsQuery {
    /// `YYYY/MM/DD` or `YYYY/MM/DD - YYYY/MM/DD`; absent lists every batch
    #[validate(length(min = 1, max = 64, message = "date must be YYYY/MM/DD or YYYY/MM/DD - YYYY/MM/DD"))]
    pub date: Option<String>,
}

/// Representation returned by `GET /contacts/{batchId}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Batch metadata as JSON
    #[default]
    Structured,
    /// The original file as a CSV attachment
    Raw,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" => Ok(OutputFormat::Structured),
            "raw" => Ok(OutputFormat::Raw),
            other => Err(format!(
                "Invalid output '{}': expected 'structured' or 'raw'",
                other
            )),
        }
    }
}

/// Query params for reading one batch; `output` is parsed by the handler
#[derive(Debug, Default, Deserialize)]
pub struct GetContactsQuery {
    pub output: Option<String>,
}

impl GetContactsQuery {
    pub fn format(&self) -> Result<OutputFormat, String> {
        self.output
            .as_deref()
            .map(str::parse)
            .transpose()
            .map(Option::unwrap_or_default)
    }
}

/// Original file bytes ready to be sent back to the owner
#[derive(Debug)]
pub struct RawDownload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_summary_uses_wire_names_and_date_format() {
        let batch_id = Uuid::new_v4();
        let dto = BatchSummaryDto::from(BatchMetadata {
            batch_id,
            owner_id: "u1".to_string(),
            filename: "leads.csv".to_string(),
            uploaded_at: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            total_contacts: 2,
        });

        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["batchId"], batch_id.to_string());
        assert_eq!(json["uploadDate"], "2024/01/05");
        assert_eq!(json["totalContacts"], 2);
        assert!(json.get("ownerId").is_none());
    }

    #[test]
    fn test_output_defaults_to_structured() {
        let query: GetContactsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.format(), Ok(OutputFormat::Structured));
        let query: GetContactsQuery = serde_json::from_str(r#"{"output":"raw"}"#).unwrap();
        assert_eq!(query.format(), Ok(OutputFormat::Raw));
        let query: GetContactsQuery = serde_json::from_str(r#"{"output":"RAW"}"#).unwrap();
        assert_eq!(query.format(), Ok(OutputFormat::Raw));
    }

    #[test]
    fn test_unknown_output_is_an_error() {
        let query = GetContactsQuery {
            output: Some("xml".to_string()),
        };
        let err = query.format().unwrap_err();
        assert!(err.contains("'xml'"));
    }

    #[test]
    fn test_empty_date_fails_validation() {
        let query = ListContactsQuery {
            date: Some(String::new()),
        };
        assert!(query.validate().is_err());
        assert!(ListContactsQuery::default().validate().is_ok());
    }
}
