use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::stream;
use tracing::debug;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::contacts::dtos::{
    BatchSummaryDto, ContactRecordDto, DeleteBatchResponseDto, GetContactsQuery,
    ListContactsQuery, OutputFormat, RawDownload, UploadAcceptedDto, UploadCsvDto,
};
use crate::features::contacts::services::{ContactService, IngestionService};
use crate::shared::constants::{CSV_MEDIA_TYPE, UPLOAD_FIELD_NAME};
use crate::shared::types::{ApiResponse, Meta};
use crate::shared::validation::parse_date_query;

/// Size of the body chunks a raw download is streamed in
const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// State shared by the contacts handlers
#[derive(Clone)]
pub struct ContactsState {
    pub ingestion: Arc<IngestionService>,
    pub contacts: Arc<ContactService>,
    pub max_upload_size: usize,
}

/// Upload a CSV file of contacts
///
/// Accepts multipart/form-data with a `csv_file` part. The header row is
/// validated immediately; rows are parsed and stored in the background.
/// Poll `GET /contacts/{batchId}` to see when ingestion has finished.
#[utoipa::path(
    post,
    path = "/contacts",
    tag = "contacts",
    request_body(
        content = UploadCsvDto,
        content_type = "multipart/form-data",
        description = "CSV upload form",
    ),
    responses(
        (status = 202, description = "Upload accepted for ingestion", body = ApiResponse<UploadAcceptedDto>),
        (status = 400, description = "Invalid content type, missing columns or file too large"),
        (status = 401, description = "Authentication required"),
        (status = 503, description = "Ingestion queue is full")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_contacts(
    user: AuthenticatedUser,
    State(state): State<ContactsState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<UploadAcceptedDto>>)> {
    let mut upload: Option<(String, String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        let field_name = field.name().unwrap_or("").to_string();
        if field_name != UPLOAD_FIELD_NAME {
            debug!("Ignoring unknown field: {}", field_name);
            continue;
        }
        if upload.is_some() {
            return Err(AppError::BadRequest(format!(
                "Only one '{}' file may be uploaded per request",
                UPLOAD_FIELD_NAME
            )));
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unnamed.csv".to_string());
        let data = field.bytes().await.map_err(|e| {
            debug!("Failed to read file bytes: {}", e);
            AppError::BadRequest(format!("Failed to read file data: {}", e))
        })?;

        upload = Some((filename, content_type, data));
    }

    let (filename, content_type, data) = upload
        .ok_or_else(|| AppError::BadRequest(format!("'{}' file is required", UPLOAD_FIELD_NAME)))?;

    if data.len() > state.max_upload_size {
        return Err(AppError::BadRequest(format!(
            "File too large. Maximum size is {} bytes",
            state.max_upload_size
        )));
    }

    let accepted = state
        .ingestion
        .ingest(user.owner_id(), &filename, &content_type, data.to_vec())?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(
            Some(accepted),
            Some("File accepted, contacts are being processed".to_string()),
            None,
        )),
    ))
}

/// List uploaded contact files
///
/// Without `date` every batch of the caller is returned. `meta.total` is
/// the number of batches; each batch carries its own `totalContacts`.
#[utoipa::path(
    get,
    path = "/contacts",
    tag = "contacts",
    params(
        ("date" = Option<String>, Query, description = "YYYY/MM/DD or YYYY/MM/DD - YYYY/MM/DD, inclusive")
    ),
    responses(
        (status = 200, description = "Batches uploaded in the range", body = ApiResponse<Vec<BatchSummaryDto>>),
        (status = 400, description = "Malformed date"),
        (status = 401, description = "Authentication required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_contacts(
    user: AuthenticatedUser,
    State(state): State<ContactsState>,
    Query(query): Query<ListContactsQuery>,
) -> Result<Json<ApiResponse<Vec<BatchSummaryDto>>>> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let range = query
        .date
        .as_deref()
        .map(parse_date_query)
        .transpose()
        .map_err(AppError::Validation)?;

    let batches = state.contacts.list(user.owner_id(), range).await?;
    let total = batches.len();

    Ok(Json(ApiResponse::success(
        Some(batches),
        None,
        Some(Meta::total(total)),
    )))
}

/// Get one uploaded contact file
///
/// `output=structured` (default) returns the batch metadata; `output=raw`
/// returns the original file as a CSV attachment.
#[utoipa::path(
    get,
    path = "/contacts/{batchId}",
    tag = "contacts",
    params(
        ("batchId" = String, Path, description = "Batch id returned by the upload"),
        ("output" = Option<OutputFormat>, Query, description = "structured (default) or raw")
    ),
    responses(
        (status = 200, description = "Batch metadata", body = ApiResponse<BatchSummaryDto>),
        (status = 200, description = "Original CSV file", content_type = "text/csv"),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Contacts file not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_contacts(
    user: AuthenticatedUser,
    State(state): State<ContactsState>,
    Path(batch_id): Path<String>,
    Query(query): Query<GetContactsQuery>,
) -> Result<Response> {
    match query.format().map_err(AppError::Validation)? {
        OutputFormat::Structured => {
            let summary = state.contacts.get_summary(user.owner_id(), &batch_id).await?;
            Ok(Json(ApiResponse::success(Some(summary), None, None)).into_response())
        }
        OutputFormat::Raw => {
            let download = state.contacts.get_raw(user.owner_id(), &batch_id).await?;
            csv_attachment(download)
        }
    }
}

/// List the parsed rows of an uploaded contact file in file order
#[utoipa::path(
    get,
    path = "/contacts/{batchId}/records",
    tag = "contacts",
    params(
        ("batchId" = String, Path, description = "Batch id returned by the upload")
    ),
    responses(
        (status = 200, description = "Parsed contacts", body = ApiResponse<Vec<ContactRecordDto>>),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Contacts file not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_contact_records(
    user: AuthenticatedUser,
    State(state): State<ContactsState>,
    Path(batch_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<ContactRecordDto>>>> {
    let records = state
        .contacts
        .list_records(user.owner_id(), &batch_id)
        .await?;
    let total = records.len();

    Ok(Json(ApiResponse::success(
        Some(records),
        None,
        Some(Meta::total(total)),
    )))
}

/// Delete an uploaded contact file with its raw content and parsed rows
#[utoipa::path(
    delete,
    path = "/contacts/{batchId}",
    tag = "contacts",
    params(
        ("batchId" = String, Path, description = "Batch id returned by the upload")
    ),
    responses(
        (status = 202, description = "Batch deleted", body = ApiResponse<DeleteBatchResponseDto>),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Contacts file not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_contacts(
    user: AuthenticatedUser,
    State(state): State<ContactsState>,
    Path(batch_id): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<DeleteBatchResponseDto>>)> {
    let deleted = state.contacts.delete(user.owner_id(), &batch_id).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(
            Some(deleted),
            Some("Contacts file scheduled for deletion".to_string()),
            None,
        )),
    ))
}

fn csv_attachment(download: RawDownload) -> Result<Response> {
    let bytes = Bytes::from(download.bytes);
    let chunks: Vec<std::io::Result<Bytes>> = (0..bytes.len())
        .step_by(DOWNLOAD_CHUNK_SIZE)
        .map(|start| Ok(bytes.slice(start..(start + DOWNLOAD_CHUNK_SIZE).min(bytes.len()))))
        .collect();

    let content_disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_filename(&download.filename)
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CSV_MEDIA_TYPE)
        .header(header::CONTENT_DISPOSITION, content_disposition.as_str())
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from_stream(stream::iter(chunks)))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}

/// Keep a user-supplied filename from breaking out of the quoted header value
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::contacts::models::CsvSchema;
    use crate::features::contacts::routes::routes;
    use crate::features::contacts::services::InMemoryBatchStore;
    use crate::features::contacts::workers::IngestionQueue;
    use crate::shared::test_helpers::{with_test_user_auth, TEST_USER_HEADER};
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use serde_json::Value;
    use std::time::Duration;

    const TWO_CONTACTS: &str = "firstName,lastName,email,companyName\n\
                                Ann,Lee,ann@x.com,Acme\n\
                                Bo,Kim,bo@y.com,Globex\n";

    fn server_with_limit(max_upload_size: usize) -> TestServer {
        let store = Arc::new(InMemoryBatchStore::new());
        let queue = IngestionQueue::new(store.clone(), 16, 2);
        let ingestion = Arc::new(IngestionService::new(CsvSchema::default(), queue));
        let contacts = Arc::new(ContactService::new(store));

        TestServer::new(with_test_user_auth(routes(ingestion, contacts, max_upload_size))).unwrap()
    }

    fn server() -> TestServer {
        server_with_limit(1024 * 1024)
    }

    fn csv_form(body: &str, mime: &str) -> MultipartForm {
        let part = Part::bytes(body.as_bytes().to_vec())
            .file_name("contacts.csv")
            .mime_type(mime);
        MultipartForm::new().add_part(UPLOAD_FIELD_NAME, part)
    }

    async fn upload(server: &TestServer, user: &str, body: &str) -> String {
        let response = server
            .post("/contacts")
            .add_header(TEST_USER_HEADER, user)
            .multipart(csv_form(body, "text/csv"))
            .await;
        response.assert_status(StatusCode::ACCEPTED);

        let json: Value = response.json();
        json["data"]["batchId"].as_str().unwrap().to_string()
    }

    /// Poll structured output until the background ingestion has committed
    async fn wait_for_batch(server: &TestServer, user: &str, batch_id: &str) -> Value {
        for _ in 0..100 {
            let response = server
                .get(&format!("/contacts/{}", batch_id))
                .add_header(TEST_USER_HEADER, user)
                .await;
            if response.status_code() == StatusCode::OK {
                return response.json();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("batch {} never finished ingesting", batch_id);
    }

    #[tokio::test]
    async fn test_upload_then_read_as_owner_and_stranger() {
        let server = server();
        let batch_id = upload(&server, "u1", TWO_CONTACTS).await;

        let json = wait_for_batch(&server, "u1", &batch_id).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["batchId"], batch_id.as_str());
        assert_eq!(json["data"]["filename"], "contacts.csv");
        assert_eq!(json["data"]["totalContacts"], 2);

        let stranger = server
            .get(&format!("/contacts/{}?output=structured", batch_id))
            .add_header(TEST_USER_HEADER, "u2")
            .await;
        stranger.assert_status(StatusCode::NOT_FOUND);
        let body: Value = stranger.json();
        assert_eq!(body["message"], "Contacts file not found");
    }

    #[tokio::test]
    async fn test_upload_response_echoes_file_details() {
        let server = server();
        let response = server
            .post("/contacts")
            .add_header(TEST_USER_HEADER, "u1")
            .multipart(csv_form(TWO_CONTACTS, "text/csv"))
            .await;

        response.assert_status(StatusCode::ACCEPTED);
        let json: Value = response.json();
        assert_eq!(json["data"]["filename"], "contacts.csv");
        assert_eq!(json["data"]["contentType"], "text/csv");
        assert!(uuid::Uuid::parse_str(json["data"]["batchId"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_missing_column_is_rejected_and_nothing_stored() {
        let server = server();
        let response = server
            .post("/contacts")
            .add_header(TEST_USER_HEADER, "u1")
            .multipart(csv_form(
                "firstName,lastName,email\nAnn,Lee,ann@x.com\n",
                "text/csv",
            ))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json: Value = response.json();
        assert!(json["message"].as_str().unwrap().contains("companyName"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let today = chrono::Utc::now().date_naive().format("%Y/%m/%d").to_string();
        let listing = server
            .get("/contacts")
            .add_query_param("date", &today)
            .add_header(TEST_USER_HEADER, "u1")
            .await;
        listing.assert_status_ok();
        let json: Value = listing.json();
        assert_eq!(json["data"].as_array().unwrap().len(), 0);
        assert_eq!(json["meta"]["total"], 0);
    }

    #[tokio::test]
    async fn test_non_csv_content_type_rejected() {
        let response = server()
            .post("/contacts")
            .add_header(TEST_USER_HEADER, "u1")
            .multipart(csv_form(TWO_CONTACTS, "application/json"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_file_part_rejected() {
        let form = MultipartForm::new().add_text("note", "no file here");
        let response = server()
            .post("/contacts")
            .add_header(TEST_USER_HEADER, "u1")
            .multipart(form)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_second_file_part_rejected() {
        let form = csv_form(TWO_CONTACTS, "text/csv").add_part(
            UPLOAD_FIELD_NAME,
            Part::bytes(TWO_CONTACTS.as_bytes().to_vec())
                .file_name("more.csv")
                .mime_type("text/csv"),
        );
        let response = server()
            .post("/contacts")
            .add_header(TEST_USER_HEADER, "u1")
            .multipart(form)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json: Value = response.json();
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().contains("Only one"));
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let server = server_with_limit(32);
        let response = server
            .post("/contacts")
            .add_header(TEST_USER_HEADER, "u1")
            .multipart(csv_form(TWO_CONTACTS, "text/csv"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_anonymous_request_unauthorized() {
        let response = server().get("/contacts").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_date_filter_and_listing() {
        let server = server();
        let batch_id = upload(&server, "u1", TWO_CONTACTS).await;
        wait_for_batch(&server, "u1", &batch_id).await;

        let today = chrono::Utc::now().date_naive();
        let range = format!(
            "{} - {}",
            (today - chrono::Days::new(3)).format("%Y/%m/%d"),
            today.format("%Y/%m/%d")
        );
        let json: Value = server
            .get("/contacts")
            .add_query_param("date", &range)
            .add_header(TEST_USER_HEADER, "u1")
            .await
            .json();
        assert_eq!(json["meta"]["total"], 1);
        assert_eq!(json["data"][0]["batchId"], batch_id.as_str());
        assert_eq!(json["data"][0]["totalContacts"], 2);

        let tomorrow = (today + chrono::Days::new(1)).format("%Y/%m/%d").to_string();
        let json: Value = server
            .get("/contacts")
            .add_query_param("date", &tomorrow)
            .add_header(TEST_USER_HEADER, "u1")
            .await
            .json();
        assert_eq!(json["meta"]["total"], 0);

        let json: Value = server
            .get("/contacts")
            .add_header(TEST_USER_HEADER, "u1")
            .await
            .json();
        assert_eq!(json["meta"]["total"], 1);

        let json: Value = server
            .get("/contacts")
            .add_header(TEST_USER_HEADER, "u2")
            .await
            .json();
        assert_eq!(json["meta"]["total"], 0);
    }

    #[tokio::test]
    async fn test_malformed_date_is_bad_request() {
        let server = server();
        for bad in ["2024-01-15", "yesterday", "2024/01/20 - 2024/01/10", ""] {
            let response = server
                .get("/contacts")
                .add_query_param("date", bad)
                .add_header(TEST_USER_HEADER, "u1")
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_raw_output_returns_original_file() {
        let server = server();
        let batch_id = upload(&server, "u1", TWO_CONTACTS).await;
        wait_for_batch(&server, "u1", &batch_id).await;

        let response = server
            .get(&format!("/contacts/{}", batch_id))
            .add_query_param("output", "raw")
            .add_header(TEST_USER_HEADER, "u1")
            .await;

        response.assert_status_ok();
        assert_eq!(response.header(header::CONTENT_TYPE), "text/csv");
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            "attachment; filename=\"contacts.csv\""
        );
        assert_eq!(response.text(), TWO_CONTACTS);
    }

    #[tokio::test]
    async fn test_unknown_output_uses_error_envelope() {
        let server = server();
        let batch_id = upload(&server, "u1", TWO_CONTACTS).await;
        wait_for_batch(&server, "u1", &batch_id).await;

        let response = server
            .get(&format!("/contacts/{}", batch_id))
            .add_query_param("output", "xml")
            .add_header(TEST_USER_HEADER, "u1")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json: Value = response.json();
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().contains("'xml'"));

        let upper = server
            .get(&format!("/contacts/{}", batch_id))
            .add_query_param("output", "RAW")
            .add_header(TEST_USER_HEADER, "u1")
            .await;
        upper.assert_status_ok();
        assert_eq!(upper.text(), TWO_CONTACTS);
    }

    #[tokio::test]
    async fn test_records_listed_in_file_order() {
        let server = server();
        let batch_id = upload(&server, "u1", TWO_CONTACTS).await;
        wait_for_batch(&server, "u1", &batch_id).await;

        let json: Value = server
            .get(&format!("/contacts/{}/records", batch_id))
            .add_header(TEST_USER_HEADER, "u1")
            .await
            .json();

        assert_eq!(json["meta"]["total"], 2);
        assert_eq!(json["data"][0]["firstName"], "Ann");
        assert_eq!(json["data"][1]["companyName"], "Globex");
    }

    #[tokio::test]
    async fn test_delete_hides_batch_everywhere() {
        let server = server();
        let batch_id = upload(&server, "u1", TWO_CONTACTS).await;
        wait_for_batch(&server, "u1", &batch_id).await;

        server
            .delete(&format!("/contacts/{}", batch_id))
            .add_header(TEST_USER_HEADER, "u2")
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let response = server
            .delete(&format!("/contacts/{}", batch_id))
            .add_header(TEST_USER_HEADER, "u1")
            .await;
        response.assert_status(StatusCode::ACCEPTED);
        let json: Value = response.json();
        assert_eq!(json["data"]["scheduled"], true);

        for path in [
            format!("/contacts/{}", batch_id),
            format!("/contacts/{}?output=raw", batch_id),
            format!("/contacts/{}/records", batch_id),
        ] {
            server
                .get(&path)
                .add_header(TEST_USER_HEADER, "u1")
                .await
                .assert_status(StatusCode::NOT_FOUND);
        }

        let json: Value = server
            .get("/contacts")
            .add_header(TEST_USER_HEADER, "u1")
            .await
            .json();
        assert_eq!(json["meta"]["total"], 0);
    }

    #[tokio::test]
    async fn test_unknown_batch_id_is_not_found() {
        let server = server();
        for id in ["not-a-uuid", "6f1c2d3e-0000-4000-8000-000000000000"] {
            server
                .get(&format!("/contacts/{}", id))
                .add_header(TEST_USER_HEADER, "u1")
                .await
                .assert_status(StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("leads.csv"), "leads.csv");
        assert_eq!(sanitize_filename("a\"b\\c\r\n.csv"), "a_b_c__.csv");
        assert_eq!(sanitize_filename("kontakté.csv"), "kontakt_.csv");
    }
}
