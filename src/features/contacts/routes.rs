use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::features::contacts::handlers::{
    delete_contacts, get_contacts, list_contact_records, list_contacts, upload_contacts,
    ContactsState,
};
use crate::features::contacts::services::{ContactService, IngestionService};
use crate::shared::constants::MULTIPART_OVERHEAD;

/// Create routes for the contacts feature
///
/// Every route expects an `AuthenticatedUser` in the request extensions.
pub fn routes(
    ingestion: Arc<IngestionService>,
    contacts: Arc<ContactService>,
    max_upload_size: usize,
) -> Router {
    let state = ContactsState {
        ingestion,
        contacts,
        max_upload_size,
    };

    Router::new()
        .route(
            "/contacts",
            // Allow body size up to the upload limit + buffer for multipart overhead
            post(upload_contacts)
                .layer(DefaultBodyLimit::max(max_upload_size + MULTIPART_OVERHEAD)),
        )
        .route("/contacts", get(list_contacts))
        .route("/contacts/{batchId}", get(get_contacts))
        .route("/contacts/{batchId}", delete(delete_contacts))
        .route("/contacts/{batchId}/records", get(list_contact_records))
        .with_state(state)
}
