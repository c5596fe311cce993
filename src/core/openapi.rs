use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::auth;
use crate::features::contacts::{dtos as contacts_dtos, handlers as contacts_handlers};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        contacts_handlers::upload_contacts,
        contacts_handlers::list_contacts,
        contacts_handlers::get_contacts,
        contacts_handlers::list_contact_records,
        contacts_handlers::delete_contacts,
    ),
    components(
        schemas(
            // Shared
            Meta,
            auth::model::AuthenticatedUser,
            // Contacts
            contacts_dtos::UploadCsvDto,
            contacts_dtos::UploadAcceptedDto,
            contacts_dtos::BatchSummaryDto,
            contacts_dtos::ContactRecordDto,
            contacts_dtos::DeleteBatchResponseDto,
            contacts_dtos::OutputFormat,
            ApiResponse<contacts_dtos::UploadAcceptedDto>,
            ApiResponse<contacts_dtos::BatchSummaryDto>,
            ApiResponse<Vec<contacts_dtos::BatchSummaryDto>>,
            ApiResponse<Vec<contacts_dtos::ContactRecordDto>>,
            ApiResponse<contacts_dtos::DeleteBatchResponseDto>,
        )
    ),
    tags(
        (name = "contacts", description = "CSV contact uploads, listing, download and deletion"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Contacts API",
        version = "0.1.0",
        description = "API documentation for the contacts upload service",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to the OpenAPI document
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
