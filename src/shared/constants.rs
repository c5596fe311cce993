/// Media type an upload must declare
pub const CSV_MEDIA_TYPE: &str = "text/csv";

/// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD_NAME: &str = "csv_file";

/// Wire format of every date accepted or returned by the contacts API
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Header names required when CSV_REQUIRED_HEADERS is not set,
/// in the order first name, last name, email, company name
pub const DEFAULT_REQUIRED_HEADERS: [&str; 4] = ["firstName", "lastName", "email", "companyName"];

/// Shared by missing and foreign batches so existence is never disclosed
pub const BATCH_NOT_FOUND: &str = "Contacts file not found";

/// Multipart overhead allowed on top of the configured upload size
pub const MULTIPART_OVERHEAD: usize = 1024 * 1024;
