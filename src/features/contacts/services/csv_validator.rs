use thiserror::Error;

use crate::core::error::AppError;
use crate::features::contacts::models::{ColumnMap, CsvSchema};
use crate::shared::constants::CSV_MEDIA_TYPE;

/// Why an upload was refused before any parsing happened
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("Invalid content type '{0}': only {media} files are accepted", media = CSV_MEDIA_TYPE)]
    InvalidContentType(String),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

impl From<RejectionReason> for AppError {
    fn from(reason: RejectionReason) -> Self {
        AppError::Validation(reason.to_string())
    }
}

/// Whether a declared content type names the CSV media type.
/// Parameters such as `charset` are ignored.
pub fn is_csv_media_type(declared: &str) -> bool {
    declared
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(CSV_MEDIA_TYPE))
        .unwrap_or(false)
}

/// Check an upload's declared type and header row against the required schema.
///
/// Extra columns are tolerated. On success the positions of the four
/// contact fields are returned for the parser.
pub fn validate(
    declared_content_type: &str,
    header_row: &[String],
    schema: &CsvSchema,
) -> Result<ColumnMap, RejectionReason> {
    if !is_csv_media_type(declared_content_type) {
        return Err(RejectionReason::InvalidContentType(
            declared_content_type.to_string(),
        ));
    }

    let position = |name: &str| header_row.iter().position(|h| h == name);
    let [first_name, last_name, email, company_name] =
        schema.required().map(|name| position(name));

    match (first_name, last_name, email, company_name) {
        (Some(first_name), Some(last_name), Some(email), Some(company_name)) => Ok(ColumnMap {
            first_name,
            last_name,
            email,
            company_name,
        }),
        _ => {
            let missing = schema
                .required()
                .into_iter()
                .filter(|name| position(*name).is_none())
                .map(str::to_string)
                .collect();
            Err(RejectionReason::MissingColumns(missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_csv_media_type_detection() {
        assert!(is_csv_media_type("text/csv"));
        assert!(is_csv_media_type("text/csv; charset=utf-8"));
        assert!(is_csv_media_type("Text/CSV"));
        assert!(!is_csv_media_type("application/json"));
        assert!(!is_csv_media_type("application/vnd.ms-excel"));
        assert!(!is_csv_media_type(""));
    }

    #[test]
    fn test_accepts_exact_header_set() {
        let map = validate(
            "text/csv",
            &header(&["firstName", "lastName", "email", "companyName"]),
            &CsvSchema::default(),
        )
        .unwrap();
        assert_eq!(
            map,
            ColumnMap {
                first_name: 0,
                last_name: 1,
                email: 2,
                company_name: 3
            }
        );
    }

    #[test]
    fn test_extra_and_reordered_columns_tolerated() {
        let map = validate(
            "text/csv",
            &header(&["phone", "companyName", "email", "lastName", "firstName"]),
            &CsvSchema::default(),
        )
        .unwrap();
        assert_eq!(map.first_name, 4);
        assert_eq!(map.company_name, 1);
    }

    #[test]
    fn test_wrong_content_type_rejected_first() {
        let err = validate("application/json", &header(&[]), &CsvSchema::default()).unwrap_err();
        assert_eq!(
            err,
            RejectionReason::InvalidContentType("application/json".to_string())
        );
        assert_eq!(
            err.to_string(),
            "Invalid content type 'application/json': only text/csv files are accepted"
        );
    }

    #[test]
    fn test_missing_columns_listed_in_schema_order() {
        let err = validate(
            "text/csv",
            &header(&["firstName", "email"]),
            &CsvSchema::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RejectionReason::MissingColumns(vec![
                "lastName".to_string(),
                "companyName".to_string()
            ])
        );
        assert_eq!(
            err.to_string(),
            "Missing required columns: lastName, companyName"
        );
    }

    #[test]
    fn test_header_matching_is_case_sensitive() {
        let err = validate(
            "text/csv",
            &header(&["FirstName", "lastName", "email", "companyName"]),
            &CsvSchema::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RejectionReason::MissingColumns(vec!["firstName".to_string()])
        );
    }

    #[test]
    fn test_empty_header_row_misses_everything() {
        let err = validate("text/csv", &[], &CsvSchema::default()).unwrap_err();
        assert!(matches!(err, RejectionReason::MissingColumns(ref m) if m.len() == 4));
    }
}
