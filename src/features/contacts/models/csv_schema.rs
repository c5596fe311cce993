use std::collections::HashSet;

use crate::shared::constants::DEFAULT_REQUIRED_HEADERS;

/// Header names that carry the four contact fields.
/// Matching is exact: casing and spelling must agree with the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSchema {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company_name: String,
}

impl Default for CsvSchema {
    fn default() -> Self {
        let [first_name, last_name, email, company_name] = DEFAULT_REQUIRED_HEADERS;
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            company_name: company_name.to_string(),
        }
    }
}

impl CsvSchema {
    /// Build a schema from exactly four distinct names given in field order
    pub fn from_header_names(names: Vec<String>) -> Result<Self, String> {
        let distinct: HashSet<&str> = names.iter().map(String::as_str).collect();
        if names.len() != 4 || distinct.len() != 4 || names.iter().any(|n| n.is_empty()) {
            return Err(format!(
                "CSV_REQUIRED_HEADERS must list four distinct names (first name, last name, email, company name), got {:?}",
                names
            ));
        }

        let mut names = names.into_iter();
        let mut next = || names.next().unwrap_or_default();
        Ok(Self {
            first_name: next(),
            last_name: next(),
            email: next(),
            company_name: next(),
        })
    }

    /// Required header names in field order
    pub fn required(&self) -> [&str; 4] {
        [
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.email.as_str(),
            self.company_name.as_str(),
        ]
    }
}

/// Column positions of the four contact fields within an accepted header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub first_name: usize,
    pub last_name: usize,
    pub email: usize,
    pub company_name: usize,
}
