use std::io::Read;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use thiserror::Error;
use uuid::Uuid;

use crate::features::contacts::models::{ColumnMap, ContactRecord};

/// A data row that could not be read even though the header was accepted.
/// Fatal for the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed CSV at line {line}: {reason}")]
pub struct ParseDefect {
    pub line: u64,
    pub reason: String,
}

impl From<csv::Error> for ParseDefect {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        let reason = match err.kind() {
            csv::ErrorKind::UnequalLengths {
                expected_len, len, ..
            } => format!("expected {} fields, found {}", expected_len, len),
            csv::ErrorKind::Utf8 { .. } => "row is not valid UTF-8".to_string(),
            _ => err.to_string(),
        };
        Self { line, reason }
    }
}

fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(true).flexible(false).trim(Trim::Headers);
    builder
}

/// Read only the header row of an upload.
///
/// Unreadable or empty input yields an empty row, which the validator
/// then reports as missing every required column.
pub fn read_header_row(data: &[u8]) -> Vec<String> {
    let mut reader = reader_builder().from_reader(data);
    let Ok(headers) = reader.byte_headers() else {
        return Vec::new();
    };

    headers
        .iter()
        .map(|h| {
            String::from_utf8_lossy(h)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_string()
        })
        .collect()
}

/// Lazily turns the data rows of an accepted upload into contact records.
///
/// Each row is read from the underlying reader exactly once; the parser
/// cannot be rewound.
pub struct ContactRowParser<R: Read> {
    records: StringRecordsIntoIter<R>,
    columns: ColumnMap,
    batch_id: Uuid,
    owner_id: String,
    uploaded_at: NaiveDate,
    row_number: i32,
}

impl<R: Read> ContactRowParser<R> {
    pub fn new(
        reader: R,
        columns: ColumnMap,
        batch_id: Uuid,
        owner_id: impl Into<String>,
        uploaded_at: NaiveDate,
    ) -> Self {
        Self {
            records: reader_builder().from_reader(reader).into_records(),
            columns,
            batch_id,
            owner_id: owner_id.into(),
            uploaded_at,
            row_number: 0,
        }
    }

    fn to_contact(&self, record: &StringRecord) -> Result<ContactRecord, ParseDefect> {
        let field = |idx: usize| {
            record.get(idx).map(str::to_string).ok_or_else(|| ParseDefect {
                line: record.position().map(|p| p.line()).unwrap_or(0),
                reason: format!("missing field at column {}", idx + 1),
            })
        };

        Ok(ContactRecord {
            contact_id: Uuid::now_v7(),
            batch_id: self.batch_id,
            owner_id: self.owner_id.clone(),
            row_number: self.row_number,
            first_name: field(self.columns.first_name)?,
            last_name: field(self.columns.last_name)?,
            email: field(self.columns.email)?,
            company_name: field(self.columns.company_name)?,
            uploaded_at: self.uploaded_at,
        })
    }
}

impl<R: Read> Iterator for ContactRowParser<R> {
    type Item = Result<ContactRecord, ParseDefect>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };
        self.row_number = self.row_number.saturating_add(1);
        Some(self.to_contact(&record))
    }
}
