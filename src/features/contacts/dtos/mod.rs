mod contact_dto;

pub use contact_dto::{
    BatchSummaryDto, ContactRecordDto, DeleteBatchResponseDto, GetContactsQuery,
    ListContactsQuery, OutputFormat, RawDownload, UploadAcceptedDto, UploadCsvDto,
};
