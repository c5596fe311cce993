use std::fmt;

/// Lifecycle of one upload, from receipt to committed metadata.
///
/// Linear: `Received -> Validated -> BatchIdAssigned -> Parsed -> Persisted -> Accepted`.
/// `Queued` marks the hand-off to the worker pool between `BatchIdAssigned`
/// and `Parsed`. `Rejected` is terminal and reachable from `Received`
/// (validation) or from the worker (parse or store failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStage {
    Received,
    Validated,
    BatchIdAssigned,
    Queued,
    Parsed,
    Persisted,
    Accepted,
    Rejected,
}

impl fmt::Display for IngestionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IngestionStage::Received => "received",
            IngestionStage::Validated => "validated",
            IngestionStage::BatchIdAssigned => "batch_id_assigned",
            IngestionStage::Queued => "queued",
            IngestionStage::Parsed => "parsed",
            IngestionStage::Persisted => "persisted",
            IngestionStage::Accepted => "accepted",
            IngestionStage::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}
