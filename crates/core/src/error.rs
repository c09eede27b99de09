use thiserror::Error;

/// Errors surfaced by ingestion, post-processing, and the persistence codec.
///
/// Ingestion errors never discard already-ingested data; post-processing
/// errors abort the whole pass and leave previously derived state intact.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Enter/leave marks broke the stack discipline (unbalanced or closing
    /// a range of a different category).
    #[error("malformed trace: {0}")]
    MalformedTrace(String),

    /// A time range with `end < start`, or a negative event length.
    #[error("invalid time range: {start}..{end}")]
    InvalidTimeRange { start: i64, end: i64 },

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid trace file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported trace file version {0}")]
    UnsupportedVersion(u32),
}
