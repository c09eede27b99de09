//! Profiling-event aggregation engine.
//!
//! Ingests timestamped, possibly-nested execution events from an
//! instrumented runtime (range events with explicit start + length, plus
//! pre-aggregated call-tree events) and turns them into queryable
//! statistics: per-kind aggregates, a reconstructed nesting hierarchy, and
//! binary-searchable time indices for interactive range queries.
//!
//! The two event tracks keep separate statistics spaces and are only ever
//! queried side by side. Ingestion appends raw records in arrival order;
//! [`TraceSession::complete`] runs the post-processing pipeline and makes
//! the query layer valid; [`TraceSession::clear`] discards everything.
//! Derived state is never repaired incrementally; reload and replay is
//! the recovery path.

pub mod call_tree;
pub mod error;
pub mod model;
pub mod notify;
pub mod registry;
pub mod session;

mod codec;
mod postprocess;
mod query;

pub use call_tree::{CallNode, CallNodeId, CallRecord, CallTreeRegistry};
pub use error::TraceError;
pub use model::{
    DescriptionId, DescriptionStats, EventCategory, EventDescription, Occurrence, RawRecord,
    ZoomRange,
};
pub use notify::Notification;
pub use registry::DescriptionRegistry;
pub use session::TraceSession;
