use serde::{Deserialize, Serialize};

use crate::model::EventCategory;

/// Dense, stable identifier of an [`EventDescription`] within one trace.
///
/// Ids are assigned on first sighting and never reused until `clear()`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DescriptionId(pub u32);

impl DescriptionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Aggregated statistics of one event kind. Rebuilt atomically by each
/// statistics pass; meaningless before the first successful `complete()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptionStats {
    /// Sum of all occurrence durations.
    pub cumulative_duration: i64,
    /// Occurrence count.
    pub calls: u64,
    pub min_duration: i64,
    pub max_duration: i64,
    /// `cumulative_duration / calls`.
    pub time_per_call: f64,
    /// Share of the statistics window, in percent. 0 when the window is empty.
    pub percent_of_time: f64,
    /// Upper median of the sorted duration list.
    pub median_duration: i64,
    /// Position of this description within its category's view.
    pub pos_in_category: u32,
}

/// Canonical, deduplicated identity for a kind of range event (source
/// position, detail text, category) plus its aggregated statistics.
///
/// Relationships are arena-indexed: parents, children, and occurrence
/// back-references are dense ids/indices, not pointers. The occurrence list
/// exists for iteration only; occurrences are owned by the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDescription {
    pub id: DescriptionId,
    /// Short label derived from the source position (`basename:line`).
    pub display_name: String,
    pub filename: String,
    pub line: i32,
    /// Free-form detail text (joined context fields).
    pub details: String,
    pub category: EventCategory,
    /// Direct callers in the reconstructed call graph.
    pub parents: Vec<DescriptionId>,
    /// Direct callees in the reconstructed call graph.
    pub children: Vec<DescriptionId>,
    /// Arrival-order indices of this kind's occurrences.
    pub occurrences: Vec<u32>,
    pub stats: DescriptionStats,
}
