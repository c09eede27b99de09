use serde::{Deserialize, Serialize};

use crate::model::{DescriptionId, EventCategory};

/// One concrete firing of a range event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub description: DescriptionId,
    /// Start time in trace ticks.
    pub start: i64,
    pub duration: i64,
    /// Depth of concurrently open occurrences of any kind at `start`.
    /// 0 for top-level occurrences.
    pub nesting_level: u32,
    /// Recursion depth among occurrences of the same description.
    pub nesting_depth: u32,
}

impl Occurrence {
    pub fn end(&self) -> i64 {
        self.start + self.duration
    }
}

/// Arrival-ordered ingestion record of the range track.
///
/// Ranged records carry a complete `[start, start + duration)` span.
/// Enter/leave marks are the low-level stack-style path; they are matched
/// by strict LIFO discipline during post-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawRecord {
    Ranged {
        description: DescriptionId,
        start: i64,
        duration: i64,
    },
    Enter {
        description: DescriptionId,
        time: i64,
    },
    Leave {
        category: EventCategory,
        time: i64,
    },
}
