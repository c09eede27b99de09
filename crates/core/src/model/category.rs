use serde::{Deserialize, Serialize};

/// Enumerated kind of a range event, as reported by the instrumented runtime.
///
/// Categories are dense: `index()` / `from_index()` map to `0..ALL.len()`
/// for per-category tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    Painting,
    Compiling,
    Creating,
    Binding,
    HandlingSignal,
}

impl EventCategory {
    /// All categories, in dense index order.
    pub const ALL: [EventCategory; 5] = [
        EventCategory::Painting,
        EventCategory::Compiling,
        EventCategory::Creating,
        EventCategory::Binding,
        EventCategory::HandlingSignal,
    ];

    /// Dense index of this category.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<EventCategory> {
        Self::ALL.get(index).copied()
    }

    /// Human-readable label for reports.
    pub fn label(self) -> &'static str {
        match self {
            EventCategory::Painting => "Painting",
            EventCategory::Compiling => "Compiling",
            EventCategory::Creating => "Creating",
            EventCategory::Binding => "Binding",
            EventCategory::HandlingSignal => "Handling Signal",
        }
    }
}
