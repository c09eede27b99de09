use serde::{Deserialize, Serialize};

use crate::error::TraceError;

/// A mutable `[start, end)` view window, independent of trace data.
///
/// Communicates the visible window between collaborators; not involved in
/// aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomRange {
    start: i64,
    end: i64,
}

impl ZoomRange {
    pub fn new(start: i64, end: i64) -> Result<Self, TraceError> {
        let mut range = Self::default();
        range.set_range(start, end)?;
        Ok(range)
    }

    /// Replace the window. An inverted range is rejected and the previous
    /// window is retained.
    pub fn set_range(&mut self, start: i64, end: i64) -> Result<(), TraceError> {
        if end < start {
            return Err(TraceError::InvalidTimeRange { start, end });
        }
        self.start = start;
        self.end = end;
        Ok(())
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn duration(&self) -> i64 {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_range() {
        let mut range = ZoomRange::new(10, 50).unwrap();
        assert!(range.set_range(60, 40).is_err());
        assert_eq!(range.start(), 10);
        assert_eq!(range.end(), 50);
        assert_eq!(range.duration(), 40);
    }

    #[test]
    fn empty_window_is_valid() {
        let range = ZoomRange::new(5, 5).unwrap();
        assert_eq!(range.duration(), 0);
    }
}
