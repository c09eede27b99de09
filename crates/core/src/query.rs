//! Read-only indexed access to the post-processed trace.
//!
//! All indices are positions in the start-sorted order. The query layer is
//! only meaningful between a successful `complete()` and the next
//! `clear()`; per-index accessors are O(1), range lookups are binary
//! searches. Out-of-range indices fail a debug assertion and yield a
//! sentinel in release builds.

use crate::call_tree::{CallNode, CallNodeId};
use crate::model::{DescriptionId, EventCategory, EventDescription, Occurrence};
use crate::session::TraceSession;

impl TraceSession {
    /// Number of post-processed occurrences.
    pub fn count(&self) -> usize {
        self.index.start_order.len()
    }

    fn occurrence_at(&self, index: usize) -> Option<&Occurrence> {
        debug_assert!(
            index < self.count(),
            "index {index} out of range ({} occurrences)",
            self.count()
        );
        let oi = *self.index.start_order.get(index)?;
        self.index.occurrences.get(oi as usize)
    }

    pub fn get_start_time(&self, index: usize) -> i64 {
        self.occurrence_at(index).map_or(-1, |o| o.start)
    }

    pub fn get_end_time(&self, index: usize) -> i64 {
        self.occurrence_at(index).map_or(-1, |o| o.end())
    }

    pub fn get_duration(&self, index: usize) -> i64 {
        self.occurrence_at(index).map_or(-1, |o| o.duration)
    }

    pub fn get_category(&self, index: usize) -> Option<EventCategory> {
        let occurrence = self.occurrence_at(index)?;
        self.registry.get(occurrence.description).map(|d| d.category)
    }

    pub fn get_nesting_level(&self, index: usize) -> u32 {
        self.occurrence_at(index).map_or(0, |o| o.nesting_level)
    }

    pub fn get_nesting_depth(&self, index: usize) -> u32 {
        self.occurrence_at(index).map_or(0, |o| o.nesting_depth)
    }

    pub fn get_filename(&self, index: usize) -> &str {
        self.description_of(index).map_or("", |d| d.filename.as_str())
    }

    pub fn get_line(&self, index: usize) -> i32 {
        self.description_of(index).map_or(-1, |d| d.line)
    }

    pub fn get_details(&self, index: usize) -> &str {
        self.description_of(index).map_or("", |d| d.details.as_str())
    }

    pub fn get_description_id(&self, index: usize) -> Option<DescriptionId> {
        self.occurrence_at(index).map(|o| o.description)
    }

    fn description_of(&self, index: usize) -> Option<&EventDescription> {
        let occurrence = self.occurrence_at(index)?;
        self.registry.get(occurrence.description)
    }

    /// Smallest index whose occurrence starts at or after `start_time`;
    /// `count()` if none does.
    pub fn find_first_index(&self, start_time: i64) -> usize {
        self.index
            .start_order
            .partition_point(|&oi| self.index.occurrences[oi as usize].start < start_time)
    }

    /// Like [`find_first_index`](TraceSession::find_first_index), but
    /// considers only top-level occurrences (nesting level 0), for coarse
    /// overview rendering.
    pub fn find_first_index_no_parents(&self, start_time: i64) -> usize {
        let top = &self.index.top_level;
        let pos = top.partition_point(|&si| {
            let oi = self.index.start_order[si as usize] as usize;
            self.index.occurrences[oi].start < start_time
        });
        top.get(pos).map_or(self.count(), |&si| si as usize)
    }

    /// Index (in start order) of the last occurrence whose end is at or
    /// before `end_time`; `None` if no occurrence has ended by then.
    pub fn find_last_index(&self, end_time: i64) -> Option<usize> {
        let pos = self
            .index
            .end_order
            .partition_point(|&oi| self.index.occurrences[oi as usize].end() <= end_time);
        if pos == 0 {
            None
        } else {
            Some(self.index.end_to_start[pos - 1] as usize)
        }
    }

    /// Number of distinct event kinds of `category` seen by the last
    /// statistics pass.
    pub fn unique_events_of_type(&self, category: EventCategory) -> usize {
        self.index
            .categories
            .get(category.index())
            .map_or(0, |v| v.descriptions.len())
    }

    /// Maximum same-kind nesting depth among the category's occurrences;
    /// 0 when the category is empty.
    pub fn max_nesting_for_type(&self, category: EventCategory) -> u32 {
        self.index
            .categories
            .get(category.index())
            .map_or(0, |v| v.max_nesting_depth)
    }

    /// Detail text of the `index`-th event kind within `category`.
    pub fn event_text_for_type(&self, category: EventCategory, index: usize) -> &str {
        let Some(view) = self.index.categories.get(category.index()) else {
            return "";
        };
        debug_assert!(
            index < view.descriptions.len(),
            "index {index} out of range ({} kinds)",
            view.descriptions.len()
        );
        view.descriptions
            .get(index)
            .and_then(|&id| self.registry.get(id))
            .map_or("", |d| d.details.as_str())
    }

    /// Position of the occurrence's event kind within its category view.
    pub fn event_pos_in_type(&self, index: usize) -> usize {
        self.description_of(index)
            .map_or(0, |d| d.stats.pos_in_category as usize)
    }

    /// All range-event descriptions, in id order.
    pub fn descriptions(&self) -> &[EventDescription] {
        self.registry.descriptions()
    }

    pub fn description(&self, id: DescriptionId) -> Option<&EventDescription> {
        self.registry.get(id)
    }

    /// All call-tree nodes, in id order.
    pub fn call_nodes(&self) -> &[CallNode] {
        self.calls.nodes()
    }

    pub fn call_node(&self, id: CallNodeId) -> Option<&CallNode> {
        self.calls.get(id)
    }

    /// Trace start bound; -1 when never set and no data was processed.
    pub fn trace_start_time(&self) -> i64 {
        self.trace_start.unwrap_or(-1)
    }

    /// Trace end bound; -1 when never set and no data was processed.
    pub fn trace_end_time(&self) -> i64 {
        self.trace_end.unwrap_or(-1)
    }

    pub fn trace_duration(&self) -> i64 {
        match (self.trace_start, self.trace_end) {
            (Some(start), Some(end)) => (end - start).max(0),
            _ => 0,
        }
    }

    /// Earliest occurrence start; -1 for an empty trace.
    pub fn first_time_mark(&self) -> i64 {
        self.index
            .start_order
            .first()
            .map_or(-1, |&oi| self.index.occurrences[oi as usize].start)
    }

    /// Latest occurrence end; -1 for an empty trace.
    pub fn last_time_mark(&self) -> i64 {
        self.index
            .end_order
            .last()
            .map_or(-1, |&oi| self.index.occurrences[oi as usize].end())
    }
}
