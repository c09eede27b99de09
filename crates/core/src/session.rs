use log::debug;

use crate::call_tree::{CallNodeId, CallRecord, CallTreeRegistry};
use crate::error::TraceError;
use crate::model::{DescriptionId, EventCategory, Occurrence, RawRecord};
use crate::notify::{Notification, ObserverSet};
use crate::registry::DescriptionRegistry;

/// Post-processed index state. Empty until the first successful
/// `complete()`; replaced atomically by each pass.
#[derive(Debug, Default)]
pub(crate) struct TraceIndex {
    /// All closed occurrences, in arrival order.
    pub occurrences: Vec<Occurrence>,
    /// Permutation: position in start order → arrival index.
    pub start_order: Vec<u32>,
    /// Permutation: position in end order → arrival index.
    pub end_order: Vec<u32>,
    /// Link: position in end order → position in start order.
    pub end_to_start: Vec<u32>,
    /// Start-order positions of top-level (nesting level 0) occurrences.
    pub top_level: Vec<u32>,
    /// Per-category views, indexed by `EventCategory::index()`.
    pub categories: Vec<CategoryView>,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct CategoryView {
    /// Descriptions of this category with at least one in-window
    /// occurrence, in id order.
    pub descriptions: Vec<DescriptionId>,
    pub max_nesting_depth: u32,
}

/// The aggregation engine: two ingestion tracks, one query layer.
///
/// Range events and call-tree events are appended in arrival order by a
/// single writer; `complete()` runs the post-processing pipeline and makes
/// the query layer valid. All derived state is discarded by `clear()` and
/// re-derived by replay, never repaired incrementally.
#[derive(Default)]
pub struct TraceSession {
    pub(crate) registry: DescriptionRegistry,
    pub(crate) calls: CallTreeRegistry,
    /// Raw range-track records, in arrival order.
    pub(crate) raw: Vec<RawRecord>,
    /// Raw call-track records, in arrival order (persistence replay only).
    pub(crate) raw_calls: Vec<CallRecord>,
    pub(crate) index: TraceIndex,
    pub(crate) trace_start: Option<i64>,
    pub(crate) trace_end: Option<i64>,
    pub(crate) observers: ObserverSet,
}

impl TraceSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for session notifications. Callbacks run
    /// synchronously on the mutating thread, in registration order.
    pub fn subscribe(&mut self, observer: impl Fn(&Notification) + 'static) {
        self.observers.subscribe(observer);
    }

    /// Append one complete range event. `length < 0` is rejected and the
    /// already-ingested data is retained. Never triggers post-processing.
    pub fn add_ranged_event(
        &mut self,
        category: EventCategory,
        start_time: i64,
        length: i64,
        context: &[String],
        file_name: &str,
        line: i32,
    ) -> Result<(), TraceError> {
        if length < 0 {
            return Err(TraceError::InvalidTimeRange {
                start: start_time,
                end: start_time + length,
            });
        }
        let description = self.register(category, context, file_name, line);
        self.raw.push(RawRecord::Ranged {
            description,
            start: start_time,
            duration: length,
        });
        Ok(())
    }

    /// Open a range at `time`. The matching [`add_leave_mark`] closes the
    /// most recently opened, not-yet-closed range of the same category;
    /// post-processing reports `MalformedTrace` for unbalanced marks.
    ///
    /// [`add_leave_mark`]: TraceSession::add_leave_mark
    pub fn add_enter_mark(
        &mut self,
        category: EventCategory,
        time: i64,
        context: &[String],
        file_name: &str,
        line: i32,
    ) {
        let description = self.register(category, context, file_name, line);
        self.raw.push(RawRecord::Enter { description, time });
    }

    /// Close the most recently opened range of `category` at `time`.
    pub fn add_leave_mark(&mut self, category: EventCategory, time: i64) {
        self.raw.push(RawRecord::Leave { category, time });
    }

    fn register(
        &mut self,
        category: EventCategory,
        context: &[String],
        file_name: &str,
        line: i32,
    ) -> DescriptionId {
        let details = context.join(" ");
        self.registry.register(category, &details, file_name, line)
    }

    /// Accumulate one pre-aggregated call-tree event. Depth and total/self
    /// time come from the sampling runtime, so this track bypasses the
    /// start/end reconciliation of the range track.
    pub fn add_call_tree_event(
        &mut self,
        depth: u32,
        function: &str,
        file_name: &str,
        line: i32,
        total_time: f64,
        self_time: f64,
    ) -> CallNodeId {
        self.raw_calls.push(CallRecord {
            depth,
            function: function.to_string(),
            filename: file_name.to_string(),
            line,
            total_time,
            self_time,
        });
        self.calls
            .record(depth, function, file_name, line, total_time, self_time)
    }

    /// Widen the trace start bound. Bounds are monotonic: a later call can
    /// only move the start earlier. A start past the current end is
    /// rejected and the previous bounds are retained.
    pub fn set_trace_start_time(&mut self, time: i64) -> Result<(), TraceError> {
        if let Some(end) = self.trace_end
            && time > end
        {
            return Err(TraceError::InvalidTimeRange { start: time, end });
        }
        self.trace_start = Some(match self.trace_start {
            Some(current) => current.min(time),
            None => time,
        });
        Ok(())
    }

    /// Widen the trace end bound; the monotonic counterpart of
    /// [`set_trace_start_time`](TraceSession::set_trace_start_time).
    pub fn set_trace_end_time(&mut self, time: i64) -> Result<(), TraceError> {
        if let Some(start) = self.trace_start
            && time < start
        {
            return Err(TraceError::InvalidTimeRange { start, end: time });
        }
        self.trace_end = Some(match self.trace_end {
            Some(current) => current.max(time),
            None => time,
        });
        Ok(())
    }

    /// Ingestion for the current trace window is finished: run the
    /// post-processing pipeline and make the query layer valid.
    ///
    /// Emits `ProcessingStarted`, then `CountChanged` + `DataReady` on
    /// success or `Error` on failure. A failed pass leaves the previously
    /// valid derived state untouched. Idempotent: re-running without new
    /// ingestion reproduces identical aggregates.
    pub fn complete(&mut self) -> Result<(), TraceError> {
        self.observers.emit(&Notification::ProcessingStarted);
        match self.post_process() {
            Ok(()) => {
                self.observers.emit(&Notification::CountChanged);
                self.observers.emit(&Notification::DataReady);
                Ok(())
            }
            Err(err) => {
                self.observers.emit(&Notification::Error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Discard everything: raw records, registries, indices, bounds.
    /// Observers stay registered.
    pub fn clear(&mut self) {
        debug!(
            "clearing session ({} raw records, {} call records)",
            self.raw.len(),
            self.raw_calls.len()
        );
        self.registry.clear();
        self.calls.clear();
        self.raw.clear();
        self.raw_calls.clear();
        self.index = TraceIndex::default();
        self.trace_start = None;
        self.trace_end = None;
        self.observers.emit(&Notification::DataCleared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn bounds_widen_monotonically() {
        let mut session = TraceSession::new();
        session.set_trace_start_time(100).unwrap();
        session.set_trace_end_time(500).unwrap();

        // widening is accepted
        session.set_trace_start_time(50).unwrap();
        session.set_trace_end_time(900).unwrap();
        // narrowing is ignored
        session.set_trace_start_time(200).unwrap();
        session.set_trace_end_time(300).unwrap();

        assert_eq!(session.trace_start_time(), 50);
        assert_eq!(session.trace_end_time(), 900);
        assert_eq!(session.trace_duration(), 850);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let mut session = TraceSession::new();
        session.set_trace_start_time(100).unwrap();
        assert!(session.set_trace_end_time(99).is_err());
        session.set_trace_end_time(200).unwrap();
        assert!(session.set_trace_start_time(201).is_err());

        assert_eq!(session.trace_start_time(), 100);
        assert_eq!(session.trace_end_time(), 200);
    }

    #[test]
    fn negative_length_is_rejected_and_data_retained() {
        let mut session = TraceSession::new();
        session
            .add_ranged_event(EventCategory::Binding, 0, 10, &[], "a.qml", 1)
            .unwrap();
        let err = session.add_ranged_event(EventCategory::Binding, 20, -5, &[], "a.qml", 1);
        assert!(matches!(err, Err(TraceError::InvalidTimeRange { .. })));

        session.complete().unwrap();
        assert_eq!(session.count(), 1);
    }

    #[test]
    fn notification_order_on_complete_and_clear() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut session = TraceSession::new();
        let sink = Rc::clone(&seen);
        session.subscribe(move |n| sink.borrow_mut().push(n.clone()));

        session
            .add_ranged_event(EventCategory::Painting, 0, 10, &[], "a.qml", 1)
            .unwrap();
        session.complete().unwrap();
        session.clear();

        assert_eq!(
            *seen.borrow(),
            vec![
                Notification::ProcessingStarted,
                Notification::CountChanged,
                Notification::DataReady,
                Notification::DataCleared,
            ]
        );
    }

    #[test]
    fn failed_pass_emits_error_and_keeps_previous_state() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut session = TraceSession::new();
        let sink = Rc::clone(&seen);
        session.subscribe(move |n| sink.borrow_mut().push(n.clone()));

        session
            .add_ranged_event(EventCategory::Binding, 0, 10, &[], "a.qml", 1)
            .unwrap();
        session.complete().unwrap();

        // unbalanced leave: the next pass must fail without touching count()
        session.add_leave_mark(EventCategory::Binding, 50);
        let err = session.complete();
        assert!(matches!(err, Err(TraceError::MalformedTrace(_))));
        assert_eq!(session.count(), 1);
        assert!(matches!(
            seen.borrow().last(),
            Some(Notification::Error(_))
        ));
    }

    #[test]
    fn clear_resets_description_ids() {
        let mut session = TraceSession::new();
        session
            .add_ranged_event(EventCategory::Binding, 0, 10, &["a".into()], "a.qml", 1)
            .unwrap();
        session.clear();
        session
            .add_ranged_event(EventCategory::Binding, 0, 10, &["b".into()], "b.qml", 2)
            .unwrap();

        assert_eq!(session.descriptions().len(), 1);
        assert_eq!(session.descriptions()[0].id, DescriptionId(0));
        assert_eq!(session.descriptions()[0].details, "b");
    }
}
