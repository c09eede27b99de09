//! The post-processing pipeline.
//!
//! Runs once per `complete()`, never incrementally: the reconciliation of
//! enter/leave marks and the nesting reconstruction both require the full
//! record set. Five ordered phases (start-index sort, end-index sort,
//! linking ends to starts, nesting levels, nesting depth) are followed by
//! one aggregation pass that folds occurrence timings into
//! per-description statistics.

use log::debug;

use crate::error::TraceError;
use crate::model::{EventCategory, Occurrence, RawRecord};
use crate::session::{CategoryView, TraceIndex, TraceSession};

impl TraceSession {
    pub(crate) fn post_process(&mut self) -> Result<(), TraceError> {
        debug!("post-processing {} raw records", self.raw.len());

        // Reconcile enter/leave marks first: it is the only fallible step,
        // and a failed pass must leave previously derived state untouched.
        let occurrences = self.materialize_occurrences()?;

        let start_order = sorted_by_start(&occurrences);
        let end_order = sorted_by_end(&occurrences);
        let end_to_start = link_ends_to_starts(&start_order, &end_order);

        self.index = TraceIndex {
            occurrences,
            start_order,
            end_order,
            end_to_start,
            top_level: Vec::new(),
            categories: Vec::new(),
        };

        self.compute_nesting_levels();
        self.compute_nesting_depths();
        let top_level = (0..self.index.start_order.len() as u32)
            .filter(|&pos| {
                let oi = self.index.start_order[pos as usize] as usize;
                self.index.occurrences[oi].nesting_level == 0
            })
            .collect();
        self.index.top_level = top_level;

        // Bounds the transport never reported default to the time marks.
        if self.trace_start.is_none() {
            self.trace_start = self
                .index
                .start_order
                .first()
                .map(|&oi| self.index.occurrences[oi as usize].start);
        }
        if self.trace_end.is_none() {
            self.trace_end = self
                .index
                .end_order
                .last()
                .map(|&oi| self.index.occurrences[oi as usize].end());
        }

        let range_start = self.trace_start.unwrap_or(0);
        let range_end = self.trace_end.unwrap_or(0);
        self.compile_statistics(range_start, range_end);
        self.calls.compute_percentages();

        debug!(
            "post-processing done: {} occurrences, {} event kinds, {} call nodes",
            self.index.occurrences.len(),
            self.registry.len(),
            self.calls.len()
        );
        Ok(())
    }

    /// Turn the raw record stream into closed occurrences, in arrival
    /// order. Ranged records are closed already; enter/leave marks are
    /// matched by strict LIFO discipline: the most recently opened,
    /// not-yet-closed range of consistent category is closed by the next
    /// leave.
    fn materialize_occurrences(&self) -> Result<Vec<Occurrence>, TraceError> {
        let mut occurrences = Vec::with_capacity(self.raw.len());
        let mut open: Vec<(usize, EventCategory)> = Vec::new();

        for record in &self.raw {
            match *record {
                RawRecord::Ranged {
                    description,
                    start,
                    duration,
                } => {
                    occurrences.push(Occurrence {
                        description,
                        start,
                        duration,
                        nesting_level: 0,
                        nesting_depth: 0,
                    });
                }
                RawRecord::Enter { description, time } => {
                    let category = self
                        .registry
                        .get(description)
                        .map(|d| d.category)
                        .ok_or_else(|| {
                            TraceError::MalformedTrace(format!(
                                "enter mark references unknown description {}",
                                description.0
                            ))
                        })?;
                    open.push((occurrences.len(), category));
                    occurrences.push(Occurrence {
                        description,
                        start: time,
                        duration: 0,
                        nesting_level: 0,
                        nesting_depth: 0,
                    });
                }
                RawRecord::Leave { category, time } => {
                    let Some((index, open_category)) = open.pop() else {
                        return Err(TraceError::MalformedTrace(
                            "leave mark without a matching enter mark".into(),
                        ));
                    };
                    if open_category != category {
                        return Err(TraceError::MalformedTrace(format!(
                            "leave mark for {category:?} closes an open {open_category:?} range"
                        )));
                    }
                    let occurrence = &mut occurrences[index];
                    if time < occurrence.start {
                        return Err(TraceError::MalformedTrace(format!(
                            "leave mark at {time} precedes its enter mark at {}",
                            occurrence.start
                        )));
                    }
                    occurrence.duration = time - occurrence.start;
                }
            }
        }

        if !open.is_empty() {
            return Err(TraceError::MalformedTrace(format!(
                "{} enter mark(s) left unclosed at end of trace",
                open.len()
            )));
        }
        Ok(occurrences)
    }

    /// Phase 4: scan the start index with an explicit open-occurrence
    /// stack keyed by end time. An occurrence's level is the stack depth
    /// at its start; the stack top, if any, is its encloser and
    /// contributes a parent/child description link.
    fn compute_nesting_levels(&mut self) {
        self.registry.reset_links();

        let mut stack: Vec<(i64, crate::model::DescriptionId)> = Vec::new();
        for pos in 0..self.index.start_order.len() {
            let oi = self.index.start_order[pos] as usize;
            let occurrence = self.index.occurrences[oi];

            while stack
                .last()
                .is_some_and(|&(end, _)| end <= occurrence.start)
            {
                stack.pop();
            }
            if let Some(&(_, parent)) = stack.last() {
                self.registry.link(parent, occurrence.description);
            }
            self.index.occurrences[oi].nesting_level = stack.len() as u32;
            stack.push((occurrence.end(), occurrence.description));
        }
    }

    /// Phase 5: same scan with one stack per description, yielding the
    /// same-kind recursion depth.
    fn compute_nesting_depths(&mut self) {
        let mut stacks: Vec<Vec<i64>> = vec![Vec::new(); self.registry.len()];
        for pos in 0..self.index.start_order.len() {
            let oi = self.index.start_order[pos] as usize;
            let occurrence = self.index.occurrences[oi];

            let stack = &mut stacks[occurrence.description.index()];
            while stack.last().is_some_and(|&end| end <= occurrence.start) {
                stack.pop();
            }
            self.index.occurrences[oi].nesting_depth = stack.len() as u32;
            stack.push(occurrence.end());
        }
    }

    /// Recompute every per-description aggregate over the occurrences
    /// intersecting `[range_start, range_end]` (touching counts as
    /// intersecting). `complete()` runs this over the full trace bounds;
    /// callers can re-run it for any window for interactive range
    /// statistics. Percentages are taken against the window duration and
    /// reported as 0 when the window is empty.
    pub fn compile_statistics(&mut self, range_start: i64, range_end: i64) {
        self.registry.reset_stats();

        let mut durations: Vec<Vec<i64>> = vec![Vec::new(); self.registry.len()];
        for (arrival, occurrence) in self.index.occurrences.iter().enumerate() {
            if occurrence.end() < range_start || occurrence.start > range_end {
                continue;
            }
            durations[occurrence.description.index()].push(occurrence.duration);
            self.registry.descriptions[occurrence.description.index()]
                .occurrences
                .push(arrival as u32);
        }

        let window = (range_end - range_start) as f64;
        for (index, durs) in durations.iter_mut().enumerate() {
            if durs.is_empty() {
                continue;
            }
            durs.sort_unstable();

            let stats = &mut self.registry.descriptions[index].stats;
            stats.calls = durs.len() as u64;
            stats.cumulative_duration = durs.iter().sum();
            stats.min_duration = durs[0];
            stats.max_duration = durs[durs.len() - 1];
            stats.median_duration = durs[durs.len() / 2];
            stats.time_per_call = stats.cumulative_duration as f64 / stats.calls as f64;
            stats.percent_of_time = if window > 0.0 {
                stats.cumulative_duration as f64 * 100.0 / window
            } else {
                0.0
            };
        }

        let mut categories = vec![CategoryView::default(); EventCategory::ALL.len()];
        for description in &mut self.registry.descriptions {
            if description.stats.calls == 0 {
                continue;
            }
            let view = &mut categories[description.category.index()];
            description.stats.pos_in_category = view.descriptions.len() as u32;
            view.descriptions.push(description.id);
        }
        for occurrence in &self.index.occurrences {
            if occurrence.end() < range_start || occurrence.start > range_end {
                continue;
            }
            let category = self.registry.descriptions[occurrence.description.index()].category;
            let view = &mut categories[category.index()];
            view.max_nesting_depth = view.max_nesting_depth.max(occurrence.nesting_depth);
        }
        self.index.categories = categories;
    }
}

/// Phase 1: ascending start time, ties stable by arrival order.
fn sorted_by_start(occurrences: &[Occurrence]) -> Vec<u32> {
    let mut order: Vec<u32> = (0..occurrences.len() as u32).collect();
    order.sort_by_key(|&oi| occurrences[oi as usize].start);
    order
}

/// Phase 2: ascending end time, ties stable by arrival order.
fn sorted_by_end(occurrences: &[Occurrence]) -> Vec<u32> {
    let mut order: Vec<u32> = (0..occurrences.len() as u32).collect();
    order.sort_by_key(|&oi| occurrences[oi as usize].end());
    order
}

/// Phase 3, index half: for every end-order position, the start-order
/// position of the same occurrence. `find_last_index` answers in
/// start-order terms through this link.
fn link_ends_to_starts(start_order: &[u32], end_order: &[u32]) -> Vec<u32> {
    let mut start_pos = vec![0u32; start_order.len()];
    for (pos, &oi) in start_order.iter().enumerate() {
        start_pos[oi as usize] = pos as u32;
    }
    end_order.iter().map(|&oi| start_pos[oi as usize]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DescriptionId;

    fn ranged(
        session: &mut TraceSession,
        category: EventCategory,
        start: i64,
        length: i64,
        details: &str,
    ) {
        session
            .add_ranged_event(category, start, length, &[details.to_string()], "t.qml", 1)
            .unwrap();
    }

    #[test]
    fn nesting_levels_from_enclosure() {
        let mut session = TraceSession::new();
        ranged(&mut session, EventCategory::Binding, 0, 100, "a");
        ranged(&mut session, EventCategory::Binding, 10, 30, "b");
        ranged(&mut session, EventCategory::Binding, 15, 10, "c");
        ranged(&mut session, EventCategory::Binding, 200, 50, "d");
        session.complete().unwrap();

        assert_eq!(session.get_nesting_level(0), 0); // a
        assert_eq!(session.get_nesting_level(1), 1); // b in a
        assert_eq!(session.get_nesting_level(2), 2); // c in b
        assert_eq!(session.get_nesting_level(3), 0); // d
    }

    #[test]
    fn adjacent_ranges_do_not_nest() {
        let mut session = TraceSession::new();
        ranged(&mut session, EventCategory::Painting, 0, 50, "a");
        ranged(&mut session, EventCategory::Painting, 50, 50, "b");
        session.complete().unwrap();

        assert_eq!(session.get_nesting_level(0), 0);
        assert_eq!(session.get_nesting_level(1), 0);
    }

    #[test]
    fn nesting_depth_counts_same_kind_recursion_only() {
        let mut session = TraceSession::new();
        // recursive binding: same description nested inside itself
        ranged(&mut session, EventCategory::Binding, 0, 100, "rec");
        ranged(&mut session, EventCategory::Binding, 10, 50, "rec");
        // a different kind nested inside both
        ranged(&mut session, EventCategory::HandlingSignal, 20, 10, "sig");
        session.complete().unwrap();

        assert_eq!(session.get_nesting_depth(0), 0);
        assert_eq!(session.get_nesting_depth(1), 1);
        assert_eq!(session.get_nesting_level(2), 2);
        assert_eq!(session.get_nesting_depth(2), 0);
    }

    #[test]
    fn enclosure_links_parent_and_child_descriptions() {
        let mut session = TraceSession::new();
        ranged(&mut session, EventCategory::HandlingSignal, 0, 100, "clicked");
        ranged(&mut session, EventCategory::Binding, 10, 20, "width");
        session.complete().unwrap();

        let signal = session.description(DescriptionId(0)).unwrap();
        let binding = session.description(DescriptionId(1)).unwrap();
        assert_eq!(signal.children, vec![binding.id]);
        assert_eq!(binding.parents, vec![signal.id]);
    }

    #[test]
    fn equal_start_times_stay_in_arrival_order() {
        let mut session = TraceSession::new();
        ranged(&mut session, EventCategory::Creating, 10, 5, "first");
        ranged(&mut session, EventCategory::Creating, 10, 5, "second");
        session.complete().unwrap();

        assert_eq!(session.get_details(0), "first");
        assert_eq!(session.get_details(1), "second");
    }

    #[test]
    fn enter_leave_marks_reconcile_lifo() {
        let mut session = TraceSession::new();
        session.add_enter_mark(EventCategory::HandlingSignal, 0, &["outer".into()], "t.qml", 1);
        session.add_enter_mark(EventCategory::Binding, 10, &["inner".into()], "t.qml", 2);
        session.add_leave_mark(EventCategory::Binding, 40);
        session.add_leave_mark(EventCategory::HandlingSignal, 100);
        session.complete().unwrap();

        assert_eq!(session.count(), 2);
        assert_eq!(session.get_duration(0), 100);
        assert_eq!(session.get_nesting_level(0), 0);
        assert_eq!(session.get_duration(1), 30);
        assert_eq!(session.get_nesting_level(1), 1);
    }

    #[test]
    fn unbalanced_marks_are_malformed() {
        // leave without enter
        let mut session = TraceSession::new();
        session.add_leave_mark(EventCategory::Binding, 10);
        assert!(matches!(
            session.complete(),
            Err(TraceError::MalformedTrace(_))
        ));

        // enter without leave
        let mut session = TraceSession::new();
        session.add_enter_mark(EventCategory::Binding, 0, &[], "t.qml", 1);
        assert!(matches!(
            session.complete(),
            Err(TraceError::MalformedTrace(_))
        ));

        // category mismatch
        let mut session = TraceSession::new();
        session.add_enter_mark(EventCategory::Binding, 0, &[], "t.qml", 1);
        session.add_leave_mark(EventCategory::Painting, 10);
        assert!(matches!(
            session.complete(),
            Err(TraceError::MalformedTrace(_))
        ));

        // leave before its enter
        let mut session = TraceSession::new();
        session.add_enter_mark(EventCategory::Binding, 50, &[], "t.qml", 1);
        session.add_leave_mark(EventCategory::Binding, 20);
        assert!(matches!(
            session.complete(),
            Err(TraceError::MalformedTrace(_))
        ));
    }

    #[test]
    fn aggregates_fold_per_description() {
        let mut session = TraceSession::new();
        ranged(&mut session, EventCategory::Binding, 0, 30, "width");
        ranged(&mut session, EventCategory::Binding, 40, 10, "width");
        ranged(&mut session, EventCategory::Binding, 60, 20, "width");
        ranged(&mut session, EventCategory::Painting, 0, 100, "frame");
        session.set_trace_start_time(0).unwrap();
        session.set_trace_end_time(200).unwrap();
        session.complete().unwrap();

        let width = session.description(DescriptionId(0)).unwrap();
        assert_eq!(width.stats.calls, 3);
        assert_eq!(width.stats.cumulative_duration, 60);
        assert_eq!(width.stats.min_duration, 10);
        assert_eq!(width.stats.max_duration, 30);
        assert_eq!(width.stats.median_duration, 20);
        assert_eq!(width.stats.time_per_call, 20.0);
        assert_eq!(width.stats.percent_of_time, 30.0);
        assert_eq!(width.occurrences.len(), 3);
    }

    #[test]
    fn cumulative_durations_sum_to_occurrence_durations() {
        let mut session = TraceSession::new();
        ranged(&mut session, EventCategory::Binding, 0, 100, "a");
        ranged(&mut session, EventCategory::Creating, 10, 40, "b");
        ranged(&mut session, EventCategory::Binding, 200, 50, "a");
        ranged(&mut session, EventCategory::Painting, 300, 7, "c");
        session.complete().unwrap();

        let from_descriptions: i64 = session
            .descriptions()
            .iter()
            .map(|d| d.stats.cumulative_duration)
            .sum();
        let from_occurrences: i64 = (0..session.count())
            .map(|i| session.get_duration(i))
            .sum();
        assert_eq!(from_descriptions, from_occurrences);
        assert_eq!(from_descriptions, 197);
    }

    #[test]
    fn zero_duration_trace_reports_zero_percent() {
        let mut session = TraceSession::new();
        session.set_trace_start_time(0).unwrap();
        session.set_trace_end_time(0).unwrap();
        ranged(&mut session, EventCategory::Binding, 0, 0, "b");
        session.complete().unwrap();

        let description = session.description(DescriptionId(0)).unwrap();
        assert_eq!(description.stats.calls, 1);
        assert_eq!(description.stats.percent_of_time, 0.0);
    }

    #[test]
    fn empty_trace_yields_empty_aggregates() {
        let mut session = TraceSession::new();
        session.complete().unwrap();
        assert_eq!(session.count(), 0);
        assert!(session.descriptions().is_empty());
        assert_eq!(session.trace_duration(), 0);
    }

    #[test]
    fn complete_is_idempotent() {
        let mut session = TraceSession::new();
        ranged(&mut session, EventCategory::Binding, 0, 100, "a");
        ranged(&mut session, EventCategory::Binding, 10, 40, "a");
        session.complete().unwrap();
        let first: Vec<_> = session
            .descriptions()
            .iter()
            .map(|d| d.stats.clone())
            .collect();

        session.complete().unwrap();
        let second: Vec<_> = session
            .descriptions()
            .iter()
            .map(|d| d.stats.clone())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn unset_bounds_default_to_time_marks() {
        let mut session = TraceSession::new();
        ranged(&mut session, EventCategory::Binding, 25, 50, "a");
        ranged(&mut session, EventCategory::Binding, 100, 40, "b");
        session.complete().unwrap();

        assert_eq!(session.trace_start_time(), 25);
        assert_eq!(session.trace_end_time(), 140);
        assert_eq!(session.trace_duration(), 115);
    }

    #[test]
    fn windowed_statistics_count_intersecting_occurrences() {
        let mut session = TraceSession::new();
        ranged(&mut session, EventCategory::Binding, 0, 30, "a"); // [0, 30)
        ranged(&mut session, EventCategory::Binding, 50, 30, "a"); // [50, 80)
        ranged(&mut session, EventCategory::Binding, 200, 30, "a"); // [200, 230)
        session.complete().unwrap();

        session.compile_statistics(40, 100);
        let stats = &session.description(DescriptionId(0)).unwrap().stats;
        assert_eq!(stats.calls, 1);
        assert_eq!(stats.cumulative_duration, 30);
        assert_eq!(stats.percent_of_time, 50.0);

        // straddling occurrences count with their full duration
        session.compile_statistics(25, 60);
        let stats = &session.description(DescriptionId(0)).unwrap().stats;
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.cumulative_duration, 60);
    }
}
