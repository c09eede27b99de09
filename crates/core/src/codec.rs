//! Persistence codec.
//!
//! A saved trace is a versioned JSON document holding the trace bounds and
//! the raw record streams of both tracks in arrival order. No derived
//! state is written and nothing is indexed at rest. `load` replays the records
//! through the ordinary ingestion entry points and re-runs post-processing,
//! so a round trip reproduces the aggregates bit for bit.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::TraceError;
use crate::model::{EventCategory, RawRecord};
use crate::notify::Notification;
use crate::session::TraceSession;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct TraceFile {
    version: u32,
    #[serde(rename = "traceStart")]
    trace_start: Option<i64>,
    #[serde(rename = "traceEnd")]
    trace_end: Option<i64>,
    #[serde(default)]
    events: Vec<EventRecord>,
    #[serde(default, rename = "callEvents")]
    call_events: Vec<CallEventRecord>,
}

/// One raw range-track record. Ranged records carry the full span;
/// enter/leave marks are stored as-is and reconciled again on load.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum EventRecord {
    Ranged {
        category: EventCategory,
        start: i64,
        duration: i64,
        details: String,
        file: String,
        line: i32,
    },
    Enter {
        category: EventCategory,
        time: i64,
        details: String,
        file: String,
        line: i32,
    },
    Leave {
        category: EventCategory,
        time: i64,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallEventRecord {
    depth: u32,
    function: String,
    file: String,
    line: i32,
    total_time: f64,
    self_time: f64,
}

impl TraceSession {
    /// Serialize the raw occurrence streams and trace bounds to `path`.
    /// Failures are reported through the error notification as well as the
    /// returned error.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TraceError> {
        let path = path.as_ref();
        let result = self.save_inner(path);
        if let Err(err) = &result {
            warn!("saving {} failed: {err}", path.display());
            self.emit_error(err);
        }
        result
    }

    fn save_inner(&self, path: &Path) -> Result<(), TraceError> {
        let document = TraceFile {
            version: FORMAT_VERSION,
            trace_start: self.trace_start,
            trace_end: self.trace_end,
            events: self.raw.iter().map(|record| self.to_record(record)).collect(),
            call_events: self
                .raw_calls
                .iter()
                .map(|call| CallEventRecord {
                    depth: call.depth,
                    function: call.function.clone(),
                    file: call.filename.clone(),
                    line: call.line,
                    total_time: call.total_time,
                    self_time: call.self_time,
                })
                .collect(),
        };

        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), &document)?;
        debug!(
            "saved {} event record(s) and {} call record(s) to {}",
            document.events.len(),
            document.call_events.len(),
            path.display()
        );
        Ok(())
    }

    fn to_record(&self, record: &RawRecord) -> EventRecord {
        match *record {
            RawRecord::Ranged {
                description,
                start,
                duration,
            } => {
                let (category, details, file, line) = self.description_fields(description);
                EventRecord::Ranged {
                    category,
                    start,
                    duration,
                    details,
                    file,
                    line,
                }
            }
            RawRecord::Enter { description, time } => {
                let (category, details, file, line) = self.description_fields(description);
                EventRecord::Enter {
                    category,
                    time,
                    details,
                    file,
                    line,
                }
            }
            RawRecord::Leave { category, time } => EventRecord::Leave { category, time },
        }
    }

    fn description_fields(
        &self,
        id: crate::model::DescriptionId,
    ) -> (EventCategory, String, String, i32) {
        self.registry.get(id).map_or(
            (EventCategory::Painting, String::new(), String::new(), -1),
            |d| {
                (
                    d.category,
                    d.details.clone(),
                    d.filename.clone(),
                    d.line,
                )
            },
        )
    }

    /// Reset all state, then read `path` and replay its records through
    /// the ingestion entry points and `complete()`.
    ///
    /// The clear happens before the read: a failed load leaves the session
    /// cleared but empty, never partially populated.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), TraceError> {
        let path = path.as_ref();
        self.clear();
        let result = self.load_inner(path);
        if let Err(err) = &result {
            warn!("loading {} failed: {err}", path.display());
            self.emit_error(err);
        }
        result
    }

    fn load_inner(&mut self, path: &Path) -> Result<(), TraceError> {
        let file = File::open(path)?;
        let document: TraceFile = serde_json::from_reader(BufReader::new(file))?;
        if document.version != FORMAT_VERSION {
            return Err(TraceError::UnsupportedVersion(document.version));
        }

        if let Some(start) = document.trace_start {
            self.set_trace_start_time(start)?;
        }
        if let Some(end) = document.trace_end {
            self.set_trace_end_time(end)?;
        }

        for record in &document.events {
            match record {
                EventRecord::Ranged {
                    category,
                    start,
                    duration,
                    details,
                    file,
                    line,
                } => {
                    self.add_ranged_event(
                        *category,
                        *start,
                        *duration,
                        std::slice::from_ref(details),
                        file,
                        *line,
                    )?;
                }
                EventRecord::Enter {
                    category,
                    time,
                    details,
                    file,
                    line,
                } => {
                    self.add_enter_mark(
                        *category,
                        *time,
                        std::slice::from_ref(details),
                        file,
                        *line,
                    );
                }
                EventRecord::Leave { category, time } => {
                    self.add_leave_mark(*category, *time);
                }
            }
        }
        for call in &document.call_events {
            self.add_call_tree_event(
                call.depth,
                &call.function,
                &call.file,
                call.line,
                call.total_time,
                call.self_time,
            );
        }

        debug!(
            "loaded {} event record(s) and {} call record(s) from {}",
            document.events.len(),
            document.call_events.len(),
            path.display()
        );
        self.complete()
    }

    fn emit_error(&self, err: &TraceError) {
        self.observers
            .emit(&Notification::Error(err.to_string()));
    }
}
