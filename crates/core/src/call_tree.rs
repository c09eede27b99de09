//! The call-tree statistics universe.
//!
//! Call-tree events arrive pre-aggregated: an explicit depth plus total and
//! self time already split by the sampling runtime. They bypass the range
//! track's start/end reconciliation entirely and live in their own id
//! space; the two universes are only ever queried side by side.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Dense identifier of a [`CallNode`] within one trace.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CallNodeId(pub u32);

impl CallNodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interned call-tree function with accumulated timings.
///
/// Repeated sightings of the same (function, file, line) merge into one
/// node; parent/child sets are derived from the explicit depth at
/// ingestion time. Times are milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallNode {
    pub id: CallNodeId,
    pub function_name: String,
    pub filename: String,
    pub line: i32,
    pub total_time: f64,
    pub self_time: f64,
    /// Derived at `complete()` against the summed self time of all nodes.
    pub total_percent: f64,
    pub self_percent: f64,
    pub parents: Vec<CallNodeId>,
    pub children: Vec<CallNodeId>,
}

/// One raw call-tree ingestion record, kept in arrival order for
/// persistence replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub depth: u32,
    pub function: String,
    pub filename: String,
    pub line: i32,
    pub total_time: f64,
    pub self_time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CallKey {
    function: String,
    filename: String,
    line: i32,
}

/// Interns call-tree nodes and maintains the per-depth linking state used
/// while the event stream is delivered.
#[derive(Default)]
pub struct CallTreeRegistry {
    nodes: Vec<CallNode>,
    ids: HashMap<CallKey, CallNodeId>,
    /// Most recently seen node per depth; parent of a depth-d event is the
    /// entry at depth d - 1.
    open_path: Vec<CallNodeId>,
}

impl CallTreeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate one call-tree event into its node.
    pub(crate) fn record(
        &mut self,
        depth: u32,
        function: &str,
        filename: &str,
        line: i32,
        total_time: f64,
        self_time: f64,
    ) -> CallNodeId {
        let key = CallKey {
            function: function.to_string(),
            filename: filename.to_string(),
            line,
        };
        let id = match self.ids.get(&key) {
            Some(&id) => id,
            None => {
                let id = CallNodeId(self.nodes.len() as u32);
                self.nodes.push(CallNode {
                    id,
                    function_name: function.to_string(),
                    filename: filename.to_string(),
                    line,
                    total_time: 0.0,
                    self_time: 0.0,
                    total_percent: 0.0,
                    self_percent: 0.0,
                    parents: Vec::new(),
                    children: Vec::new(),
                });
                self.ids.insert(key, id);
                id
            }
        };

        let node = &mut self.nodes[id.index()];
        node.total_time += total_time;
        node.self_time += self_time;

        let depth = depth as usize;
        self.open_path.truncate(depth);
        if depth > 0
            && let Some(&parent) = self.open_path.get(depth - 1)
        {
            self.link(parent, id);
        }
        if self.open_path.len() == depth {
            self.open_path.push(id);
        }
        id
    }

    fn link(&mut self, parent: CallNodeId, child: CallNodeId) {
        if parent == child {
            return;
        }
        let p = &mut self.nodes[parent.index()];
        if !p.children.contains(&child) {
            p.children.push(child);
        }
        let c = &mut self.nodes[child.index()];
        if !c.parents.contains(&parent) {
            c.parents.push(parent);
        }
    }

    /// Derive total/self percentages. The denominator is the summed self
    /// time of all nodes, which equals the total sampled program time.
    pub(crate) fn compute_percentages(&mut self) {
        let total: f64 = self.nodes.iter().map(|n| n.self_time).sum();
        for node in &mut self.nodes {
            if total > 0.0 {
                node.total_percent = node.total_time * 100.0 / total;
                node.self_percent = node.self_time * 100.0 / total;
            } else {
                node.total_percent = 0.0;
                node.self_percent = 0.0;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: CallNodeId) -> Option<&CallNode> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> &[CallNode] {
        &self.nodes
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.ids.clear();
        self.open_path.clear();
    }
}
