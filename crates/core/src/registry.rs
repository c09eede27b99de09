use std::collections::HashMap;

use crate::model::{DescriptionId, EventCategory, EventDescription};

/// Interns range-event descriptions: the combination of category, source
/// position, and detail text maps to one dense [`DescriptionId`].
///
/// Ids are assigned on first sighting and stay stable for the lifetime of
/// one trace; there is no removal. `clear` resets the registry wholesale.
#[derive(Default)]
pub struct DescriptionRegistry {
    pub(crate) descriptions: Vec<EventDescription>,
    ids: HashMap<DescriptionKey, DescriptionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DescriptionKey {
    category: EventCategory,
    filename: String,
    line: i32,
    details: String,
}

impl DescriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve or create the description for one raw occurrence.
    pub fn register(
        &mut self,
        category: EventCategory,
        details: &str,
        filename: &str,
        line: i32,
    ) -> DescriptionId {
        let key = DescriptionKey {
            category,
            filename: filename.to_string(),
            line,
            details: details.to_string(),
        };
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }

        let id = DescriptionId(self.descriptions.len() as u32);
        self.descriptions.push(EventDescription {
            id,
            display_name: display_label(filename, line, category),
            filename: filename.to_string(),
            line,
            details: details.to_string(),
            category,
            parents: Vec::new(),
            children: Vec::new(),
            occurrences: Vec::new(),
            stats: Default::default(),
        });
        self.ids.insert(key, id);
        id
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    pub fn get(&self, id: DescriptionId) -> Option<&EventDescription> {
        self.descriptions.get(id.index())
    }

    pub fn descriptions(&self) -> &[EventDescription] {
        &self.descriptions
    }

    /// Record a parent/child edge in the reconstructed call graph.
    /// Self-recursion does not produce a self-edge.
    pub(crate) fn link(&mut self, parent: DescriptionId, child: DescriptionId) {
        if parent == child {
            return;
        }
        let p = &mut self.descriptions[parent.index()];
        if !p.children.contains(&child) {
            p.children.push(child);
        }
        let c = &mut self.descriptions[child.index()];
        if !c.parents.contains(&parent) {
            c.parents.push(parent);
        }
    }

    pub(crate) fn reset_links(&mut self) {
        for description in &mut self.descriptions {
            description.parents.clear();
            description.children.clear();
        }
    }

    pub(crate) fn reset_stats(&mut self) {
        for description in &mut self.descriptions {
            description.occurrences.clear();
            description.stats = Default::default();
        }
    }

    pub(crate) fn clear(&mut self) {
        self.descriptions.clear();
        self.ids.clear();
    }
}

/// Short display label for a source position: `basename:line`, or the
/// category label when the runtime reported no source position.
fn display_label(filename: &str, line: i32, category: EventCategory) -> String {
    if filename.is_empty() {
        return format!("<{}>", category.label());
    }
    let basename = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    format!("{basename}:{line}")
}
