use crate::domain::model::{Fragment, Label};
use std::collections::HashMap;

/// Fragments keyed by label, in discovery order.
///
/// One store belongs to exactly one build session or one sweep. It only grows
/// until `clear` starts the next session.
#[derive(Debug, Default, Clone)]
pub struct ContentStore {
    entries: HashMap<Label, Vec<String>>,
    /// Labels in first-recorded order, so reports come out stable.
    order: Vec<Label>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, label: Label, fragment: impl Into<String>) {
        let fragment = fragment.into();
        match self.entries.get_mut(&label) {
            Some(fragments) => fragments.push(fragment),
            None => {
                self.order.push(label.clone());
                self.entries.insert(label, vec![fragment]);
            }
        }
    }

    pub fn record_all<I>(&mut self, fragments: I)
    where
        I: IntoIterator<Item = Fragment>,
    {
        for fragment in fragments {
            self.record(fragment.label, fragment.content);
        }
    }

    /// Unseen labels yield an empty slice.
    pub fn lookup(&self, label: &Label) -> &[String] {
        self.entries.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Newline-joined content for an outlet.
    pub fn joined(&self, label: &Label) -> String {
        self.lookup(label).join("\n")
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.entries.contains_key(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.order.iter()
    }

    pub fn fragment_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
