//! Context modification events
//!
//! A [`ContextModified`] describes one delta of a context. Contexts deliver
//! them synchronously through a [`ContextEvents`] channel; while events are
//! deferred, successive deltas are merged into one.

pub mod channel;

pub use channel::{Channel, ContextEvents, DeferGuard, ListenerId};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Delta posted by a context after a change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextModified {
    /// Listeners must discard cached state; the field lists are advisory
    pub reset: bool,
    /// Arrays replaced or re-assigned
    pub modified: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Non-array values that changed
    pub changed: Vec<String>,
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

fn remove_name(list: &mut Vec<String>, name: &str) -> bool {
    let before = list.len();
    list.retain(|n| n != name);
    before != list.len()
}

impl ContextModified {
    pub fn reset() -> Self {
        Self {
            reset: true,
            ..Self::default()
        }
    }

    pub fn added(name: impl Into<String>) -> Self {
        Self {
            added: vec![name.into()],
            ..Self::default()
        }
    }

    pub fn modified(name: impl Into<String>) -> Self {
        Self {
            modified: vec![name.into()],
            ..Self::default()
        }
    }

    pub fn removed(name: impl Into<String>) -> Self {
        Self {
            removed: vec![name.into()],
            ..Self::default()
        }
    }

    pub fn changed(name: impl Into<String>) -> Self {
        Self {
            changed: vec![name.into()],
            ..Self::default()
        }
    }

    pub fn modified_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modified: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Union of every name mentioned by the event
    pub fn all_modified(&self) -> BTreeSet<String> {
        self.modified
            .iter()
            .chain(&self.added)
            .chain(&self.removed)
            .chain(&self.changed)
            .cloned()
            .collect()
    }

    pub fn not_empty(&self) -> bool {
        self.reset
            || !self.modified.is_empty()
            || !self.added.is_empty()
            || !self.removed.is_empty()
            || !self.changed.is_empty()
    }

    pub fn touches(&self, name: &str) -> bool {
        self.reset
            || self
                .modified
                .iter()
                .chain(&self.added)
                .chain(&self.removed)
                .chain(&self.changed)
                .any(|n| n == name)
    }

    /// Fold a later event into this one
    ///
    /// Field lists are unioned, so a name added and then modified is listed
    /// in both. A name added and then removed within the merge window
    /// disappears; a name removed and then added again is reported as
    /// modified. A reset replaces whatever was queued.
    pub fn merge(&mut self, later: &ContextModified) {
        if later.reset {
            *self = later.clone();
            return;
        }
        if self.reset {
            return;
        }
        for name in &later.removed {
            let was_added = remove_name(&mut self.added, name);
            remove_name(&mut self.modified, name);
            remove_name(&mut self.changed, name);
            if !was_added {
                push_unique(&mut self.removed, name);
            }
        }
        for name in &later.added {
            if remove_name(&mut self.removed, name) {
                push_unique(&mut self.modified, name);
            } else {
                push_unique(&mut self.added, name);
            }
        }
        for name in &later.modified {
            remove_name(&mut self.removed, name);
            push_unique(&mut self.modified, name);
        }
        for name in &later.changed {
            remove_name(&mut self.removed, name);
            push_unique(&mut self.changed, name);
        }
    }
}
