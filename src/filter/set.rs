use super::{Filter, FilterModified};
use crate::event::Channel;
use crate::pipeline::FilterLink;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Named registry of filters
///
/// Parameter changes of a registered filter are re-posted on the set's own
/// channel as `id.parameter`.
pub struct FilterSet {
    entries: RwLock<Vec<(String, FilterLink)>>,
    modified: Channel<FilterModified>,
    this: Weak<FilterSet>,
}

impl FilterSet {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            entries: RwLock::new(Vec::new()),
            modified: Channel::new(),
            this: this.clone(),
        })
    }

    /// Register `filter` under `id`, replacing any previous holder of the id
    pub fn insert(&self, id: impl Into<String>, filter: Arc<dyn Filter>) {
        let id = id.into();
        let prefix = id.clone();
        let link = FilterLink::attach(filter, self.this.clone(), move |set: &FilterSet, event| {
            set.modified
                .emit(&FilterModified::new(format!("{}.{}", prefix, event.parameter)));
        });
        let replaced = {
            let mut entries = self.entries.write();
            match entries.iter_mut().find(|(existing, _)| *existing == id) {
                Some(slot) => Some(std::mem::replace(&mut slot.1, link)),
                None => {
                    entries.push((id.clone(), link));
                    None
                }
            }
        };
        drop(replaced);
        self.modified.emit(&FilterModified::new(id));
    }

    pub fn remove(&self, id: &str) -> Option<Arc<dyn Filter>> {
        let removed = {
            let mut entries = self.entries.write();
            let position = entries.iter().position(|(existing, _)| existing == id)?;
            entries.remove(position)
        };
        let filter = removed.1.filter().clone();
        drop(removed);
        self.modified.emit(&FilterModified::new(id));
        Some(filter)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Filter>> {
        self.entries
            .read()
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, link)| link.filter().clone())
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.read().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn modified(&self) -> &Channel<FilterModified> {
        &self.modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{IndexFilter, NaNFilter};
    use parking_lot::Mutex;

    #[test]
    fn lookup_by_id() {
        let set = FilterSet::new();
        set.insert("rows", Arc::new(IndexFilter::new(vec![1])));
        set.insert("finite", Arc::new(NaNFilter::new()));
        assert_eq!(set.ids(), vec!["rows", "finite"]);
        assert_eq!(set.get("finite").map(|f| f.kind()), Some("nan"));
        assert!(set.get("missing").is_none());
        assert!(set.remove("rows").is_some());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn forwards_with_prefix() {
        let set = FilterSet::new();
        let rows = Arc::new(IndexFilter::new(vec![]));
        set.insert("rows", rows.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        set.modified()
            .subscribe(move |e: &FilterModified| sink.lock().push(e.parameter.clone()));

        rows.set_invert(true);
        set.remove("rows");
        rows.set_invert(false);
        assert_eq!(*seen.lock(), vec!["rows.invert", "rows"]);
        assert_eq!(rows.modified().listener_count(), 0);
    }
}
