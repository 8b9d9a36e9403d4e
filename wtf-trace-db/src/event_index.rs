use crate::{AncillaryList, EventIterator, EventList, Invalidated, Notifier};
use flume::Receiver;
use std::sync::Arc;
use wtf_trace_types::{EventType, EventTypeTable};

/// Indices of every event of the given type names, in time order.
#[derive(Debug)]
pub struct EventIndex {
    event_names: Vec<String>,
    events: Vec<usize>,
    notifier: Notifier<Invalidated>,
}

impl EventIndex {
    pub fn new<I, S>(event_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_names: event_names.into_iter().map(Into::into).collect(),
            events: Vec::new(),
            notifier: Notifier::new(),
        }
    }

    pub fn event_names(&self) -> &[String] {
        &self.event_names
    }

    pub fn count(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[usize] {
        &self.events
    }

    pub fn subscribe(&mut self) -> Receiver<Invalidated> {
        self.notifier.subscribe()
    }

    /// Iterates over the indexed events of `list`, the list this index is registered on.
    pub fn begin<'a>(&'a self, list: &'a EventList) -> EventIterator<'a> {
        EventIterator::over_indices(list, &self.events)
    }
}

impl AncillaryList for EventIndex {
    fn begin_rebuild(&mut self, event_types: &EventTypeTable) -> Vec<Option<Arc<EventType>>> {
        self.events.clear();
        self.event_names
            .iter()
            .map(|name| event_types.get_by_name(name).cloned())
            .collect()
    }

    fn handle_event(&mut self, _: usize, _: &Arc<EventType>, it: &EventIterator<'_>) {
        self.events.push(it.index());
    }

    fn end_rebuild(&mut self, _: &EventList) {
        self.notifier.emit(Invalidated);
    }
}
