use crate::{AncillaryList, EventIterator, EventList, Invalidated, Notifier};
use flume::Receiver;
use std::sync::Arc;
use wtf_trace_types::{BuiltinEvent, EventType, EventTypeTable, Value};

/// A named point in time, lasting until the next mark.
#[derive(Debug, Clone, PartialEq)]
pub struct Mark {
    event_id: usize,
    name: String,
    value: Value,
    time: f64,
    end_time: f64,
}

/// Every `wtf.trace#mark` of a zone, in time order.
#[derive(Debug, Default)]
pub struct MarkList {
    marks: Vec<Mark>,
    notifier: Notifier<Invalidated>,
}

impl Mark {
    pub fn event_id(&self) -> usize {
        self.event_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.time
    }
}

impl MarkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    /// Notified after every rebuild.
    pub fn subscribe(&mut self) -> Receiver<Invalidated> {
        self.notifier.subscribe()
    }

    /// Index of the last mark starting at or before `time`.
    fn index_at(&self, time: f64) -> usize {
        self.marks
            .partition_point(|m| m.time <= time)
            .saturating_sub(1)
    }

    pub fn get_mark_at_time(&self, time: f64) -> Option<&Mark> {
        let mark = self.marks.get(self.index_at(time))?;
        if mark.time <= time && mark.end_time >= time {
            Some(mark)
        } else {
            None
        }
    }

    pub fn for_each_intersecting<F: FnMut(&Mark)>(&self, start_time: f64, end_time: f64, mut f: F) {
        if self.marks.is_empty() {
            return;
        }
        for mark in &self.marks[self.index_at(start_time)..] {
            if mark.end_time < start_time {
                continue;
            }
            if mark.time > end_time {
                break;
            }
            f(mark);
        }
    }
}

impl AncillaryList for MarkList {
    fn begin_rebuild(&mut self, event_types: &EventTypeTable) -> Vec<Option<Arc<EventType>>> {
        self.marks.clear();
        vec![event_types.get_by_name(BuiltinEvent::Mark.name()).cloned()]
    }

    fn handle_event(&mut self, _: usize, _: &Arc<EventType>, it: &EventIterator<'_>) {
        self.marks.push(Mark {
            event_id: it.index(),
            name: it
                .argument("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            value: it.argument("value").cloned().unwrap_or(Value::Null),
            time: it.time(),
            end_time: f64::MAX,
        });
    }

    fn end_rebuild(&mut self, events: &EventList) {
        for n in 1..self.marks.len() {
            self.marks[n - 1].end_time = self.marks[n].time;
        }
        if let Some(last) = self.marks.last_mut() {
            last.end_time = events.last_event_time();
        }
        self.notifier.emit(Invalidated);
    }
}
