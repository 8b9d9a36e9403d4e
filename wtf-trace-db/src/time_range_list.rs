use crate::{AncillaryList, EventIterator, EventList, Invalidated, Notifier};
use flume::Receiver;
use std::{collections::HashMap, sync::Arc};
use wtf_trace_types::{BuiltinEvent, EventType, EventTypeTable, Value};

/// A range opened by `wtf.timeRange#begin` and closed by `wtf.timeRange#end`.
///
/// Ranges may overlap. Each is placed on the lowest level free when it begins.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRange {
    id: u32,
    begin_event_id: Option<usize>,
    end_event_id: Option<usize>,
    name: String,
    value: Value,
    time: f64,
    end_time: Option<f64>,
    level: usize,
    overlap: usize,
}

#[derive(Debug, Default)]
pub struct TimeRangeList {
    ranges: Vec<TimeRange>,
    by_id: HashMap<u32, usize>,
    levels: Vec<Option<u32>>,
    overlap: usize,
    maximum_level: usize,
    notifier: Notifier<Invalidated>,
}

impl TimeRange {
    fn new(id: u32) -> Self {
        Self {
            id,
            begin_event_id: None,
            end_event_id: None,
            name: String::new(),
            value: Value::Null,
            time: 0.0,
            end_time: None,
            level: 0,
            overlap: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn begin_event_id(&self) -> Option<usize> {
        self.begin_event_id
    }

    pub fn end_event_id(&self) -> Option<usize> {
        self.end_event_id
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

    /// Ranges never closed end with the last event of the zone.
    pub fn end_time(&self) -> f64 {
        self.end_time.unwrap_or(self.time)
    }

    pub fn duration(&self) -> f64 {
        self.end_time() - self.time
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Number of ranges still open when this one began.
    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl TimeRangeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn time_ranges(&self) -> &[TimeRange] {
        &self.ranges
    }

    /// Number of levels needed to draw every range without overlap.
    pub fn maximum_level(&self) -> usize {
        self.maximum_level
    }

    pub fn subscribe(&mut self) -> Receiver<Invalidated> {
        self.notifier.subscribe()
    }

    pub fn get_time_range(&self, id: u32) -> Option<&TimeRange> {
        self.ranges.get(*self.by_id.get(&id)?)
    }

    pub fn get_time_ranges_at_time(&self, time: f64) -> Vec<&TimeRange> {
        let mut matches = Vec::new();
        self.for_each_intersecting(time, time, |range| matches.push(range));
        matches
    }

    pub fn for_each_intersecting<'a, F: FnMut(&'a TimeRange)>(
        &'a self,
        start_time: f64,
        end_time: f64,
        mut f: F,
    ) {
        let mut index = self
            .ranges
            .partition_point(|r| r.time <= start_time)
            .saturating_sub(1);
        // walk back to a range that began with nothing else open
        while index > 0 && self.ranges[index].overlap > 0 {
            index -= 1;
        }
        for range in self.ranges.iter().skip(index) {
            if range.time > end_time {
                break;
            }
            if range.end_time() >= start_time {
                f(range);
            }
        }
    }
}

impl AncillaryList for TimeRangeList {
    fn begin_rebuild(&mut self, event_types: &EventTypeTable) -> Vec<Option<Arc<EventType>>> {
        self.ranges.clear();
        self.by_id.clear();
        self.levels.clear();
        self.overlap = 0;
        vec![
            event_types.get_by_name(BuiltinEvent::TimeRangeBegin.name()).cloned(),
            event_types.get_by_name(BuiltinEvent::TimeRangeEnd.name()).cloned(),
        ]
    }

    fn handle_event(&mut self, event_type_index: usize, _: &Arc<EventType>, it: &EventIterator<'_>) {
        let id = match it.argument("id").and_then(Value::as_u32) {
            Some(id) => id,
            None => return,
        };
        let index = match self.by_id.get(&id) {
            Some(index) => *index,
            None => {
                self.ranges.push(TimeRange::new(id));
                self.by_id.insert(id, self.ranges.len() - 1);
                self.ranges.len() - 1
            }
        };
        match event_type_index {
            0 => {
                let level = match self.levels.iter().position(Option::is_none) {
                    Some(level) => level,
                    None => {
                        self.levels.push(None);
                        self.levels.len() - 1
                    }
                };
                self.levels[level] = Some(id);
                let range = &mut self.ranges[index];
                range.begin_event_id = Some(it.index());
                range.name = it
                    .argument("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                range.value = it.argument("value").cloned().unwrap_or(Value::Null);
                range.time = it.time();
                range.level = level;
                range.overlap = self.overlap;
                self.overlap += 1;
            }
            _ => {
                let range = &mut self.ranges[index];
                if self.levels.get(range.level) == Some(&Some(id)) {
                    self.levels[range.level] = None;
                    self.overlap = self.overlap.saturating_sub(1);
                }
                range.end_event_id = Some(it.index());
                range.end_time = Some(it.time());
            }
        }
    }

    fn end_rebuild(&mut self, events: &EventList) {
        for range in self.ranges.iter_mut() {
            if range.end_time.is_none() {
                range.end_time = Some(events.last_event_time().max(range.time));
            }
        }
        self.maximum_level = self.levels.len();
        self.notifier.emit(Invalidated);
    }
}
