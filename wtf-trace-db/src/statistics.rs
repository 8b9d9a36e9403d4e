use crate::{Database, EventIterator};
use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap},
    sync::Arc,
};
use wtf_trace_types::{EventClass, EventFlags, EventType};

/// Number of 1ms buckets in a scope's duration distribution.
pub const DISTRIBUTION_BUCKETS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Definition order.
    #[default]
    Any,
    Count,
    TotalTime,
    MeanTime,
    OwnTime,
}

#[derive(Debug, Clone, PartialEq)]
struct ScopeTimes {
    total_time: f64,
    own_time: f64,
    user_time: f64,
    buckets: Vec<u32>,
}

/// Aggregate of every event of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDataEntry {
    event_type: Arc<EventType>,
    count: usize,
    scope: Option<ScopeTimes>,
}

/// Per-type statistics of every zone over a time range.
#[derive(Debug, Clone)]
pub struct StatisticsTable {
    start_time: f64,
    end_time: f64,
    event_count: usize,
    entries: Vec<EventDataEntry>,
    by_name: HashMap<String, usize>,
}

/// Caches the table of the whole trace and the table of the last selection,
/// rebuilding them when the database changes.
#[derive(Debug, Default)]
pub struct EventStatistics {
    full: Option<(u64, StatisticsTable)>,
    selected: Option<(u64, StatisticsTable)>,
}

impl EventDataEntry {
    fn new(event_type: Arc<EventType>) -> Self {
        let scope = if event_type.is_scope() {
            Some(ScopeTimes {
                total_time: 0.0,
                own_time: 0.0,
                user_time: 0.0,
                buckets: vec![0; DISTRIBUTION_BUCKETS],
            })
        } else {
            None
        };
        Self {
            event_type,
            count: 0,
            scope,
        }
    }

    fn append_event(&mut self, it: &EventIterator<'_>) {
        match self.scope.as_mut() {
            Some(times) => {
                // scopes never closed have no duration to account for
                if !it.is_scope() {
                    return;
                }
                let user = it.user_duration();
                times.total_time += it.total_duration();
                times.own_time += it.own_duration();
                times.user_time += user;
                let bucket = (user.round().max(0.0) as usize).min(DISTRIBUTION_BUCKETS - 1);
                times.buckets[bucket] += 1;
            }
            None => (),
        }
        self.count += 1;
    }

    pub fn event_type(&self) -> &Arc<EventType> {
        &self.event_type
    }

    pub fn name(&self) -> &str {
        self.event_type.name()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_scope(&self) -> bool {
        self.scope.is_some()
    }

    pub fn total_time(&self) -> f64 {
        self.scope.as_ref().map(|s| s.total_time).unwrap_or_default()
    }

    pub fn own_time(&self) -> f64 {
        self.scope.as_ref().map(|s| s.own_time).unwrap_or_default()
    }

    pub fn user_time(&self) -> f64 {
        self.scope.as_ref().map(|s| s.user_time).unwrap_or_default()
    }

    /// Mean user time per scope, or mean total time for system scopes.
    pub fn mean_time(&self) -> f64 {
        match &self.scope {
            Some(times) if self.count > 0 => {
                if self.event_type.flags().contains(EventFlags::SYSTEM_TIME) {
                    times.total_time / self.count as f64
                } else {
                    times.user_time / self.count as f64
                }
            }
            _ => 0.0,
        }
    }

    /// Scope counts by user time, rounded to the millisecond. The last bucket
    /// holds everything longer.
    pub fn distribution(&self) -> Option<&[u32]> {
        self.scope.as_ref().map(|s| s.buckets.as_slice())
    }
}

/// Scopes before instances; scopes by `key` descending, instances by count.
fn compare_scopes(a: &EventDataEntry, b: &EventDataEntry, key: fn(&EventDataEntry) -> f64) -> Ordering {
    match (a.is_scope(), b.is_scope()) {
        (true, true) => key(b).total_cmp(&key(a)),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => b.count.cmp(&a.count),
    }
}

impl StatisticsTable {
    /// Scans every zone of `db` for events between `start_time` and `end_time`.
    /// Hidden types are skipped, as are types without any event in range.
    pub fn build(db: &Database, start_time: f64, end_time: f64) -> Self {
        let mut entries: Vec<EventDataEntry> = Vec::new();
        let mut by_id: HashMap<u32, usize> = HashMap::new();
        for event_type in db.event_type_table().get_all() {
            if event_type.is_hidden() {
                continue;
            }
            by_id.insert(event_type.id(), entries.len());
            entries.push(EventDataEntry::new(event_type.clone()));
        }

        let mut event_count = 0;
        for zone in db.zones() {
            let mut it = zone.event_list().begin_time_range(start_time, end_time, false);
            while !it.done() {
                if let Some(entry) = by_id.get(&it.type_id()) {
                    entries[*entry].append_event(&it);
                    event_count += 1;
                }
                it.next();
            }
        }

        entries.retain(|e| e.count > 0);
        let mut table = Self {
            start_time,
            end_time,
            event_count,
            entries,
            by_name: HashMap::new(),
        };
        table.reindex();
        table
    }

    fn reindex(&mut self) {
        self.by_name = self
            .entries
            .iter()
            .enumerate()
            .map(|(n, e)| (e.name().to_owned(), n))
            .collect();
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Events accounted for, including scopes left open.
    pub fn event_count(&self) -> usize {
        self.event_count
    }

    pub fn entries(&self) -> &[EventDataEntry] {
        &self.entries
    }

    pub fn get_event_type_entry(&self, name: &str) -> Option<&EventDataEntry> {
        self.entries.get(*self.by_name.get(name)?)
    }

    pub fn get_entries_by_class(&self, class: EventClass) -> Vec<&EventDataEntry> {
        self.entries
            .iter()
            .filter(|e| e.event_type.class() == class)
            .collect()
    }

    /// Entries in the given order. Ties keep definition order.
    pub fn sorted_entries(&self, mode: SortMode) -> Vec<&EventDataEntry> {
        let mut entries: Vec<&EventDataEntry> = self.entries.iter().collect();
        match mode {
            SortMode::Any => (),
            SortMode::Count => entries.sort_by(|a, b| b.count.cmp(&a.count)),
            SortMode::TotalTime => {
                entries.sort_by(|a, b| compare_scopes(a, b, EventDataEntry::total_time))
            }
            SortMode::MeanTime => {
                entries.sort_by(|a, b| compare_scopes(a, b, EventDataEntry::mean_time))
            }
            SortMode::OwnTime => {
                entries.sort_by(|a, b| compare_scopes(a, b, EventDataEntry::own_time))
            }
        }
        entries
    }

    /// A table of the entries whose type matches `predicate`, reusing the
    /// aggregates already computed.
    pub fn filter<F: Fn(&EventType) -> bool>(&self, predicate: F) -> Self {
        let entries: Vec<EventDataEntry> = self
            .entries
            .iter()
            .filter(|e| predicate(&e.event_type))
            .cloned()
            .collect();
        let mut table = Self {
            start_time: self.start_time,
            end_time: self.end_time,
            event_count: entries.iter().map(|e| e.count).sum(),
            entries,
            by_name: HashMap::new(),
        };
        table.reindex();
        table
    }
}

impl EventStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table of the whole trace.
    pub fn get_full_table(&mut self, db: &Database) -> &StatisticsTable {
        let revision = db.revision();
        if !matches!(&self.full, Some((r, _)) if *r == revision) {
            self.full = None;
        }
        &self
            .full
            .get_or_insert_with(|| (revision, StatisticsTable::build(db, f64::MIN, f64::MAX)))
            .1
    }

    /// The table of `[start_time, end_time]`. The last selection is cached.
    pub fn get_table(&mut self, db: &Database, start_time: f64, end_time: f64) -> &StatisticsTable {
        if start_time <= f64::MIN && end_time >= f64::MAX {
            return self.get_full_table(db);
        }
        let revision = db.revision();
        let cached = matches!(
            &self.selected,
            Some((r, table)) if *r == revision
                && table.start_time == start_time
                && table.end_time == end_time
        );
        if !cached {
            self.selected = None;
        }
        &self
            .selected
            .get_or_insert_with(|| (revision, StatisticsTable::build(db, start_time, end_time)))
            .1
    }
}

/// Names of every type present in any of `tables`, optionally of one class, sorted.
pub fn get_all_event_type_names(tables: &[&StatisticsTable], class: Option<EventClass>) -> Vec<String> {
    let mut names = BTreeSet::new();
    for table in tables {
        for entry in table.entries.iter() {
            if class.map(|c| entry.event_type.class() == c).unwrap_or(true) {
                names.insert(entry.name().to_owned());
            }
        }
    }
    names.into_iter().collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use wtf_trace_types::EventTypeDef;

    fn entry(signature: &str, class: EventClass, flags: EventFlags) -> EventDataEntry {
        let mut table = wtf_trace_types::EventTypeTable::new();
        let ty = table.define_type(EventTypeDef::parse(signature, class, flags).unwrap());
        EventDataEntry::new(ty)
    }

    #[test]
    fn test_sort_order() {
        let mut a = entry("a", EventClass::Scope, EventFlags::empty());
        a.count = 1;
        if let Some(times) = a.scope.as_mut() {
            times.total_time = 5.0;
            times.own_time = 5.0;
            times.user_time = 5.0;
        }
        let mut b = entry("b", EventClass::Scope, EventFlags::empty());
        b.count = 4;
        if let Some(times) = b.scope.as_mut() {
            times.total_time = 8.0;
            times.own_time = 2.0;
            times.user_time = 8.0;
        }
        let mut c = entry("c", EventClass::Instance, EventFlags::empty());
        c.count = 10;
        let mut table = StatisticsTable {
            start_time: 0.0,
            end_time: 1.0,
            event_count: 15,
            entries: vec![a, b, c],
            by_name: HashMap::new(),
        };
        table.reindex();

        let names = |mode| {
            table
                .sorted_entries(mode)
                .iter()
                .map(|e| e.name().to_owned())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(SortMode::Any), vec!["a", "b", "c"]);
        assert_eq!(names(SortMode::Count), vec!["c", "b", "a"]);
        assert_eq!(names(SortMode::TotalTime), vec!["b", "a", "c"]);
        assert_eq!(names(SortMode::MeanTime), vec!["a", "b", "c"]);
        assert_eq!(names(SortMode::OwnTime), vec!["a", "b", "c"]);

        let scopes = table.filter(|t| t.is_scope());
        assert_eq!(scopes.event_count(), 5);
        assert!(scopes.get_event_type_entry("c").is_none());
        assert_eq!(
            get_all_event_type_names(&[&table, &scopes], Some(EventClass::Instance)),
            vec!["c"]
        );
    }

    #[test]
    fn test_mean_time() {
        let mut gc = entry("vm#gc", EventClass::Scope, EventFlags::SYSTEM_TIME);
        gc.count = 2;
        if let Some(times) = gc.scope.as_mut() {
            times.total_time = 10.0;
            times.user_time = 0.0;
        }
        assert_eq!(gc.mean_time(), 5.0);
        assert_eq!(gc.distribution().map(|d| d.len()), Some(DISTRIBUTION_BUCKETS));
        let log = entry("log", EventClass::Instance, EventFlags::empty());
        assert_eq!(log.mean_time(), 0.0);
        assert!(log.distribution().is_none());
    }
}
