use crate::{same_list, AncillaryHandle, EventIterator};
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError},
};
use wtf_trace_types::{
    Arguments, BuiltinEvent, EventClass, EventFlags, EventType, EventTypeDef, EventTypeTable,
    Value,
};

/// Scopes nested deeper than this stop the rescoping pass.
pub const MAX_SCOPE_DEPTH: usize = 1024;

/// Counters gathered during the last rebuild.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventListStatistics {
    pub total_count: usize,
    pub generic_enter_scope: usize,
    pub generic_time_stamp: usize,
    pub append_scope_data: usize,
}

/// Time-ordered events of one zone.
///
/// Events are stored column-wise and addressed by index. Inserts append; `rebuild`
/// restores time order, links scopes and refreshes the registered ancillary lists.
/// Until the next rebuild, everything derived from the list may be stale.
pub struct EventList {
    types: Vec<Arc<EventType>>,
    times: Vec<f64>,
    arg_slots: Vec<Option<usize>>,
    parents: Vec<Option<usize>>,
    depths: Vec<u32>,
    max_descendant_depths: Vec<u32>,
    next_siblings: Vec<Option<usize>>,
    end_times: Vec<Option<f64>>,
    child_times: Vec<f64>,
    system_times: Vec<f64>,
    tags: Vec<u32>,
    argument_data: Vec<Option<Arguments>>,
    original_argument_data: HashMap<usize, Option<Arguments>>,
    ancillary_lists: Vec<AncillaryHandle>,
    statistics: EventListStatistics,
    first_event_time: f64,
    last_event_time: f64,
    hidden_count: usize,
    maximum_scope_depth: usize,
    max_scope_depth: usize,
    last_insert_time: f64,
    resort_needed: bool,
}

struct OpenScope {
    index: usize,
    event_type: Arc<EventType>,
    max_depth: u32,
    child_time: f64,
    system_time: f64,
}

impl std::fmt::Debug for EventList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventList")
            .field("count", &self.len())
            .field("first_event_time", &self.first_event_time)
            .field("last_event_time", &self.last_event_time)
            .field("ancillary_lists", &self.ancillary_lists.len())
            .finish()
    }
}

impl Default for EventList {
    fn default() -> Self {
        Self::new()
    }
}

impl EventList {
    pub fn new() -> Self {
        Self::with_max_scope_depth(MAX_SCOPE_DEPTH)
    }

    pub fn with_max_scope_depth(max_scope_depth: usize) -> Self {
        Self {
            types: Vec::new(),
            times: Vec::new(),
            arg_slots: Vec::new(),
            parents: Vec::new(),
            depths: Vec::new(),
            max_descendant_depths: Vec::new(),
            next_siblings: Vec::new(),
            end_times: Vec::new(),
            child_times: Vec::new(),
            system_times: Vec::new(),
            tags: Vec::new(),
            argument_data: Vec::new(),
            original_argument_data: HashMap::new(),
            ancillary_lists: Vec::new(),
            statistics: Default::default(),
            first_event_time: 0.0,
            last_event_time: 0.0,
            hidden_count: 0,
            maximum_scope_depth: 0,
            max_scope_depth,
            last_insert_time: 0.0,
            resort_needed: false,
        }
    }

    /// Registers a derived list. It is rebuilt right away if the list has events.
    /// Registering the same list twice does nothing.
    pub fn register_ancillary_list(&mut self, list: AncillaryHandle, event_types: &EventTypeTable) {
        if self.ancillary_lists.iter().any(|l| same_list(l, &list)) {
            return;
        }
        self.ancillary_lists.push(list.clone());
        if !self.is_empty() {
            self.rebuild_ancillary_lists(&[list], event_types);
        }
    }

    pub fn unregister_ancillary_list(&mut self, list: &AncillaryHandle) {
        self.ancillary_lists.retain(|l| !same_list(l, list));
    }

    pub fn ancillary_list_count(&self) -> usize {
        self.ancillary_lists.len()
    }

    /// Appends an event and returns its index until the next rebuild.
    pub fn insert(&mut self, event_type: Arc<EventType>, time: f64, args: Option<Arguments>) -> usize {
        let index = self.types.len();
        let slot = args.map(|args| self.allocate_arguments(args));
        self.types.push(event_type);
        self.times.push(time);
        self.arg_slots.push(slot);
        self.parents.push(None);
        self.depths.push(0);
        self.max_descendant_depths.push(0);
        self.next_siblings.push(None);
        self.end_times.push(None);
        self.child_times.push(0.0);
        self.system_times.push(0.0);
        self.tags.push(0);
        if time < self.last_insert_time {
            self.resort_needed = true;
        }
        self.last_insert_time = time;
        index
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Events not hidden from the user.
    pub fn total_event_count(&self) -> usize {
        self.len() - self.hidden_count
    }

    pub fn first_event_time(&self) -> f64 {
        self.first_event_time
    }

    pub fn last_event_time(&self) -> f64 {
        self.last_event_time
    }

    pub fn maximum_scope_depth(&self) -> usize {
        self.maximum_scope_depth
    }

    pub fn statistics(&self) -> EventListStatistics {
        self.statistics
    }

    /// Restores time order, links scopes and rebuilds every ancillary list.
    ///
    /// Generic scope enter and time stamp events are turned into types named after
    /// their `name` argument, which are defined on demand.
    pub fn rebuild(&mut self, event_types: &mut EventTypeTable) {
        if self.resort_needed {
            self.resort_events();
            self.resort_needed = false;
        }
        self.statistics = EventListStatistics {
            total_count: self.len(),
            ..Default::default()
        };
        self.rescope_events(event_types);
        self.first_event_time = 0.0;
        self.last_event_time = 0.0;
        if let Some(last) = self.len().checked_sub(1) {
            self.first_event_time = self.times[0];
            self.last_event_time = self.end_times[last].unwrap_or(self.times[last]);
        }
        let lists = self.ancillary_lists.clone();
        self.rebuild_ancillary_lists(&lists, event_types);
        log::debug!(
            "Rebuilt {} events ({} hidden), {} ancillary lists",
            self.len(),
            self.hidden_count,
            lists.len()
        );
    }

    fn resort_events(&mut self) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        // stable, so events of equal time keep their insertion order
        order.sort_by(|a, b| self.times[*a].total_cmp(&self.times[*b]));
        fn permute<T: Clone>(column: &mut Vec<T>, order: &[usize]) {
            let sorted = order.iter().map(|i| column[*i].clone()).collect();
            *column = sorted;
        }
        permute(&mut self.types, &order);
        permute(&mut self.times, &order);
        permute(&mut self.arg_slots, &order);
        permute(&mut self.tags, &order);
        self.last_insert_time = self.times.last().copied().unwrap_or(0.0);
    }

    fn rescope_events(&mut self, event_types: &mut EventTypeTable) {
        let count = self.len();
        let mut stack: Vec<OpenScope> = Vec::new();
        let mut maximum_depth = 0;
        let mut hidden_count = 0;
        // scopes entered past the maximum depth; their leaves pop nothing
        let mut untracked = 0usize;

        for n in 0..count {
            let depth = stack.len() as u32;
            let next = if n + 1 < count { Some(n + 1) } else { None };
            self.parents[n] = stack.last().map(|s| s.index);
            self.depths[n] = depth;
            self.max_descendant_depths[n] = depth;
            self.next_siblings[n] = next;
            self.end_times[n] = None;
            self.child_times[n] = 0.0;
            self.system_times[n] = 0.0;

            let event_type = self.types[n].clone();
            let mut delete_args = false;
            match event_type.builtin() {
                Some(BuiltinEvent::ScopeEnter) => {
                    let name = self.argument_str(n, "name").unwrap_or("unnamed.scope");
                    let scope_type = Self::get_or_define(
                        event_types,
                        name,
                        EventTypeDef::new(name, EventClass::Scope, EventFlags::empty(), vec![]),
                    );
                    self.types[n] = scope_type.clone();
                    if self.enter_scope(&mut stack, &mut untracked, n, scope_type) {
                        maximum_depth = maximum_depth.max(stack.len());
                    }
                    delete_args = true;
                    self.statistics.generic_enter_scope += 1;
                }
                Some(BuiltinEvent::ScopeLeave) => {
                    self.next_siblings[n] = None;
                    if untracked > 0 {
                        untracked -= 1;
                    } else if let Some(scope) = stack.pop() {
                        let time = self.times[n];
                        let duration = time - self.times[scope.index];
                        self.next_siblings[scope.index] = next;
                        self.end_times[scope.index] = Some(time);
                        self.max_descendant_depths[scope.index] = scope.max_depth;
                        self.child_times[scope.index] = scope.child_time;
                        self.system_times[scope.index] = scope.system_time;
                        if let Some(parent) = stack.last_mut() {
                            parent.max_depth = parent.max_depth.max(scope.max_depth);
                            parent.child_time += duration;
                            if scope.event_type.flags().contains(EventFlags::SYSTEM_TIME) {
                                parent.system_time += duration;
                            }
                        }
                    }
                    hidden_count += 1;
                }
                Some(BuiltinEvent::ScopeAppendData) => {
                    if let Some(args) = self.arguments_at(n) {
                        let mut appended = Arguments::new();
                        if let Some(name) = args.get("name").and_then(Value::as_str) {
                            appended.set(name, args.get("value").cloned().unwrap_or(Value::Null));
                        }
                        self.append_scope_data(stack.last(), &appended);
                    }
                    hidden_count += 1;
                    delete_args = true;
                    self.statistics.append_scope_data += 1;
                }
                Some(BuiltinEvent::TimeStamp) => {
                    let name = self.argument_str(n, "name").unwrap_or("unnamed.instance");
                    let instance_type = Self::get_or_define(
                        event_types,
                        name,
                        EventTypeDef::new(name, EventClass::Instance, EventFlags::empty(), vec![]),
                    );
                    self.types[n] = instance_type;
                    delete_args = true;
                    self.statistics.generic_time_stamp += 1;
                }
                _ => {
                    if event_type.is_scope()
                        && self.enter_scope(&mut stack, &mut untracked, n, event_type.clone())
                    {
                        maximum_depth = maximum_depth.max(stack.len());
                    }
                    if event_type.flags().contains(EventFlags::APPEND_SCOPE_DATA) {
                        if let Some(args) = self.arguments_at(n).cloned() {
                            self.append_scope_data(stack.last(), &args);
                        }
                        hidden_count += 1;
                        delete_args = true;
                        self.statistics.append_scope_data += 1;
                    } else if event_type.is_hidden() {
                        hidden_count += 1;
                    }
                }
            }

            if delete_args {
                if let Some(slot) = self.arg_slots[n].take() {
                    self.argument_data[slot] = None;
                }
            }
        }
        if !stack.is_empty() {
            log::debug!("{} scopes left open", stack.len());
        }

        self.hidden_count = hidden_count;
        self.maximum_scope_depth = maximum_depth;
    }

    /// Opens a scope, unless the stack is already at the maximum depth.
    fn enter_scope(
        &self,
        stack: &mut Vec<OpenScope>,
        untracked: &mut usize,
        index: usize,
        event_type: Arc<EventType>,
    ) -> bool {
        if stack.len() >= self.max_scope_depth {
            if *untracked == 0 {
                log::warn!(
                    "Maximum scope depth {} exceeded at event {index}",
                    self.max_scope_depth
                );
            }
            *untracked += 1;
            return false;
        }
        stack.push(OpenScope {
            index,
            event_type,
            max_depth: stack.len() as u32,
            child_time: 0.0,
            system_time: 0.0,
        });
        true
    }

    fn get_or_define(event_types: &mut EventTypeTable, name: &str, def: EventTypeDef) -> Arc<EventType> {
        match event_types.get_by_name(name) {
            Some(existing) => existing.clone(),
            None => event_types.define_type(def),
        }
    }

    fn append_scope_data(&mut self, scope: Option<&OpenScope>, args: &Arguments) {
        let scope = match scope {
            Some(scope) => scope.index,
            None => {
                log::warn!("Scope data appended outside of any scope");
                return;
            }
        };
        match self.arg_slots[scope] {
            Some(slot) => match self.argument_data[slot].as_mut() {
                Some(existing) => existing.merge(args),
                None => self.argument_data[slot] = Some(args.clone()),
            },
            None => {
                let slot = self.allocate_arguments(args.clone());
                self.arg_slots[scope] = Some(slot);
            }
        }
    }

    fn rebuild_ancillary_lists(&self, lists: &[AncillaryHandle], event_types: &EventTypeTable) {
        if lists.is_empty() {
            return;
        }
        let mut guards: Vec<_> = lists
            .iter()
            .map(|l| l.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();
        let mut handlers: HashMap<u32, Vec<(usize, usize, Arc<EventType>)>> = HashMap::new();
        for (l, list) in guards.iter_mut().enumerate() {
            let desired = list.begin_rebuild(event_types);
            for (m, event_type) in desired.into_iter().enumerate() {
                if let Some(event_type) = event_type {
                    handlers
                        .entry(event_type.id())
                        .or_default()
                        .push((l, m, event_type));
                }
            }
        }
        if !handlers.is_empty() {
            let mut it = self.begin();
            for n in 0..self.len() {
                if let Some(handlers) = handlers.get(&self.types[n].id()) {
                    for (l, m, event_type) in handlers {
                        it.seek(n);
                        guards[*l].handle_event(*m, event_type, &it);
                    }
                }
            }
        }
        for list in guards.iter_mut() {
            list.end_rebuild(self);
        }
    }

    fn allocate_arguments(&mut self, args: Arguments) -> usize {
        self.argument_data.push(Some(args));
        self.argument_data.len() - 1
    }

    fn argument_str(&self, index: usize, name: &str) -> Option<&str> {
        self.arguments_at(index)?.get(name)?.as_str()
    }

    pub(crate) fn arguments_at(&self, index: usize) -> Option<&Arguments> {
        let slot = self.arg_slots[index]?;
        self.argument_data[slot].as_ref()
    }

    /// Overrides the arguments of an event. The original can be restored with
    /// [`EventList::reset_argument_data`].
    pub fn set_argument_data(&mut self, index: usize, values: Arguments) {
        let slot = match self.arg_slots[index] {
            Some(slot) => slot,
            None => {
                self.argument_data.push(None);
                let slot = self.argument_data.len() - 1;
                self.arg_slots[index] = Some(slot);
                slot
            }
        };
        let previous = std::mem::replace(&mut self.argument_data[slot], Some(values));
        self.original_argument_data.entry(slot).or_insert(previous);
    }

    pub fn reset_argument_data(&mut self, index: usize) {
        if let Some(slot) = self.arg_slots[index] {
            if let Some(original) = self.original_argument_data.remove(&slot) {
                self.argument_data[slot] = original;
            }
        }
    }

    pub fn set_tag(&mut self, index: usize, tag: u32) {
        self.tags[index] = tag;
    }

    /// Times are sorted after a rebuild.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub(crate) fn event_type_at(&self, index: usize) -> &Arc<EventType> {
        &self.types[index]
    }

    pub(crate) fn time_at(&self, index: usize) -> f64 {
        self.times[index]
    }

    pub(crate) fn end_time_at(&self, index: usize) -> Option<f64> {
        self.end_times[index]
    }

    pub(crate) fn parent_at(&self, index: usize) -> Option<usize> {
        self.parents[index]
    }

    pub(crate) fn depth_at(&self, index: usize) -> u32 {
        self.depths[index]
    }

    pub(crate) fn max_descendant_depth_at(&self, index: usize) -> u32 {
        self.max_descendant_depths[index]
    }

    pub(crate) fn next_sibling_at(&self, index: usize) -> Option<usize> {
        self.next_siblings[index]
    }

    pub(crate) fn child_time_at(&self, index: usize) -> f64 {
        self.child_times[index]
    }

    pub(crate) fn system_time_at(&self, index: usize) -> f64 {
        self.system_times[index]
    }

    pub(crate) fn tag_at(&self, index: usize) -> u32 {
        self.tags[index]
    }

    /// `Ok` with the first event at exactly `time`, or `Err` with the index where
    /// an event at `time` would be inserted.
    pub fn binary_search_by_time(&self, time: f64) -> Result<usize, usize> {
        let index = self.times.partition_point(|t| *t < time);
        if index < self.len() && self.times[index] == time {
            Ok(index)
        } else {
            Err(index)
        }
    }

    /// The last event before `time`, or the first event.
    pub fn get_index_of_event_near_time(&self, time: f64) -> usize {
        match self.binary_search_by_time(time) {
            Ok(index) | Err(index) => index.saturating_sub(1),
        }
    }

    pub fn get_event_near_time(&self, time: f64) -> EventIterator<'_> {
        self.get_event(self.get_index_of_event_near_time(time))
    }

    /// The root scope enclosing `time`, or the event near `time` if there is none.
    pub fn get_index_of_root_scope_including_time(&self, time: f64) -> usize {
        let near = self.get_index_of_event_near_time(time);
        if near == 0 {
            return 0;
        }
        let mut i = near;
        loop {
            let mut root = i;
            while let Some(parent) = self.parents[root] {
                root = parent;
            }
            if let Some(end_time) = self.end_times[root] {
                return if end_time < time { near } else { root };
            }
            if root == 0 {
                return near;
            }
            i = root - 1;
        }
    }

    pub fn begin(&self) -> EventIterator<'_> {
        EventIterator::new(self, 0, self.len(), 0, None)
    }

    /// Events from around `start_time` up to the last event starting at or before
    /// `end_time`. With `start_at_root` the enclosing root scope is included.
    pub fn begin_time_range(&self, start_time: f64, end_time: f64, start_at_root: bool) -> EventIterator<'_> {
        if self.is_empty() {
            return EventIterator::new(self, 0, 0, 0, None);
        }
        let first = if start_at_root {
            self.get_index_of_root_scope_including_time(start_time)
        } else {
            self.get_index_of_event_near_time(start_time)
        };
        let last = self
            .times
            .partition_point(|t| *t <= end_time)
            .saturating_sub(1)
            .max(first);
        self.begin_event_range(first, last)
    }

    /// Events `first..=last`.
    pub fn begin_event_range(&self, first: usize, last: usize) -> EventIterator<'_> {
        let end = (last + 1).min(self.len());
        EventIterator::new(self, first, end, first, None)
    }

    pub fn get_event(&self, index: usize) -> EventIterator<'_> {
        let end = (index + 1).min(self.len());
        EventIterator::new(self, index, end, index, None)
    }

    /// Visits, in time order, every event overlapping `[start_time, end_time]`,
    /// including scopes that began before `start_time`.
    pub fn for_each_intersecting<F>(&self, start_time: f64, end_time: f64, mut f: F)
    where
        F: FnMut(&EventIterator<'_>),
    {
        if self.is_empty() {
            return;
        }
        let first = self.get_index_of_root_scope_including_time(start_time);
        let mut it = self.begin_event_range(first, self.len() - 1);
        while !it.done() {
            if it.time() > end_time {
                break;
            }
            if it.end_time() >= start_time {
                f(&it);
            }
            it.next();
        }
    }

    /// Id of the type named `name`, if defined and used by this list.
    pub fn get_event_type_id(&self, name: &str) -> Option<u32> {
        self.types.iter().find(|t| t.name() == name).map(|t| t.id())
    }

    /// An indented listing of every event, for debugging.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let mut it = self.begin();
        while !it.done() {
            for _ in 0..it.depth() {
                out.push_str("  ");
            }
            out.push_str(&format!("{:.3}ms {}\n", it.time(), it.name()));
            it.next();
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use wtf_trace_types::EventTypeDef;

    fn table() -> (EventTypeTable, Arc<EventType>, Arc<EventType>, Arc<EventType>) {
        let mut table = EventTypeTable::new();
        let foo = table.define_type(EventTypeDef::instance("foo(uint32 x)", EventFlags::empty()).unwrap());
        let enter = table.define_type(BuiltinEvent::ScopeEnter.definition());
        let leave = table.define_type(BuiltinEvent::ScopeLeave.definition());
        (table, foo, enter, leave)
    }

    #[test]
    fn test_minimal_round_trip() {
        let (mut table, foo, _, _) = table();
        let mut list = EventList::new();
        list.insert(foo.clone(), 5.0, Some(Arguments::new().with("x", 1u32)));
        list.insert(foo, 7.0, Some(Arguments::new().with("x", 2u32)));
        list.rebuild(&mut table);
        assert_eq!(list.len(), 2);

        let mut it = list.begin();
        it.seek(0);
        assert_eq!(it.time(), 5.0);
        assert_eq!(it.argument("x").and_then(Value::as_u32), Some(1));
        it.seek(1);
        assert_eq!(it.time(), 7.0);
        assert_eq!(it.argument("x").and_then(Value::as_u32), Some(2));
        assert_eq!(list.first_event_time(), 5.0);
        assert_eq!(list.last_event_time(), 7.0);
    }

    #[test]
    fn test_binary_search() {
        let (mut table, foo, _, _) = table();
        let mut list = EventList::new();
        for time in [1.0, 3.0, 3.0, 5.0, 9.0] {
            list.insert(foo.clone(), time, None);
        }
        list.rebuild(&mut table);
        assert_eq!(list.binary_search_by_time(1.0), Ok(0));
        assert_eq!(list.binary_search_by_time(3.0), Ok(1));
        assert_eq!(list.binary_search_by_time(9.0), Ok(4));
        assert_eq!(list.binary_search_by_time(0.5), Err(0));
        assert_eq!(list.binary_search_by_time(4.0), Err(3));
        assert_eq!(list.binary_search_by_time(10.0), Err(5));

        assert_eq!(list.get_index_of_event_near_time(4.0), 2);
        assert_eq!(list.get_index_of_event_near_time(0.0), 0);
        assert_eq!(list.get_index_of_event_near_time(100.0), 4);
    }

    #[test]
    fn test_resort_is_stable() {
        let (mut table, foo, _, _) = table();
        let mut list = EventList::new();
        list.insert(foo.clone(), 10.0, Some(Arguments::new().with("x", 0u32)));
        list.insert(foo.clone(), 5.0, Some(Arguments::new().with("x", 1u32)));
        list.insert(foo.clone(), 5.0, Some(Arguments::new().with("x", 2u32)));
        list.insert(foo, 1.0, Some(Arguments::new().with("x", 3u32)));
        list.rebuild(&mut table);
        assert_eq!(list.times(), &[1.0, 5.0, 5.0, 10.0]);
        let xs: Vec<_> = (0..4)
            .map(|i| list.get_event(i).argument("x").and_then(Value::as_u32))
            .collect();
        assert_eq!(xs, vec![Some(3), Some(1), Some(2), Some(0)]);
    }

    #[test]
    fn test_rescope() {
        let (mut table, foo, enter, leave) = table();
        let mut list = EventList::new();
        list.insert(enter.clone(), 0.0, Some(Arguments::new().with("name", "outer")));
        list.insert(enter, 1.0, Some(Arguments::new().with("name", "inner")));
        list.insert(foo.clone(), 2.0, Some(Arguments::new().with("x", 1u32)));
        list.insert(leave.clone(), 4.0, None);
        list.insert(leave, 10.0, None);
        list.insert(foo, 11.0, Some(Arguments::new().with("x", 2u32)));
        list.rebuild(&mut table);

        let outer = list.get_event(0);
        assert_eq!(outer.name(), "outer");
        assert!(outer.is_scope());
        assert_eq!(outer.end_time(), 10.0);
        assert_eq!(outer.total_duration(), 10.0);
        assert_eq!(outer.own_duration(), 7.0);
        assert_eq!(outer.max_descendant_depth(), 1);
        assert!(outer.arguments().is_none());

        let inner = list.get_event(1);
        assert_eq!(inner.name(), "inner");
        assert_eq!(inner.depth(), 1);
        assert_eq!(inner.parent().map(|p| p.index()), Some(0));

        let foo = list.get_event(2);
        assert_eq!(foo.depth(), 2);
        assert_eq!(foo.parent().map(|p| p.name().to_owned()), Some("inner".to_owned()));

        assert_eq!(list.get_event(5).depth(), 0);
        assert_eq!(list.maximum_scope_depth(), 2);
        assert_eq!(list.total_event_count(), 4);
        assert_eq!(list.statistics().generic_enter_scope, 2);
        assert_eq!(list.last_event_time(), 11.0);
        assert!(table.get_by_name("outer").map(|t| t.is_scope()).unwrap_or(false));

        // the second scope begins after the first event, inside `outer`
        assert_eq!(list.get_index_of_root_scope_including_time(3.0), 0);
        assert_eq!(list.get_index_of_root_scope_including_time(10.5), 4);

        let mut visited = Vec::new();
        list.for_each_intersecting(3.0, 3.5, |it| visited.push(it.index()));
        assert_eq!(visited, vec![0, 1]);
    }

    #[test]
    fn test_rescope_past_max_depth() {
        let (mut table, foo, enter, leave) = table();
        let mut list = EventList::with_max_scope_depth(2);
        for (time, name) in [(0.0, "a"), (1.0, "b"), (2.0, "c")] {
            list.insert(enter.clone(), time, Some(Arguments::new().with("name", name)));
        }
        list.insert(foo.clone(), 3.0, None);
        list.insert(leave.clone(), 4.0, None); // c
        list.insert(leave.clone(), 5.0, None); // b
        list.insert(foo.clone(), 6.0, None);
        list.insert(leave, 7.0, None); // a
        list.insert(foo, 8.0, None);
        list.rebuild(&mut table);

        assert_eq!(list.maximum_scope_depth(), 2);
        let deep = list.get_event(3);
        assert_eq!(deep.depth(), 2);
        assert_eq!(deep.parent().map(|p| p.index()), Some(1));
        assert_eq!(list.get_event(1).end_time(), 5.0);
        assert_eq!(list.get_event(0).end_time(), 7.0);
        let after = list.get_event(6);
        assert_eq!(after.depth(), 1);
        assert_eq!(after.parent().map(|p| p.index()), Some(0));
        let last = list.get_event(8);
        assert_eq!(last.depth(), 0);
        assert!(last.parent().is_none());
    }

    #[test]
    fn test_ancillary_registration() {
        use crate::EventIndex;
        use std::sync::Mutex;

        let (mut table, foo, _, _) = table();
        let mut list = EventList::new();
        list.insert(foo.clone(), 1.0, None);
        list.insert(foo, 2.0, None);
        list.rebuild(&mut table);

        let index = Arc::new(Mutex::new(EventIndex::new(["foo"])));
        list.register_ancillary_list(index.clone(), &table);
        list.register_ancillary_list(index.clone(), &table);
        assert_eq!(list.ancillary_list_count(), 1);
        list.rebuild(&mut table);
        assert_eq!(index.lock().unwrap().count(), 2);

        let holder = index.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.lock().unwrap();
            panic!("list dropped while locked");
        })
        .join();
        assert!(index.is_poisoned());
        list.rebuild(&mut table);
        assert_eq!(index.lock().unwrap_or_else(PoisonError::into_inner).count(), 2);
    }

    #[test]
    fn test_append_scope_data() {
        let (mut table, _, enter, leave) = table();
        let append = table.define_type(BuiltinEvent::ScopeAppendData.definition());
        let mut list = EventList::new();
        list.insert(enter, 0.0, Some(Arguments::new().with("name", "load")));
        list.insert(
            append,
            1.0,
            Some(Arguments::new().with("name", "url").with("value", "/index")),
        );
        list.insert(leave, 2.0, None);
        list.rebuild(&mut table);
        assert_eq!(
            list.get_event(0).argument("url").and_then(Value::as_str),
            Some("/index")
        );
        assert!(list.get_event(1).is_hidden());
        assert_eq!(list.statistics().append_scope_data, 1);
    }

    #[test]
    fn test_argument_override() {
        let (mut table, foo, _, _) = table();
        let mut list = EventList::new();
        list.insert(foo.clone(), 1.0, Some(Arguments::new().with("x", 1u32)));
        list.insert(foo, 2.0, None);
        list.rebuild(&mut table);

        list.set_argument_data(0, Arguments::new().with("x", 9u32));
        list.set_argument_data(0, Arguments::new().with("x", 10u32));
        assert_eq!(list.get_event(0).argument("x").and_then(Value::as_u32), Some(10));
        list.reset_argument_data(0);
        assert_eq!(list.get_event(0).argument("x").and_then(Value::as_u32), Some(1));

        list.set_argument_data(1, Arguments::new().with("y", true));
        assert!(list.get_event(1).argument("y").is_some());
        list.reset_argument_data(1);
        assert!(list.get_event(1).arguments().is_none());
    }
}
