use crate::EventList;
use std::sync::Arc;
use wtf_trace_types::{Arguments, EventFlags, EventType, Value};

/// A cursor over a range of an [`EventList`].
///
/// Positions run from `0` to [`EventIterator::count`]. An iterator over an index
/// maps positions to events through the index; otherwise positions are event indices.
/// Getters must not be called once the iterator is [`EventIterator::done`].
#[derive(Debug, Clone)]
pub struct EventIterator<'a> {
    list: &'a EventList,
    first: usize,
    end: usize,
    index: usize,
    indirection: Option<&'a [usize]>,
}

impl<'a> EventIterator<'a> {
    pub(crate) fn new(
        list: &'a EventList,
        first: usize,
        end: usize,
        index: usize,
        indirection: Option<&'a [usize]>,
    ) -> Self {
        Self {
            list,
            first,
            end,
            index,
            indirection,
        }
    }

    /// Iterates over the events listed in `indices`, which must be ascending.
    pub fn over_indices(list: &'a EventList, indices: &'a [usize]) -> Self {
        Self::new(list, 0, indices.len(), 0, Some(indices))
    }

    pub fn event_list(&self) -> &'a EventList {
        self.list
    }

    pub fn count(&self) -> usize {
        self.end.saturating_sub(self.first)
    }

    pub fn done(&self) -> bool {
        self.index >= self.end
    }

    /// Current position of the iterator.
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn seek(&mut self, position: usize) {
        self.index = position;
    }

    pub fn next(&mut self) {
        if !self.done() {
            self.index += 1;
        }
    }

    pub fn next_scope(&mut self) {
        self.next();
        while !self.done() && !self.is_scope() {
            self.index += 1;
        }
    }

    pub fn next_instance(&mut self) {
        self.next();
        while !self.done() && !self.is_instance() {
            self.index += 1;
        }
    }

    /// Skips the descendants of the current event.
    pub fn next_sibling(&mut self) {
        let next = self.list.next_sibling_at(self.event());
        self.seek_event(next);
    }

    pub fn next_sibling_scope(&mut self) {
        self.next_sibling();
        if !self.done() && !self.is_scope() {
            self.next_scope();
        }
    }

    pub fn move_to_first_scope(&mut self) {
        self.seek(self.first);
        if !self.done() && !self.is_scope() {
            self.next_scope();
        }
    }

    pub fn move_to_first_instance(&mut self) {
        self.seek(self.first);
        if !self.done() && !self.is_instance() {
            self.next_instance();
        }
    }

    /// Moves to the enclosing scope, or past the end at the root.
    pub fn move_to_parent(&mut self) {
        let parent = self.list.parent_at(self.event());
        self.seek_event(parent);
    }

    fn seek_event(&mut self, event: Option<usize>) {
        self.index = match (event, self.indirection) {
            (None, _) => self.end,
            (Some(event), None) if event >= self.first => event,
            (Some(event), Some(indices)) => match indices.binary_search(&event) {
                Ok(position) => position,
                Err(_) => self.end,
            },
            _ => self.end,
        };
    }

    /// Index of the current event in the event list.
    pub fn index(&self) -> usize {
        self.event()
    }

    fn event(&self) -> usize {
        match self.indirection {
            Some(indices) => indices[self.index],
            None => self.index,
        }
    }

    pub fn event_type(&self) -> &'a Arc<EventType> {
        self.list.event_type_at(self.event())
    }

    pub fn type_id(&self) -> u32 {
        self.event_type().id()
    }

    pub fn name(&self) -> &'a str {
        self.event_type().name()
    }

    pub fn type_flags(&self) -> EventFlags {
        self.event_type().flags()
    }

    pub fn is_hidden(&self) -> bool {
        self.event_type().is_hidden()
            || self
                .type_flags()
                .intersects(EventFlags::APPEND_SCOPE_DATA | EventFlags::APPEND_FLOW_DATA)
    }

    /// Closed scopes only. A scope whose leave never arrived reads as an instance.
    pub fn is_scope(&self) -> bool {
        self.list.end_time_at(self.event()).is_some()
    }

    pub fn is_instance(&self) -> bool {
        !self.is_scope()
    }

    /// An iterator positioned on the enclosing scope.
    pub fn parent(&self) -> Option<EventIterator<'a>> {
        let parent = self.list.parent_at(self.event())?;
        Some(self.list.get_event(parent))
    }

    /// End time of the enclosing scope, or `0` at the root.
    pub fn parent_end_time(&self) -> f64 {
        self.list
            .parent_at(self.event())
            .and_then(|p| self.list.end_time_at(p))
            .unwrap_or(0.0)
    }

    pub fn depth(&self) -> u32 {
        self.list.depth_at(self.event())
    }

    pub fn max_descendant_depth(&self) -> u32 {
        self.list.max_descendant_depth_at(self.event())
    }

    /// Milliseconds.
    pub fn time(&self) -> f64 {
        self.list.time_at(self.event())
    }

    /// For instances, the time of the event.
    pub fn end_time(&self) -> f64 {
        let event = self.event();
        self.list
            .end_time_at(event)
            .unwrap_or_else(|| self.list.time_at(event))
    }

    pub fn total_duration(&self) -> f64 {
        self.end_time() - self.time()
    }

    /// Total duration less the time spent in child scopes.
    pub fn own_duration(&self) -> f64 {
        self.total_duration() - self.list.child_time_at(self.event())
    }

    /// Total duration less the time attributed to the system.
    pub fn user_duration(&self) -> f64 {
        self.total_duration() - self.list.system_time_at(self.event())
    }

    pub fn arguments(&self) -> Option<&'a Arguments> {
        self.list.arguments_at(self.event())
    }

    pub fn argument(&self, name: &str) -> Option<&'a Value> {
        self.arguments()?.get(name)
    }

    pub fn tag(&self) -> u32 {
        self.list.tag_at(self.event())
    }

    /// Declared arguments first, then appended ones.
    pub fn argument_string(&self, with_names: bool) -> String {
        let args = match self.arguments() {
            Some(args) => args,
            None => return String::new(),
        };
        let declared = self.event_type().args();
        let mut names: Vec<&str> = declared.iter().map(|v| v.name.as_str()).collect();
        for (name, _) in args.iter() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        let mut parts = Vec::with_capacity(names.len());
        for name in names {
            let value = match args.get(name) {
                Some(Value::String(s)) => format!("'{s}'"),
                Some(value) => value.to_string(),
                None => "undefined".to_owned(),
            };
            if with_names {
                parts.push(format!("{name}={value}"));
            } else {
                parts.push(value);
            }
        }
        parts.join(", ")
    }

    /// `name(args)`.
    pub fn long_string(&self, with_names: bool) -> String {
        format!("{}({})", self.name(), self.argument_string(with_names))
    }

    /// A human readable description, or `None` once done.
    pub fn info_string(&self) -> Option<String> {
        if self.done() {
            return None;
        }
        let mut lines = Vec::new();
        if self.is_scope() {
            let mut times = format_time(self.total_duration());
            if self.total_duration() != self.own_duration() {
                times.push_str(&format!(" ({})", format_time(self.own_duration())));
            }
            lines.push(format!("{times}: {}", self.name()));
        } else {
            lines.push(self.name().to_owned());
        }
        if let Some(args) = self.arguments() {
            for (name, value) in args.iter() {
                lines.push(format!("{name}: {value}"));
            }
        }
        Some(lines.join("\n"))
    }

    /// Names of the enclosing scopes, innermost first, numbered by depth.
    pub fn scope_stack_string(&self) -> String {
        let mut stack = Vec::new();
        let mut current = Some(self.list.get_event(self.event()));
        while let Some(it) = current {
            if it.done() {
                break;
            }
            stack.push(it.name().to_owned());
            current = it.parent();
        }
        let depth = stack.len();
        stack
            .into_iter()
            .enumerate()
            .map(|(n, name)| format!("{}: {name}", depth - n - 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn format_time(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.3}ms", ms)
    } else {
        format!("{:.2}ms", ms)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use wtf_trace_types::{BuiltinEvent, EventTypeDef, EventTypeTable};

    fn sample() -> (EventTypeTable, EventList) {
        let mut table = EventTypeTable::new();
        let frame = table.define_type(EventTypeDef::scope("app#frame(uint32 n)", EventFlags::empty()).unwrap());
        let gc = table.define_type(
            EventTypeDef::scope("vm#gc()", EventFlags::SYSTEM_TIME).unwrap(),
        );
        let log = table.define_type(EventTypeDef::instance("app#log(ascii msg)", EventFlags::empty()).unwrap());
        let leave = table.define_type(BuiltinEvent::ScopeLeave.definition());
        let mut list = EventList::new();
        list.insert(frame.clone(), 0.0, Some(Arguments::new().with("n", 1u32)));
        list.insert(log.clone(), 1.0, Some(Arguments::new().with("msg", "hi")));
        list.insert(gc, 2.0, None);
        list.insert(leave.clone(), 6.0, None);
        list.insert(leave.clone(), 10.0, None);
        list.insert(frame, 12.0, Some(Arguments::new().with("n", 2u32)));
        list.insert(leave, 20.0, None);
        list.insert(log, 21.0, Some(Arguments::new().with("msg", "bye")));
        list.rebuild(&mut table);
        (table, list)
    }

    #[test]
    fn test_navigation() {
        let (_, list) = sample();
        let mut it = list.begin();
        assert_eq!(it.count(), 8);

        it.move_to_first_instance();
        assert_eq!(it.name(), "app#log");
        it.next_scope();
        assert_eq!(it.name(), "vm#gc");
        assert_eq!(it.scope_stack_string(), "1: vm#gc\n0: app#frame");
        it.move_to_parent();
        assert_eq!(it.index(), 0);
        it.next_sibling();
        assert_eq!(it.index(), 5);
        assert_eq!(it.argument("n").and_then(Value::as_u32), Some(2));
        it.next_sibling();
        assert_eq!(it.name(), "app#log");
        it.next_sibling();
        assert!(it.done());
        assert!(it.info_string().is_none());

        let mut it = list.begin();
        it.next_sibling_scope();
        assert_eq!(it.index(), 5);
        it.next_sibling_scope();
        assert!(it.done());
    }

    #[test]
    fn test_durations() {
        let (_, list) = sample();
        let frame = list.get_event(0);
        assert_eq!(frame.total_duration(), 10.0);
        assert_eq!(frame.own_duration(), 6.0);
        assert_eq!(frame.user_duration(), 6.0);
        assert_eq!(frame.info_string().unwrap(), "10.00ms (6.00ms): app#frame\nn: 1");
        assert_eq!(frame.long_string(true), "app#frame(n=1)");

        let gc = list.get_event(2);
        assert_eq!(gc.parent_end_time(), 10.0);
        assert_eq!(gc.user_duration(), 4.0);

        let log = list.get_event(1);
        assert!(log.is_instance());
        assert_eq!(log.end_time(), 1.0);
        assert_eq!(log.argument_string(false), "'hi'");
        assert_eq!(log.info_string().unwrap(), "app#log\nmsg: hi");
        assert!(list.get_event(3).is_hidden());
    }

    #[test]
    fn test_indirection() {
        let (_, list) = sample();
        let indices = [1, 5, 7];
        let mut it = EventIterator::over_indices(&list, &indices);
        assert_eq!(it.count(), 3);
        let mut names = Vec::new();
        while !it.done() {
            names.push((it.index(), it.name()));
            it.next();
        }
        assert_eq!(names, vec![(1, "app#log"), (5, "app#frame"), (7, "app#log")]);

        it.seek(1);
        it.next_sibling();
        assert_eq!(it.position(), 2);
        assert_eq!(it.index(), 7);
    }
}
