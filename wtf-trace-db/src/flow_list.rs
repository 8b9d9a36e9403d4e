use crate::{EventIterator, Invalidated, Notifier, Zone, ZoneId};
use flume::Receiver;
use std::collections::HashMap;
use wtf_trace_types::{Arguments, BuiltinEvent, EventTypeTable, Value};

const FLOW_EVENTS: [BuiltinEvent; 4] = [
    BuiltinEvent::FlowBranch,
    BuiltinEvent::FlowExtend,
    BuiltinEvent::FlowTerminate,
    BuiltinEvent::FlowAppendData,
];

/// Position of a [`Flow`] in its [`FlowList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowHandle(usize);

/// A step of a flow: its branch or one of its extends.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStep {
    pub zone: ZoneId,
    pub event_id: usize,
    pub name: String,
    pub value: Value,
    pub time: f64,
}

/// An asynchronous flow of control, from `wtf.flow#branch` to `wtf.flow#terminate`.
/// Its steps may happen in different zones.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    handle: FlowHandle,
    id: u32,
    parent: Option<FlowHandle>,
    steps: Vec<FlowStep>,
    terminate: Option<(ZoneId, usize)>,
    end_time: Option<f64>,
    data: Arguments,
}

/// Every flow of a database, in branch order.
///
/// Sources number their flows independently, so their ids are remapped to
/// database-wide ids as events are added. Flows refer to their parent by handle.
/// A flow id may be reused once the flow carrying it terminated; lookups by id
/// find the latest.
#[derive(Debug, Default)]
pub struct FlowList {
    flows: Vec<Flow>,
    by_id: HashMap<u32, FlowHandle>,
    notifier: Notifier<Invalidated>,
}

impl FlowHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Flow {
    pub fn handle(&self) -> FlowHandle {
        self.handle
    }

    /// Database-wide id.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn parent(&self) -> Option<FlowHandle> {
        self.parent
    }

    pub fn name(&self) -> &str {
        &self.steps[0].name
    }

    pub fn value(&self) -> &Value {
        &self.steps[0].value
    }

    /// Zone of the branch.
    pub fn zone(&self) -> ZoneId {
        self.steps[0].zone
    }

    pub fn branch_event_id(&self) -> usize {
        self.steps[0].event_id
    }

    /// The branch followed by every extend.
    pub fn steps(&self) -> &[FlowStep] {
        &self.steps
    }

    /// Zone and event id of the terminate.
    pub fn terminate_event(&self) -> Option<(ZoneId, usize)> {
        self.terminate
    }

    pub fn is_terminated(&self) -> bool {
        self.terminate.is_some()
    }

    pub fn time(&self) -> f64 {
        self.steps[0].time
    }

    /// The terminate time, else the time of the last step.
    pub fn end_time(&self) -> f64 {
        match self.end_time {
            Some(end_time) => end_time,
            None => self.steps.last().map(|s| s.time).unwrap_or_default(),
        }
    }

    /// Data appended with `wtf.flow#appendData`, plus the terminate value.
    pub fn data(&self) -> &Arguments {
        &self.data
    }
}

impl FlowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn subscribe(&mut self) -> Receiver<Invalidated> {
        self.notifier.subscribe()
    }

    pub fn get(&self, handle: FlowHandle) -> Option<&Flow> {
        self.flows.get(handle.0)
    }

    pub fn get_flow_by_id(&self, id: u32) -> Option<&Flow> {
        self.get(*self.by_id.get(&id)?)
    }

    pub fn parent(&self, flow: &Flow) -> Option<&Flow> {
        self.get(flow.parent?)
    }

    pub fn children(&self, flow: &Flow) -> Vec<&Flow> {
        self.flows
            .iter()
            .filter(|f| f.parent == Some(flow.handle))
            .collect()
    }

    pub fn for_each_intersecting<F: FnMut(&Flow)>(&self, start_time: f64, end_time: f64, mut f: F) {
        for flow in self.flows.iter() {
            if flow.time() > end_time {
                break;
            }
            if flow.end_time() >= start_time {
                f(flow);
            }
        }
    }

    fn flow_mut(&mut self, id: u32, event: &str) -> Option<&mut Flow> {
        match self.by_id.get(&id) {
            Some(handle) => self.flows.get_mut(handle.0),
            None => {
                log::warn!("{event} for unknown flow {id}");
                None
            }
        }
    }
}

fn step(zone: ZoneId, it: &EventIterator<'_>) -> FlowStep {
    FlowStep {
        zone,
        event_id: it.index(),
        name: it
            .argument("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        value: it.argument("value").cloned().unwrap_or(Value::Null),
        time: it.time(),
    }
}

impl FlowList {
    /// Rebuilds every flow from the flow events of all `zones`, merged in time
    /// order. Events of equal time keep their zone order.
    pub(crate) fn rebuild(&mut self, zones: &[Zone], event_types: &EventTypeTable) {
        self.flows.clear();
        self.by_id.clear();
        let kinds: Vec<Option<u32>> = FLOW_EVENTS
            .iter()
            .map(|event| event_types.get_by_name(event.name()).map(|t| t.id()))
            .collect();
        let mut events = Vec::new();
        if kinds.iter().any(Option::is_some) {
            for (z, zone) in zones.iter().enumerate() {
                let list = zone.event_list();
                for n in 0..list.len() {
                    let id = Some(list.event_type_at(n).id());
                    if let Some(kind) = kinds.iter().position(|k| *k == id) {
                        events.push((list.time_at(n), z, n, kind));
                    }
                }
            }
        }
        events.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (_, z, n, kind) in events {
            let zone = &zones[z];
            self.handle_event(kind, zone.id(), &zone.event_list().get_event(n));
        }
        self.notifier.emit(Invalidated);
    }

    fn handle_event(&mut self, kind: usize, zone: ZoneId, it: &EventIterator<'_>) {
        let id = match it.argument("id").and_then(Value::as_u32) {
            Some(id) => id,
            None => return,
        };
        let event = FLOW_EVENTS[kind].name();
        match FLOW_EVENTS[kind] {
            BuiltinEvent::FlowBranch => {
                let parent = it
                    .argument("parentId")
                    .and_then(Value::as_u32)
                    .filter(|parent| *parent != 0)
                    .and_then(|parent| self.by_id.get(&parent).copied());
                let handle = FlowHandle(self.flows.len());
                self.flows.push(Flow {
                    handle,
                    id,
                    parent,
                    steps: vec![step(zone, it)],
                    terminate: None,
                    end_time: None,
                    data: Arguments::new(),
                });
                self.by_id.insert(id, handle);
            }
            BuiltinEvent::FlowExtend => {
                if let Some(flow) = self.flow_mut(id, event) {
                    flow.steps.push(step(zone, it));
                }
            }
            BuiltinEvent::FlowTerminate => {
                if let Some(flow) = self.flow_mut(id, event) {
                    flow.terminate = Some((zone, it.index()));
                    flow.end_time = Some(it.time());
                    if let Some(value) = it.argument("value").filter(|v| !v.is_null()) {
                        flow.data.set("value", value.clone());
                    }
                }
            }
            _ => {
                let name = it.argument("name").and_then(Value::as_str);
                let value = it.argument("value").cloned().unwrap_or(Value::Null);
                if let (Some(flow), Some(name)) = (self.flow_mut(id, event), name) {
                    flow.data.set(name, value);
                }
            }
        }
    }
}
