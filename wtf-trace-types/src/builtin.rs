use crate::{EventClass, EventFlags, EventTypeDef};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Wire id every source reserves for `wtf.event#define`.
pub const DEFINE_EVENT_WIRE_ID: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The closed set of control events the database interprets itself.
pub enum BuiltinEvent {
    Define,
    Discontinuity,
    ZoneCreate,
    ZoneDelete,
    ZoneSet,
    ScopeEnter,
    ScopeEnterTracing,
    ScopeLeave,
    ScopeAppendData,
    FlowBranch,
    FlowExtend,
    FlowTerminate,
    FlowAppendData,
    Mark,
    TimeStamp,
    TimeRangeBegin,
    TimeRangeEnd,
    FrameStart,
    FrameEnd,
}

struct Builtin {
    event: BuiltinEvent,
    signature: &'static str,
    class: EventClass,
    flags: EventFlags,
}

const BUILTIN: EventFlags = EventFlags::BUILTIN;
const INTERNAL: EventFlags = EventFlags::INTERNAL;

lazy_static! {
    static ref CATALOGUE: Vec<Builtin> = {
        use BuiltinEvent::*;
        use EventClass::{Instance, Scope};
        let entry = |event, signature, class, flags| Builtin {
            event,
            signature,
            class,
            flags,
        };
        vec![
            entry(
                Define,
                "wtf.event#define(uint16 wireId, uint16 eventClass, uint32 flags, ascii name, ascii args)",
                Instance,
                BUILTIN | INTERNAL,
            ),
            entry(Discontinuity, "wtf.trace#discontinuity()", Instance, BUILTIN),
            entry(
                ZoneCreate,
                "wtf.zone#create(uint16 zoneId, ascii name, ascii type, ascii location)",
                Instance,
                BUILTIN | INTERNAL,
            ),
            entry(ZoneDelete, "wtf.zone#delete(uint16 zoneId)", Instance, BUILTIN | INTERNAL),
            entry(ZoneSet, "wtf.zone#set(uint16 zoneId)", Instance, BUILTIN | INTERNAL),
            entry(ScopeEnter, "wtf.scope#enter(ascii name)", Scope, BUILTIN),
            entry(
                ScopeEnterTracing,
                "wtf.scope#enterTracing()",
                Scope,
                BUILTIN | INTERNAL | EventFlags::SYSTEM_TIME,
            ),
            entry(ScopeLeave, "wtf.scope#leave()", Instance, BUILTIN | INTERNAL),
            entry(
                ScopeAppendData,
                "wtf.scope#appendData(ascii name, any value)",
                Instance,
                BUILTIN | INTERNAL | EventFlags::APPEND_SCOPE_DATA,
            ),
            entry(
                FlowBranch,
                "wtf.flow#branch(flowId id, flowId parentId, ascii name, any value)",
                Instance,
                BUILTIN | INTERNAL,
            ),
            entry(
                FlowExtend,
                "wtf.flow#extend(flowId id, ascii name, any value)",
                Instance,
                BUILTIN | INTERNAL,
            ),
            entry(
                FlowTerminate,
                "wtf.flow#terminate(flowId id, any value)",
                Instance,
                BUILTIN | INTERNAL,
            ),
            entry(
                FlowAppendData,
                "wtf.flow#appendData(flowId id, ascii name, any value)",
                Instance,
                BUILTIN | INTERNAL | EventFlags::APPEND_FLOW_DATA,
            ),
            entry(Mark, "wtf.trace#mark(ascii name, any value)", Instance, BUILTIN | INTERNAL),
            entry(TimeStamp, "wtf.trace#timeStamp(ascii name, any value)", Instance, BUILTIN),
            entry(
                TimeRangeBegin,
                "wtf.timeRange#begin(uint32 id, ascii name, any value)",
                Instance,
                BUILTIN | INTERNAL,
            ),
            entry(TimeRangeEnd, "wtf.timeRange#end(uint32 id)", Instance, BUILTIN | INTERNAL),
            entry(FrameStart, "wtf.timing#frameStart(uint32 number)", Instance, INTERNAL),
            entry(FrameEnd, "wtf.timing#frameEnd(uint32 number)", Instance, INTERNAL),
        ]
    };
    static ref BY_NAME: HashMap<&'static str, BuiltinEvent> = CATALOGUE
        .iter()
        .map(|b| (name_of(b.signature), b.event))
        .collect();
}

fn name_of(signature: &'static str) -> &'static str {
    match signature.find('(') {
        Some(pos) => &signature[..pos],
        None => signature,
    }
}

impl BuiltinEvent {
    pub fn from_name(name: &str) -> Option<Self> {
        BY_NAME.get(name).copied()
    }

    fn entry(&self) -> &'static Builtin {
        CATALOGUE
            .iter()
            .find(|b| b.event == *self)
            .expect("every builtin has a catalogue entry")
    }

    pub fn name(&self) -> &'static str {
        name_of(self.entry().signature)
    }

    pub fn signature(&self) -> &'static str {
        self.entry().signature
    }

    /// The canonical definition, as emitted by the recording library.
    pub fn definition(&self) -> EventTypeDef {
        let entry = self.entry();
        EventTypeDef::parse(entry.signature, entry.class, entry.flags)
            .expect("builtin signatures are well formed")
    }

    pub fn all() -> impl Iterator<Item = BuiltinEvent> {
        CATALOGUE.iter().map(|b| b.event)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_catalogue() {
        assert_eq!(BuiltinEvent::all().count(), 19);
        for event in BuiltinEvent::all() {
            let def = event.definition();
            assert_eq!(def.name, event.name());
            assert_eq!(BuiltinEvent::from_name(event.name()), Some(event));
        }
        assert_eq!(BuiltinEvent::Define.name(), "wtf.event#define");
        assert_eq!(BuiltinEvent::Define.definition().args.len(), 5);
        assert_eq!(
            BuiltinEvent::from_name("wtf.scope#enter"),
            Some(BuiltinEvent::ScopeEnter)
        );
        assert!(BuiltinEvent::ScopeEnter.definition().class == EventClass::Scope);
        assert_eq!(BuiltinEvent::from_name("app#foo"), None);
    }
}
