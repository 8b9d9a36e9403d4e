use crate::{Database, DbErr, DbResult, ZoneId};
use serde_json::Value as JsonValue;
use std::{collections::HashMap, sync::Arc};
use wtf_trace_types::{
    parse_signature_arguments, Arguments, BufferReader, BuiltinEvent, EventClass, EventFlags,
    EventType, EventTypeDef, StringTable, Value, DEFINE_EVENT_WIRE_ID,
};

/// JSON event id standing for `wtf.scope#leave`.
pub const JSON_LEAVE_EVENT_ID: i64 = -1;

/// Decodes the event buffers of one source into a [`Database`].
///
/// Wire ids, zone ids, time range ids and flow ids are only meaningful within a
/// source, so each source owns a parser that remaps them as events arrive. The
/// state carries over from one buffer to the next.
///
/// Arguments are decoded with the layout the source declared, even when the
/// database already knows a type of the same name with another layout.
///
/// A buffer is applied as a whole: it is decoded first, and only reaches the
/// database once every record decoded. A failing buffer leaves both the database
/// and the parser untouched.
#[derive(Debug, Default)]
pub struct EventParser {
    time_delay: f64,
    state: ParseState,
    /// Database type of each source type, bound on first use.
    bound: HashMap<usize, Arc<EventType>>,
    zones: HashMap<ZoneKey, ZoneId>,
    time_ranges: HashMap<u32, u32>,
    flows: HashMap<u32, u32>,
    open_scopes: HashMap<ZoneId, usize>,
}

/// An event type as a source defined it.
#[derive(Debug)]
struct SourceType {
    key: usize,
    def: EventTypeDef,
    builtin: Option<BuiltinEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ZoneKey {
    name: String,
    zone_type: String,
    location: String,
}

/// Everything a buffer may change before it is committed.
#[derive(Debug, Clone)]
struct ParseState {
    wire_types: HashMap<u16, Arc<SourceType>>,
    json_ids: HashMap<i64, Arc<SourceType>>,
    json_names: HashMap<String, Arc<SourceType>>,
    zones: HashMap<u32, ZoneKey>,
    current_zone: Option<ZoneKey>,
    last_time: Option<f64>,
    out_of_order: usize,
    next_key: usize,
}

/// A decoded record, waiting for its buffer to finish decoding.
#[derive(Debug)]
enum Staged {
    Define(Arc<SourceType>),
    CreateZone(ZoneKey),
    Insert {
        zone: Option<ZoneKey>,
        event_type: Arc<SourceType>,
        time: f64,
        args: Option<Arguments>,
    },
}

impl SourceType {
    fn name(&self) -> &str {
        &self.def.name
    }

    /// The control event this type stands for, if declared built-in.
    fn control(&self) -> Option<BuiltinEvent> {
        self.builtin
            .filter(|_| self.def.flags.contains(EventFlags::BUILTIN))
    }
}

impl Default for ParseState {
    fn default() -> Self {
        let mut state = Self {
            wire_types: HashMap::new(),
            json_ids: HashMap::new(),
            json_names: HashMap::new(),
            zones: HashMap::new(),
            current_zone: None,
            last_time: None,
            out_of_order: 0,
            next_key: 0,
        };
        let define = state.source_type(BuiltinEvent::Define.definition());
        state.wire_types.insert(DEFINE_EVENT_WIRE_ID, define);
        state
    }
}

impl ParseState {
    fn source_type(&mut self, def: EventTypeDef) -> Arc<SourceType> {
        let key = self.next_key;
        self.next_key += 1;
        Arc::new(SourceType {
            key,
            builtin: BuiltinEvent::from_name(&def.name),
            def,
        })
    }

    fn define_wire_type(&mut self, define: &str, args: Option<&Arguments>) -> DbResult<Arc<SourceType>> {
        let wire_id = required_u32(define, args, "wireId")?;
        let wire_id = u16::try_from(wire_id)
            .map_err(|_| DbErr::invalid_event(define, format!("wire id {wire_id} out of range")))?;
        let class = required_u32(define, args, "eventClass")?;
        let class = EventClass::from_u32(class)
            .ok_or_else(|| DbErr::invalid_event(define, format!("unknown event class {class}")))?;
        let flags = EventFlags::from_bits(
            args.and_then(|a| a.get("flags"))
                .and_then(Value::as_u32)
                .unwrap_or_default(),
        );
        let name = optional_str(args, "name");
        if name.is_empty() {
            return Err(DbErr::invalid_event(define, "missing name"));
        }
        let vars = parse_signature_arguments(optional_str(args, "args"))?;
        let source_type = self.source_type(EventTypeDef::new(name, class, flags, vars));
        log::debug!("Wire id {wire_id} is `{}`", source_type.def.signature());
        self.wire_types.insert(wire_id, source_type.clone());
        Ok(source_type)
    }

    fn define_json_type(&mut self, entry: &JsonValue) -> DbResult<Arc<SourceType>> {
        let define = BuiltinEvent::Define.name();
        let signature = entry
            .get("signature")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| DbErr::invalid_event(define, "missing signature"))?;
        let class = match entry.get("class").and_then(JsonValue::as_str) {
            Some("instance") => EventClass::Instance,
            _ => EventClass::Scope,
        };
        let flags = entry
            .get("flags")
            .and_then(JsonValue::as_u64)
            .unwrap_or_default();
        let def = EventTypeDef::parse(signature, class, EventFlags::from_bits(flags as u32))?;
        let source_type = self.source_type(def);
        self.json_names
            .insert(source_type.name().to_owned(), source_type.clone());
        if let Some(id) = entry.get("event_id").and_then(JsonValue::as_i64) {
            self.json_ids.insert(id, source_type.clone());
        }
        Ok(source_type)
    }

    /// A JSON event names its type, or refers to it by the id given at definition.
    /// Names defined by the source come first, then the types of the database,
    /// then the built-in events.
    fn resolve_json_type(&mut self, db: &Database, reference: &JsonValue) -> DbResult<Arc<SourceType>> {
        if let Some(id) = reference.as_i64() {
            if let Some(source_type) = self.json_ids.get(&id) {
                return Ok(source_type.clone());
            }
            if id != JSON_LEAVE_EVENT_ID {
                return Err(DbErr::UndefinedEventType(format!("event id {id}")));
            }
            let leave = self.resolve_json_name(db, BuiltinEvent::ScopeLeave.name())?;
            self.json_ids.insert(id, leave.clone());
            return Ok(leave);
        }
        let name = reference
            .as_str()
            .ok_or_else(|| DbErr::UndefinedEventType(reference.to_string()))?;
        self.resolve_json_name(db, name)
    }

    fn resolve_json_name(&mut self, db: &Database, name: &str) -> DbResult<Arc<SourceType>> {
        if let Some(source_type) = self.json_names.get(name) {
            return Ok(source_type.clone());
        }
        let def = match db.get_event_type(name) {
            Some(event_type) => event_type.to_def(),
            None => match BuiltinEvent::from_name(name) {
                Some(builtin) => builtin.definition(),
                None => return Err(DbErr::UndefinedEventType(name.to_owned())),
            },
        };
        let source_type = self.source_type(def);
        self.json_names.insert(name.to_owned(), source_type.clone());
        Ok(source_type)
    }

    fn check_order(&mut self, time: f64, name: &str) {
        if let Some(last) = self.last_time {
            if time < last {
                self.out_of_order += 1;
                if self.out_of_order == 1 {
                    log::warn!(
                        "`{name}` at {time} precedes the previous event at {last} without a discontinuity"
                    );
                }
            }
        }
        self.last_time = Some(time);
    }
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Milliseconds added to every source time, aligning the source on the database.
    pub fn set_time_delay(&mut self, time_delay: f64) {
        self.time_delay = time_delay;
    }

    pub fn time_delay(&self) -> f64 {
        self.time_delay
    }

    /// Number of events whose time went backwards without a discontinuity.
    pub fn out_of_order_count(&self) -> usize {
        self.state.out_of_order
    }

    /// Decodes a binary event buffer: records of `u16` wire id, `u32` time in
    /// microseconds and the arguments of the type. Returns the number of events
    /// inserted.
    ///
    /// Records carry no length, so the first undecodable record fails the buffer.
    pub fn parse_binary(
        &mut self,
        db: &mut Database,
        data: &[u8],
        strings: Option<&StringTable>,
    ) -> DbResult<usize> {
        let mut state = self.state.clone();
        let mut staged = Vec::new();
        let mut reader = BufferReader::new(data).with_string_table(strings);
        while !reader.is_empty() {
            let wire_id = reader.read_u16()?;
            let time = reader.read_u32()?;
            let source_type = match state.wire_types.get(&wire_id) {
                Some(source_type) => source_type.clone(),
                None => return Err(DbErr::UndefinedEventType(format!("wire id {wire_id}"))),
            };
            let args = source_type.def.read_arguments(&mut reader)?;
            self.stage(&mut state, &mut staged, source_type, time as f64 / 1000.0, args)?;
        }
        self.state = state;
        let inserted = self.commit(db, staged);
        log::debug!("Parsed {} bytes, inserted {inserted} events", data.len());
        Ok(inserted)
    }

    /// Decodes the entries of a JSON event buffer. Returns the number of events inserted.
    ///
    /// Events are `{"event": name or id, "time": ms, "args": {..} or [..]}`. Types are
    /// defined by `{"type": "wtf.event#define", "signature": .., "class": ..,
    /// "flags": .., "event_id": ..}`. Built-in events may be referenced without a
    /// definition.
    pub fn parse_json(&mut self, db: &mut Database, entries: &[JsonValue]) -> DbResult<usize> {
        let mut state = self.state.clone();
        let mut staged = Vec::new();
        for entry in entries {
            match entry.get("event") {
                Some(reference) if !reference.is_null() => {
                    let source_type = state.resolve_json_type(db, reference)?;
                    let time = entry
                        .get("time")
                        .and_then(JsonValue::as_f64)
                        .ok_or_else(|| DbErr::invalid_event(source_type.name(), "missing time"))?;
                    let args = json_arguments(&source_type.def, entry.get("args"));
                    self.stage(&mut state, &mut staged, source_type, time, args)?;
                }
                _ => match entry.get("type").and_then(JsonValue::as_str) {
                    Some(name) if name == BuiltinEvent::Define.name() => {
                        staged.push(Staged::Define(state.define_json_type(entry)?));
                    }
                    Some(other) => log::debug!("Ignoring JSON entry of type `{other}`"),
                    None => log::debug!("Ignoring JSON entry without type"),
                },
            }
        }
        self.state = state;
        Ok(self.commit(db, staged))
    }

    /// Applies a decoded event to the buffer state: control events update the
    /// zones and types of the source, everything else is staged for the current zone.
    fn stage(
        &self,
        state: &mut ParseState,
        staged: &mut Vec<Staged>,
        source_type: Arc<SourceType>,
        time: f64,
        args: Option<Arguments>,
    ) -> DbResult<()> {
        let name = source_type.name();
        match source_type.control() {
            Some(BuiltinEvent::Define) => {
                staged.push(Staged::Define(state.define_wire_type(name, args.as_ref())?));
                return Ok(());
            }
            Some(BuiltinEvent::ZoneCreate) => {
                let args = args.as_ref();
                let zone_id = required_u32(name, args, "zoneId")?;
                let key = ZoneKey {
                    name: optional_str(args, "name").to_owned(),
                    zone_type: optional_str(args, "type").to_owned(),
                    location: optional_str(args, "location").to_owned(),
                };
                state.zones.insert(zone_id, key.clone());
                staged.push(Staged::CreateZone(key));
                return Ok(());
            }
            Some(BuiltinEvent::ZoneDelete) => {
                let zone_id = required_u32(name, args.as_ref(), "zoneId")?;
                if !state.zones.contains_key(&zone_id) {
                    log::warn!("Deleting unknown zone {zone_id}");
                }
                return Ok(());
            }
            Some(BuiltinEvent::ZoneSet) => {
                let zone_id = required_u32(name, args.as_ref(), "zoneId")?;
                state.current_zone = state.zones.get(&zone_id).cloned();
                if state.current_zone.is_none() {
                    log::warn!("Setting unknown zone {zone_id}, using the default zone");
                }
                return Ok(());
            }
            Some(BuiltinEvent::TimeRangeBegin) | Some(BuiltinEvent::TimeRangeEnd) => {
                required_u32(name, args.as_ref(), "id")?;
            }
            Some(BuiltinEvent::Discontinuity) => state.last_time = None,
            _ => (),
        }

        let time = (time + self.time_delay).max(0.0);
        state.check_order(time, name);
        staged.push(Staged::Insert {
            zone: state.current_zone.clone(),
            event_type: source_type,
            time,
            args,
        });
        Ok(())
    }

    /// Applies a fully decoded buffer to the database. Returns the number of events
    /// inserted.
    fn commit(&mut self, db: &mut Database, staged: Vec<Staged>) -> usize {
        let mut inserted = 0;
        for record in staged {
            match record {
                Staged::Define(source_type) => {
                    self.bind(db, &source_type);
                }
                Staged::CreateZone(key) => {
                    self.zone_id(db, Some(&key));
                }
                Staged::Insert {
                    zone,
                    event_type,
                    time,
                    mut args,
                } => {
                    let event_type = self.bind(db, &event_type);
                    let zone = self.zone_id(db, zone.as_ref());
                    self.remap_ids(db, &event_type, args.as_mut());
                    if event_type.builtin() == Some(BuiltinEvent::ScopeLeave) {
                        self.close_scopes(db, zone, &event_type, time, args.as_ref());
                    } else if event_type.is_scope() {
                        *self.open_scopes.entry(zone).or_default() += 1;
                    }
                    db.insert_event(zone, event_type, time, args);
                    inserted += 1;
                }
            }
        }
        inserted
    }

    /// The database type a source type lands as. The first definition of a name
    /// wins; later sources keep decoding with their own layout.
    fn bind(&mut self, db: &mut Database, source_type: &SourceType) -> Arc<EventType> {
        if let Some(event_type) = self.bound.get(&source_type.key) {
            return event_type.clone();
        }
        let event_type = db
            .event_type_table_mut()
            .define_type(source_type.def.clone());
        self.bound.insert(source_type.key, event_type.clone());
        event_type
    }

    fn zone_id(&mut self, db: &mut Database, key: Option<&ZoneKey>) -> ZoneId {
        let key = match key {
            Some(key) => key,
            None => return db.get_default_zone(),
        };
        if let Some(zone) = self.zones.get(key) {
            return *zone;
        }
        let zone = db.create_or_get_zone(&key.name, &key.zone_type, &key.location);
        self.zones.insert(key.clone(), zone);
        zone
    }

    /// Replaces the time range and flow ids of the source with database-wide ones.
    fn remap_ids(&mut self, db: &mut Database, event_type: &EventType, args: Option<&mut Arguments>) {
        let args = match args {
            Some(args) => args,
            None => return,
        };
        let id = args.get("id").and_then(Value::as_u32);
        match (event_type.builtin(), id) {
            (Some(BuiltinEvent::TimeRangeBegin), Some(id))
            | (Some(BuiltinEvent::TimeRangeEnd), Some(id)) => {
                let range = *self
                    .time_ranges
                    .entry(id)
                    .or_insert_with(|| db.allocate_time_range_id());
                args.set("id", range);
            }
            (Some(BuiltinEvent::FlowBranch), Some(id)) => {
                // a branch always starts a new flow, even under a reused id
                let flow = db.allocate_flow_id();
                if let Some(parent) = args
                    .get("parentId")
                    .and_then(Value::as_u32)
                    .filter(|parent| *parent != 0)
                {
                    let parent = self.flow_id(db, parent);
                    args.set("parentId", parent);
                }
                self.flows.insert(id, flow);
                args.set("id", flow);
            }
            (Some(BuiltinEvent::FlowExtend), Some(id))
            | (Some(BuiltinEvent::FlowTerminate), Some(id))
            | (Some(BuiltinEvent::FlowAppendData), Some(id)) => {
                let flow = self.flow_id(db, id);
                args.set("id", flow);
            }
            _ => (),
        }
    }

    fn flow_id(&mut self, db: &mut Database, id: u32) -> u32 {
        *self
            .flows
            .entry(id)
            .or_insert_with(|| db.allocate_flow_id())
    }

    /// Tracks the open scope count of the zone across a leave. A leave targeting
    /// `depth` first closes every scope opened deeper than that.
    ///
    /// Only leaves carrying a `depth` argument are balanced this way; the
    /// built-in `wtf.scope#leave` has none and closes exactly one scope.
    fn close_scopes(
        &mut self,
        db: &mut Database,
        zone: ZoneId,
        leave: &Arc<EventType>,
        time: f64,
        args: Option<&Arguments>,
    ) {
        let synthesize = db.options().synthesize_unbalanced_leaves;
        let open = self.open_scopes.entry(zone).or_default();
        if let Some(depth) = args
            .and_then(|a| a.get("depth"))
            .and_then(Value::as_u32)
            .filter(|_| synthesize)
        {
            let target = depth as usize + 1;
            if *open > target {
                log::debug!("Closing {} unbalanced scope(s) at {time}", *open - target);
            }
            while *open > target {
                db.insert_event(zone, leave.clone(), time, None);
                *open -= 1;
            }
        }
        *open = open.saturating_sub(1);
    }
}

fn required_u32(event: &str, args: Option<&Arguments>, name: &str) -> DbResult<u32> {
    args.and_then(|a| a.get(name))
        .and_then(Value::as_u32)
        .ok_or_else(|| DbErr::invalid_event(event, format!("missing `{name}`")))
}

fn optional_str<'a>(args: Option<&'a Arguments>, name: &str) -> &'a str {
    args.and_then(|a| a.get(name))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// Arguments of a JSON event. An array maps onto the declared arguments by
/// position, and only when the lengths agree.
fn json_arguments(def: &EventTypeDef, json: Option<&JsonValue>) -> Option<Arguments> {
    let args = match json? {
        JsonValue::Array(values) if !values.is_empty() && values.len() == def.args.len() => def
            .args
            .iter()
            .zip(values.iter())
            .map(|(var, value)| (var.name.clone(), Value::from_json(value.clone())))
            .collect(),
        object @ JsonValue::Object(_) => Arguments::from_json(object),
        _ => return None,
    };
    if args.is_empty() {
        None
    } else {
        Some(args)
    }
}
