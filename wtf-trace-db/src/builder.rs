use crate::{DbErr, DbResult};
use std::{collections::HashMap, sync::Arc};
use wtf_trace_cff::Part;
use wtf_trace_types::{
    Arguments, BufferWriter, BuiltinEvent, EventType, EventTypeDef, EventTypeTable, StringTable,
    DEFINE_EVENT_WIRE_ID,
};

/// Encodes events as a binary event buffer, the inverse of
/// [`crate::EventParser::parse_binary`].
///
/// Each type is announced with a `wtf.event#define` record the first time it is
/// defined. Built-in types are defined on first use.
#[derive(Debug)]
pub struct EventBufferBuilder {
    writer: BufferWriter,
    event_types: EventTypeTable,
    wire_ids: HashMap<u32, u16>,
    define: Arc<EventType>,
    next_wire_id: u16,
    count: usize,
}

impl Default for EventBufferBuilder {
    fn default() -> Self {
        Self::with_writer(BufferWriter::new())
    }
}

impl EventBufferBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strings are written once into a string table and referenced by ordinal.
    pub fn with_string_table() -> Self {
        Self::with_writer(BufferWriter::new().with_string_table())
    }

    fn with_writer(writer: BufferWriter) -> Self {
        let mut event_types = EventTypeTable::new();
        let define = event_types.define_type(BuiltinEvent::Define.definition());
        Self {
            writer,
            wire_ids: [(define.id(), DEFINE_EVENT_WIRE_ID)].into_iter().collect(),
            event_types,
            define,
            next_wire_id: DEFINE_EVENT_WIRE_ID + 1,
            count: 0,
        }
    }

    /// Number of records written, definitions included.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Defines a type, writing its definition record unless it was defined already.
    pub fn define(&mut self, def: EventTypeDef) -> DbResult<Arc<EventType>> {
        let event_type = self.event_types.define_type(def);
        if self.wire_ids.contains_key(&event_type.id()) {
            return Ok(event_type);
        }
        let wire_id = self.next_wire_id;
        self.next_wire_id = self
            .next_wire_id
            .checked_add(1)
            .ok_or_else(|| DbErr::invalid_event(event_type.name(), "out of wire ids"))?;
        let args_signature = event_type
            .args()
            .iter()
            .map(|var| var.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let args = Arguments::new()
            .with("wireId", wire_id as u32)
            .with("eventClass", event_type.class() as u32)
            .with("flags", event_type.flags().bits())
            .with("name", event_type.name())
            .with("args", args_signature);
        let define = self.define.clone();
        self.write_record(&define, DEFINE_EVENT_WIRE_ID, 0.0, &args)?;
        self.wire_ids.insert(event_type.id(), wire_id);
        Ok(event_type)
    }

    /// Appends an event at `time` milliseconds. The type must have been defined,
    /// unless it is a built-in.
    pub fn append(&mut self, name: &str, time: f64, args: &Arguments) -> DbResult<()> {
        let event_type = match self.event_types.get_by_name(name) {
            Some(event_type) => event_type.clone(),
            None => match BuiltinEvent::from_name(name) {
                Some(builtin) => self.define(builtin.definition())?,
                None => return Err(DbErr::UndefinedEventType(name.to_owned())),
            },
        };
        let wire_id = match self.wire_ids.get(&event_type.id()) {
            Some(wire_id) => *wire_id,
            None => return Err(DbErr::UndefinedEventType(name.to_owned())),
        };
        self.write_record(&event_type, wire_id, time, args)
    }

    fn write_record(
        &mut self,
        event_type: &EventType,
        wire_id: u16,
        time: f64,
        args: &Arguments,
    ) -> DbResult<()> {
        self.writer.write_u16(wire_id);
        self.writer.write_u32((time * 1000.0).round().max(0.0) as u32);
        event_type.write_arguments(&mut self.writer, args)?;
        self.count += 1;
        Ok(())
    }

    /// The encoded bytes and the string table, if one was requested.
    pub fn finish_buffer(self) -> (Vec<u8>, Option<StringTable>) {
        self.writer.finish()
    }

    /// The parts of an event data chunk: the string table, if any, then the buffer.
    pub fn finish(self) -> Vec<Part> {
        let (data, strings) = self.finish_buffer();
        let mut parts = Vec::with_capacity(2);
        if let Some(strings) = strings {
            parts.push(Part::StringTable(strings));
        }
        parts.push(Part::BinaryEventBuffer(data));
        parts
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Database, EventParser};
    use wtf_trace_types::{EventFlags, Value};

    #[test]
    fn test_string_table() -> DbResult<()> {
        let mut builder = EventBufferBuilder::with_string_table();
        builder.define(EventTypeDef::instance("app#say(ascii word)", EventFlags::empty())?)?;
        builder.define(EventTypeDef::instance("app#say(ascii word)", EventFlags::empty())?)?;
        for time in [1.0, 2.0, 3.0] {
            builder.append("app#say", time, &Arguments::new().with("word", "hello"))?;
        }
        assert_eq!(builder.len(), 4);
        assert!(matches!(
            builder.append("app#unknown", 4.0, &Arguments::new()),
            Err(DbErr::UndefinedEventType(_))
        ));
        let parts = builder.finish();
        assert_eq!(parts.len(), 2);
        let strings = parts[0].as_string_table();
        assert!(strings.map(|s| s.iter().any(|s| s == "hello")).unwrap_or_default());

        let mut db = Database::new();
        let mut parser = EventParser::new();
        let data = match &parts[1] {
            Part::BinaryEventBuffer(data) => data.as_slice(),
            _ => unreachable!(),
        };
        db.begin_inserting_events()?;
        assert_eq!(parser.parse_binary(&mut db, data, strings)?, 3);
        db.end_inserting_events()?;
        let it = db.zones()[0].event_list().get_event(2);
        assert_eq!(it.argument("word").and_then(Value::as_str), Some("hello"));
        assert_eq!(it.time(), 3.0);
        Ok(())
    }
}
