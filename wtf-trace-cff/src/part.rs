use crate::{CffErr, CffResult, ChunkErr};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};
use wtf_trace_types::{ContextInfo, FileFlags, StringTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartType {
    FileHeader,
    JsonEventBuffer,
    LegacyEventBuffer,
    BinaryEventBuffer,
    StringTable,
    BinaryResource,
    StringResource,
}

#[derive(Debug, Clone, PartialEq)]
/// A typed payload of a chunk. Every part has a blob form (for the binary
/// container) and a JSON form (for the JSON container).
pub enum Part {
    FileHeader(FileHeaderPart),
    /// Event records as JSON objects.
    JsonEventBuffer(Vec<JsonValue>),
    /// Event records in the binary encoding of the old whole-file format.
    LegacyEventBuffer(Vec<u8>),
    /// Event records in the binary encoding.
    BinaryEventBuffer(Vec<u8>),
    StringTable(StringTable),
    BinaryResource(Vec<u8>),
    StringResource(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileHeaderPart {
    pub flags: FileFlags,
    /// Wall-clock anchor of the trace, in milliseconds.
    pub timebase: f64,
    pub context_info: ContextInfo,
    pub metadata: Map<String, JsonValue>,
}

const BASE64: &str = "base64";

impl PartType {
    pub fn from_u32(value: u32) -> CffResult<Self> {
        Ok(match value {
            0x10000 => Self::FileHeader,
            0x20000 => Self::JsonEventBuffer,
            0x20001 => Self::LegacyEventBuffer,
            0x20002 => Self::BinaryEventBuffer,
            0x30000 => Self::StringTable,
            0x40000 => Self::BinaryResource,
            0x40001 => Self::StringResource,
            _ => return Err(ChunkErr::UnknownPartType(value).into()),
        })
    }

    pub fn to_u32(&self) -> u32 {
        match self {
            Self::FileHeader => 0x10000,
            Self::JsonEventBuffer => 0x20000,
            Self::LegacyEventBuffer => 0x20001,
            Self::BinaryEventBuffer => 0x20002,
            Self::StringTable => 0x30000,
            Self::BinaryResource => 0x40000,
            Self::StringResource => 0x40001,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FileHeader => "file_header",
            Self::JsonEventBuffer => "json_event_buffer",
            Self::LegacyEventBuffer => "legacy_event_buffer",
            Self::BinaryEventBuffer => "binary_event_buffer",
            Self::StringTable => "string_table",
            Self::BinaryResource => "binary_resource",
            Self::StringResource => "string_resource",
        }
    }

    pub fn from_name(name: &str) -> CffResult<Self> {
        Ok(match name {
            "file_header" => Self::FileHeader,
            "json_event_buffer" => Self::JsonEventBuffer,
            "legacy_event_buffer" => Self::LegacyEventBuffer,
            "binary_event_buffer" => Self::BinaryEventBuffer,
            "string_table" => Self::StringTable,
            "binary_resource" => Self::BinaryResource,
            "string_resource" => Self::StringResource,
            _ => return Err(ChunkErr::UnknownPartTypeName(name.to_owned()).into()),
        })
    }

    pub fn is_event_buffer(&self) -> bool {
        matches!(
            self,
            Self::JsonEventBuffer | Self::LegacyEventBuffer | Self::BinaryEventBuffer
        )
    }
}

impl Default for FileHeaderPart {
    fn default() -> Self {
        Self {
            flags: FileFlags::empty(),
            timebase: 0.0,
            context_info: ContextInfo::default(),
            metadata: Map::new(),
        }
    }
}

impl FileHeaderPart {
    pub fn new(flags: FileFlags, timebase: f64, context_info: ContextInfo) -> Self {
        Self {
            flags,
            timebase,
            context_info,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, JsonValue>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "type": PartType::FileHeader.name(),
            "flags": self.flags.to_strings(),
            "timebase": self.timebase,
            "contextInfo": self.context_info,
            "metadata": self.metadata,
        })
    }

    pub fn from_json(value: &JsonValue) -> CffResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| invalid("File header expected to be a JSON object"))?;
        let flags = match object.get("flags") {
            None | Some(JsonValue::Null) => FileFlags::empty(),
            Some(JsonValue::Array(names)) => {
                let names = names
                    .iter()
                    .map(|n| n.as_str())
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| invalid("File header flags must be an array of strings"))?;
                FileFlags::from_strings(names)
            }
            Some(_) => return Err(invalid("File header flags must be an array of strings")),
        };
        let timebase = object
            .get("timebase")
            .ok_or(ChunkErr::MissingField("timebase"))?
            .as_f64()
            .ok_or_else(|| invalid("File header timebase must be a number"))?;
        let context_info = match object.get("contextInfo") {
            None | Some(JsonValue::Null) => ContextInfo::default(),
            Some(info @ JsonValue::Object(_)) => ContextInfo::deserialize(info)?,
            Some(_) => return Err(invalid("File header context info must be an object")),
        };
        let metadata = match object.get("metadata") {
            None | Some(JsonValue::Null) => Map::new(),
            Some(JsonValue::Object(map)) => map.clone(),
            Some(_) => return Err(invalid("File header metadata must be an object")),
        };
        Ok(Self {
            flags,
            timebase,
            context_info,
            metadata,
        })
    }
}

impl Part {
    pub fn part_type(&self) -> PartType {
        match self {
            Self::FileHeader(_) => PartType::FileHeader,
            Self::JsonEventBuffer(_) => PartType::JsonEventBuffer,
            Self::LegacyEventBuffer(_) => PartType::LegacyEventBuffer,
            Self::BinaryEventBuffer(_) => PartType::BinaryEventBuffer,
            Self::StringTable(_) => PartType::StringTable,
            Self::BinaryResource(_) => PartType::BinaryResource,
            Self::StringResource(_) => PartType::StringResource,
        }
    }

    /// Serializes the payload for the binary container.
    pub fn to_blob(&self) -> CffResult<Vec<u8>> {
        Ok(match self {
            Self::FileHeader(header) => serde_json::to_vec(&header.to_json())?,
            Self::JsonEventBuffer(events) => serde_json::to_vec(events)?,
            Self::LegacyEventBuffer(bytes)
            | Self::BinaryEventBuffer(bytes)
            | Self::BinaryResource(bytes) => bytes.clone(),
            Self::StringTable(table) => table.serialize().into_bytes(),
            Self::StringResource(string) => string.as_bytes().to_vec(),
        })
    }

    pub fn from_blob(part_type: PartType, data: &[u8]) -> CffResult<Self> {
        Ok(match part_type {
            PartType::FileHeader => {
                let text = utf8(data)?;
                let json: JsonValue = if text.is_empty() {
                    JsonValue::Object(Map::new())
                } else {
                    serde_json::from_str(text)?
                };
                Self::FileHeader(FileHeaderPart::from_json(&json)?)
            }
            PartType::JsonEventBuffer => {
                let text = utf8(data)?;
                if text.is_empty() {
                    return Ok(Self::JsonEventBuffer(Vec::new()));
                }
                match serde_json::from_str(text)? {
                    JsonValue::Array(events) => Self::JsonEventBuffer(events),
                    JsonValue::Null => Self::JsonEventBuffer(Vec::new()),
                    _ => return Err(invalid("Unable to parse event buffer JSON")),
                }
            }
            PartType::LegacyEventBuffer => Self::LegacyEventBuffer(data.to_vec()),
            PartType::BinaryEventBuffer => Self::BinaryEventBuffer(data.to_vec()),
            PartType::StringTable => Self::StringTable(StringTable::deserialize(utf8(data)?)),
            PartType::BinaryResource => Self::BinaryResource(data.to_vec()),
            PartType::StringResource => Self::StringResource(utf8(data)?.to_owned()),
        })
    }

    /// Serializes the part as a JSON object tagged with its type name.
    pub fn to_json(&self) -> JsonValue {
        let name = self.part_type().name();
        match self {
            Self::FileHeader(header) => header.to_json(),
            Self::JsonEventBuffer(events) => json!({ "type": name, "events": events }),
            Self::LegacyEventBuffer(bytes)
            | Self::BinaryEventBuffer(bytes)
            | Self::BinaryResource(bytes) => json!({
                "type": name,
                "mode": BASE64,
                "byteLength": bytes.len(),
                "value": STANDARD.encode(bytes),
            }),
            Self::StringTable(table) => json!({ "type": name, "value": table.serialize() }),
            Self::StringResource(string) => json!({ "type": name, "value": string }),
        }
    }

    pub fn from_json(value: &JsonValue) -> CffResult<Self> {
        let name = value
            .get("type")
            .and_then(JsonValue::as_str)
            .ok_or(ChunkErr::MissingField("type"))?;
        Ok(match PartType::from_name(name)? {
            PartType::FileHeader => Self::FileHeader(FileHeaderPart::from_json(value)?),
            PartType::JsonEventBuffer => match value.get("events") {
                None | Some(JsonValue::Null) => Self::JsonEventBuffer(Vec::new()),
                Some(JsonValue::Array(events)) => Self::JsonEventBuffer(events.clone()),
                Some(_) => return Err(invalid("Event buffer events must be an array")),
            },
            PartType::LegacyEventBuffer => Self::LegacyEventBuffer(decode_base64(value)?),
            PartType::BinaryEventBuffer => Self::BinaryEventBuffer(decode_base64(value)?),
            PartType::BinaryResource => Self::BinaryResource(decode_base64(value)?),
            PartType::StringTable => Self::StringTable(StringTable::deserialize(string_value(value)?)),
            PartType::StringResource => Self::StringResource(string_value(value)?.to_owned()),
        })
    }

    pub fn as_file_header(&self) -> Option<&FileHeaderPart> {
        match self {
            Self::FileHeader(header) => Some(header),
            _ => None,
        }
    }

    pub fn as_string_table(&self) -> Option<&StringTable> {
        match self {
            Self::StringTable(table) => Some(table),
            _ => None,
        }
    }
}

impl From<FileHeaderPart> for Part {
    fn from(header: FileHeaderPart) -> Self {
        Self::FileHeader(header)
    }
}

fn invalid(reason: &str) -> CffErr {
    ChunkErr::InvalidPart(reason.to_owned()).into()
}

fn utf8(data: &[u8]) -> CffResult<&str> {
    std::str::from_utf8(data).map_err(CffErr::Utf8Error)
}

fn string_value(value: &JsonValue) -> CffResult<&str> {
    value
        .get("value")
        .ok_or(ChunkErr::MissingField("value"))?
        .as_str()
        .ok_or_else(|| invalid("Part value must be a string"))
}

fn decode_base64(value: &JsonValue) -> CffResult<Vec<u8>> {
    match value.get("mode").and_then(JsonValue::as_str) {
        Some(BASE64) => (),
        _ => return Err(invalid("Binary parts must be base64 encoded")),
    }
    let bytes = STANDARD.decode(string_value(value)?)?;
    if let Some(length) = value.get("byteLength").and_then(JsonValue::as_u64) {
        if length as usize != bytes.len() {
            return Err(invalid("Binary part length mismatch"));
        }
    }
    Ok(bytes)
}
