use crate::{
    format::INVALID_TIME, Bytes, CffResult, Chunk, ChunkDecoder, ChunkErr, ChunkType,
    HeaderErr, Part, StreamTarget, WriteTransport,
};
use serde_json::{Map, Value as JsonValue};
use std::collections::VecDeque;
use wtf_trace_types::{FORMAT_VERSION, TOOL_VERSION};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum JsonMode {
    /// One document holding every chunk. Only valid once ended.
    #[default]
    Complete,
    /// A header object, then one `{"chunks": [..]}` object per line; any prefix of
    /// complete lines is a valid stream.
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonHeader {
    pub wtf_version: u32,
    pub format_version: u32,
}

/// Decodes the JSON container, in either mode. Values are parsed as soon as they
/// are complete, so a partial stream yields chunks line by line.
#[derive(Debug, Default)]
pub struct JsonDecoder {
    buffer: Vec<u8>,
    pending: VecDeque<Chunk>,
    header: Option<JsonHeader>,
    scanner: ValueScanner,
    ended: bool,
}

/// Finds where top level objects and arrays end, resuming where the last scan
/// stopped, so every byte is looked at once.
#[derive(Debug, Default)]
struct ValueScanner {
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

#[derive(Debug)]
pub struct JsonStreamTarget<W: WriteTransport> {
    transport: W,
    mode: JsonMode,
    written: usize,
    ended: bool,
}

pub fn chunk_to_json(chunk: &Chunk) -> JsonValue {
    let mut object = Map::new();
    object.insert("id".to_owned(), chunk.id().into());
    object.insert("type".to_owned(), chunk.chunk_type().name().into());
    if chunk.start_time() != INVALID_TIME {
        object.insert("startTime".to_owned(), chunk.start_time().into());
    }
    if chunk.end_time() != INVALID_TIME {
        object.insert("endTime".to_owned(), chunk.end_time().into());
    }
    object.insert(
        "parts".to_owned(),
        JsonValue::Array(chunk.parts().iter().map(Part::to_json).collect()),
    );
    JsonValue::Object(object)
}

pub fn chunk_from_json(value: &JsonValue) -> CffResult<Chunk> {
    let object = value
        .as_object()
        .ok_or_else(|| ChunkErr::InvalidPart("Expected chunk to be an object".to_owned()))?;
    let id = object
        .get("id")
        .and_then(JsonValue::as_u64)
        .ok_or(ChunkErr::MissingField("id"))?;
    let chunk_type = object
        .get("type")
        .and_then(JsonValue::as_str)
        .ok_or(ChunkErr::MissingField("type"))?;
    let chunk_type = ChunkType::from_name(chunk_type)?;
    let parts = object
        .get("parts")
        .and_then(JsonValue::as_array)
        .ok_or(ChunkErr::MissingField("parts"))?
        .iter()
        .map(Part::from_json)
        .collect::<CffResult<Vec<_>>>()?;
    let chunk = Chunk::load(id as u32, chunk_type, parts)?;
    let time = |key| object.get(key).and_then(JsonValue::as_u64).map(|t| t as u32);
    Ok(match (time("startTime"), time("endTime")) {
        (Some(start), Some(end)) => chunk.with_time_range(start, end),
        _ => chunk,
    })
}

impl ValueScanner {
    /// Offset just past the next complete top level value of `buffer`.
    fn next_boundary(&mut self, buffer: &[u8]) -> Option<usize> {
        while self.scanned < buffer.len() {
            let byte = buffer[self.scanned];
            self.scanned += 1;
            if self.in_string {
                match byte {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => (),
                }
                continue;
            }
            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Some(self.scanned);
                    }
                }
                _ => (),
            }
        }
        None
    }

    /// `len` bytes were removed from the front of the buffer.
    fn consumed(&mut self, len: usize) {
        self.scanned = self.scanned.saturating_sub(len);
    }
}

impl JsonDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn header(&self) -> Option<&JsonHeader> {
        self.header.as_ref()
    }

    fn handle_value(&mut self, value: JsonValue) -> CffResult<()> {
        let object = match value {
            JsonValue::Object(object) => object,
            _ => {
                return Err(ChunkErr::InvalidPart(
                    "Expected object at the root of the JSON object".to_owned(),
                )
                .into())
            }
        };
        if object.contains_key("wtfVersion") {
            if self.header.is_some() {
                return Err(HeaderErr::Duplicate.into());
            }
            let version = |key| {
                object
                    .get(key)
                    .and_then(JsonValue::as_u64)
                    .map(|v| v as u32)
                    .unwrap_or_default()
            };
            let header = JsonHeader {
                wtf_version: version("wtfVersion"),
                format_version: version("formatVersion"),
            };
            if header.wtf_version > TOOL_VERSION {
                return Err(HeaderErr::ToolVersion(header.wtf_version).into());
            }
            if header.format_version != FORMAT_VERSION {
                return Err(HeaderErr::Version(header.format_version).into());
            }
            log::debug!("JSON trace: tool version {}", header.wtf_version);
            self.header = Some(header);
        }
        if let Some(JsonValue::Array(chunks)) = object.get("chunks") {
            for chunk in chunks {
                self.pending.push_back(chunk_from_json(chunk)?);
            }
        }
        Ok(())
    }
}

impl ChunkDecoder for JsonDecoder {
    fn push(&mut self, bytes: Bytes) {
        self.buffer.extend_from_slice(bytes.as_slice());
    }

    fn end(&mut self) {
        self.ended = true;
    }

    fn next_chunk(&mut self) -> CffResult<Option<Chunk>> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Ok(Some(chunk));
            }
            let end = match self.scanner.next_boundary(&self.buffer) {
                Some(end) => end,
                // whatever is left surfaces as a parse error
                None if self.ended && self.buffer.iter().any(|b| !b.is_ascii_whitespace()) => {
                    self.buffer.len()
                }
                None => return Ok(None),
            };
            let value: Vec<u8> = self.buffer.drain(..end).collect();
            self.scanner.consumed(end);
            let value = serde_json::from_slice(&value)?;
            self.handle_value(value)?;
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.pending.clear();
        self.scanner = Default::default();
    }
}

impl<W: WriteTransport> JsonStreamTarget<W> {
    pub fn new(mut transport: W, mode: JsonMode) -> CffResult<Self> {
        let header = match mode {
            JsonMode::Complete => format!(
                "{{\n  \"wtfVersion\": {TOOL_VERSION},\n  \"formatVersion\": {FORMAT_VERSION},\n  \"chunks\": ["
            ),
            JsonMode::Partial => format!(
                "{{\n  \"wtfVersion\": {TOOL_VERSION},\n  \"formatVersion\": {FORMAT_VERSION}\n}}\n"
            ),
        };
        transport.write(Bytes::from(header))?;
        Ok(Self {
            transport,
            mode,
            written: 0,
            ended: false,
        })
    }

    pub fn mode(&self) -> JsonMode {
        self.mode
    }
}

impl<W: WriteTransport> StreamTarget for JsonStreamTarget<W> {
    type Transport = W;

    fn write_chunk(&mut self, chunk: &Chunk) -> CffResult<()> {
        let json = serde_json::to_string(&chunk_to_json(chunk))?;
        let text = match self.mode {
            JsonMode::Complete if self.written == 0 => format!("\n    {json}"),
            JsonMode::Complete => format!(",\n    {json}"),
            JsonMode::Partial => format!("{{\"chunks\": [{json}]}}\n"),
        };
        self.written += 1;
        self.transport.write(Bytes::from(text))
    }

    fn end(&mut self) -> CffResult<()> {
        if !self.ended && self.mode == JsonMode::Complete {
            self.transport.write(Bytes::from("\n  ]\n}".to_owned()))?;
        }
        self.ended = true;
        self.transport.flush()
    }

    fn transport(&self) -> &W {
        &self.transport
    }

    fn into_transport(self) -> W {
        self.transport
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{CffErr, FileHeaderPart, MemoryWriteTransport};
    use serde_json::json;

    fn chunks() -> Vec<Chunk> {
        vec![
            Chunk::file_header(1, FileHeaderPart::default()),
            Chunk::event_data(
                2,
                vec![Part::JsonEventBuffer(vec![
                    json!({ "event": "app#tick", "time": 1.5 }),
                ])],
            )
            .unwrap()
            .with_time_range(10, 20),
        ]
    }

    fn write(mode: JsonMode) -> String {
        let mut target = JsonStreamTarget::new(MemoryWriteTransport::new(), mode).unwrap();
        target.write_chunks(chunks().iter()).unwrap();
        target.end().unwrap();
        assert_eq!(target.transport().flushes(), 1);
        String::from_utf8(target.into_transport().into_data()).unwrap()
    }

    fn decode(text: &str) -> CffResult<Vec<Chunk>> {
        let mut decoder = JsonDecoder::new();
        decoder.push(Bytes::from(text.to_owned()));
        decoder.end();
        let mut chunks = Vec::new();
        while let Some(chunk) = decoder.next_chunk()? {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    #[test]
    fn test_complete_mode() {
        let text = write(JsonMode::Complete);
        assert!(text.starts_with("{\n  \"wtfVersion\": 1,\n  \"formatVersion\": 10,\n  \"chunks\": [\n    {"));
        assert!(text.ends_with("}\n  ]\n}"));
        let document: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(document["chunks"][1]["type"], "event_data");
        assert_eq!(document["chunks"][1]["startTime"], 10);
        assert!(document["chunks"][0].get("startTime").is_none());
        assert_eq!(decode(&text).unwrap(), chunks());
    }

    #[test]
    fn test_partial_mode() {
        let text = write(JsonMode::Partial);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[..4].join("\n"), "{\n  \"wtfVersion\": 1,\n  \"formatVersion\": 10\n}");
        assert!(lines[4].starts_with("{\"chunks\": [{"));
        assert_eq!(lines.len(), 6);

        // a complete line is decodable before the rest arrives
        let mut decoder = JsonDecoder::new();
        let first_chunk_end = text.find("]}\n").unwrap() + 3;
        decoder.push(Bytes::from(text[..first_chunk_end + 10].to_owned()));
        assert_eq!(decoder.next_chunk().unwrap().map(|c| c.id()), Some(1));
        assert!(decoder.next_chunk().unwrap().is_none());
        decoder.push(Bytes::from(text[first_chunk_end + 10..].to_owned()));
        assert_eq!(decoder.next_chunk().unwrap().map(|c| c.id()), Some(2));
        assert_eq!(decoder.header().unwrap().format_version, 10);
    }

    #[test]
    fn test_segmented_complete_document() {
        let events: Vec<JsonValue> = (0..2000)
            .map(|i| json!({ "event": "app#tick", "time": i, "args": { "s": "}]\\\"{[" } }))
            .collect();
        let chunks: Vec<Chunk> = (1..=20)
            .map(|i| {
                Chunk::event_data(i, vec![Part::JsonEventBuffer(events.clone())]).unwrap()
            })
            .collect();
        let mut target =
            JsonStreamTarget::new(MemoryWriteTransport::new(), JsonMode::Complete).unwrap();
        target.write_chunks(chunks.iter()).unwrap();
        target.end().unwrap();
        let data = target.into_transport().into_data();
        assert!(data.len() > 1_000_000);

        let mut decoder = JsonDecoder::new();
        let mut decoded = Vec::new();
        for segment in data.chunks(256) {
            decoder.push(Bytes::from(segment.to_vec()));
            while let Some(chunk) = decoder.next_chunk().unwrap() {
                decoded.push(chunk);
            }
            // nothing before the closing brace, and nothing rescanned
            assert!(decoded.is_empty() || decoder.buffer.is_empty());
            assert_eq!(decoder.scanner.scanned, decoder.buffer.len());
        }
        decoder.end();
        assert!(decoder.next_chunk().unwrap().is_none());
        assert_eq!(decoded, chunks);
    }

    #[test]
    fn test_invalid() {
        let header = "{\"wtfVersion\": 1, \"formatVersion\": 10}";
        assert!(matches!(
            decode(&format!("{header}\n{header}")),
            Err(CffErr::HeaderErr(HeaderErr::Duplicate))
        ));
        assert!(matches!(
            decode("{\"wtfVersion\": 1, \"formatVersion\": 3}"),
            Err(CffErr::HeaderErr(HeaderErr::Version(3)))
        ));
        assert!(matches!(
            decode("{\"chunks\": [{\"type\": \"event_data\", \"parts\": []}]}"),
            Err(CffErr::ChunkErr(ChunkErr::MissingField("id")))
        ));
        assert!(matches!(
            decode("{\"chunks\": [{\"id\": 1, \"type\": \"file_header\"}]}"),
            Err(CffErr::ChunkErr(ChunkErr::MissingField("parts")))
        ));
        assert!(matches!(
            decode("{\"chunks\": [{\"id\": 1, \"type\": \"bogus\", \"parts\": []}]}"),
            Err(CffErr::ChunkErr(ChunkErr::UnknownChunkTypeName(_)))
        ));
        assert!(matches!(decode("{\"chunks\": [{\"id\""), Err(CffErr::SerdeJson(_))));
        assert!(matches!(decode("[1]"), Err(CffErr::ChunkErr(_))));
    }
}
