use crate::{format::INVALID_TIME, CffResult, ChunkErr, FileHeaderPart, Part, PartType};
use wtf_trace_types::StringTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkType {
    /// Exactly one per file, always first.
    FileHeader,
    /// The events of one recording window.
    EventData,
}

#[derive(Debug, Clone, PartialEq)]
/// A unit of the container: an id, a type, an optional time range and its parts.
///
/// Chunks are validated on construction and are not mutated afterwards.
pub struct Chunk {
    id: u32,
    chunk_type: ChunkType,
    start_time: u32,
    end_time: u32,
    parts: Vec<Part>,
}

/// Hands out chunk ids for one writer, starting from 1.
#[derive(Debug)]
pub struct ChunkIdAllocator {
    next: u32,
}

impl ChunkType {
    pub fn from_u32(value: u32) -> CffResult<Self> {
        match value {
            1 => Ok(Self::FileHeader),
            2 => Ok(Self::EventData),
            _ => Err(ChunkErr::UnknownChunkType(value).into()),
        }
    }

    pub fn to_u32(&self) -> u32 {
        match self {
            Self::FileHeader => 1,
            Self::EventData => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FileHeader => "file_header",
            Self::EventData => "event_data",
        }
    }

    pub fn from_name(name: &str) -> CffResult<Self> {
        match name {
            "file_header" => Ok(Self::FileHeader),
            "event_data" => Ok(Self::EventData),
            _ => Err(ChunkErr::UnknownChunkTypeName(name.to_owned()).into()),
        }
    }
}

impl Chunk {
    pub fn file_header(id: u32, header: FileHeaderPart) -> Self {
        Self {
            id,
            chunk_type: ChunkType::FileHeader,
            start_time: INVALID_TIME,
            end_time: INVALID_TIME,
            parts: vec![Part::FileHeader(header)],
        }
    }

    /// An event data chunk. `parts` must contain exactly one event buffer and may
    /// contain a string table and resources.
    pub fn event_data(id: u32, parts: Vec<Part>) -> CffResult<Self> {
        Self::load(id, ChunkType::EventData, parts)
    }

    /// Assembles a chunk read from a stream, checking that the parts fit its type.
    pub fn load(id: u32, chunk_type: ChunkType, parts: Vec<Part>) -> CffResult<Self> {
        match chunk_type {
            ChunkType::FileHeader => {
                let mut headers = 0;
                for part in parts.iter() {
                    match part.part_type() {
                        PartType::FileHeader => headers += 1,
                        other => return Err(ChunkErr::UnexpectedPart(other).into()),
                    }
                }
                if headers == 0 {
                    return Err(ChunkErr::MissingPart("file header").into());
                }
                if headers > 1 {
                    return Err(ChunkErr::UnexpectedPart(PartType::FileHeader).into());
                }
            }
            ChunkType::EventData => {
                let mut buffers = 0;
                for part in parts.iter() {
                    match part.part_type() {
                        PartType::FileHeader => {
                            return Err(ChunkErr::UnexpectedPart(PartType::FileHeader).into())
                        }
                        t if t.is_event_buffer() => {
                            buffers += 1;
                            if buffers > 1 {
                                return Err(ChunkErr::UnexpectedPart(t).into());
                            }
                        }
                        _ => (),
                    }
                }
                if buffers == 0 {
                    return Err(ChunkErr::MissingPart("event buffer").into());
                }
            }
        }
        Ok(Self {
            id,
            chunk_type,
            start_time: INVALID_TIME,
            end_time: INVALID_TIME,
            parts,
        })
    }

    pub fn with_time_range(mut self, start_time: u32, end_time: u32) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    /// [`INVALID_TIME`] when unknown.
    pub fn start_time(&self) -> u32 {
        self.start_time
    }

    /// [`INVALID_TIME`] when unknown.
    pub fn end_time(&self) -> u32 {
        self.end_time
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }

    pub fn file_header_part(&self) -> Option<&FileHeaderPart> {
        self.parts.iter().find_map(Part::as_file_header)
    }

    pub fn event_buffer(&self) -> Option<&Part> {
        self.parts.iter().find(|p| p.part_type().is_event_buffer())
    }

    pub fn string_table(&self) -> Option<&StringTable> {
        self.parts.iter().find_map(Part::as_string_table)
    }

    /// String and binary resources, in part order.
    pub fn resources(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(|p| {
            matches!(
                p.part_type(),
                PartType::StringResource | PartType::BinaryResource
            )
        })
    }

    pub fn get_resource(&self, index: usize) -> Option<&Part> {
        self.resources().nth(index)
    }
}

impl Default for ChunkIdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl ChunkIdAllocator {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::CffErr;

    #[test]
    fn test_event_data_validation() {
        let chunk = Chunk::event_data(
            2,
            vec![
                Part::StringTable(StringTable::new()),
                Part::BinaryEventBuffer(vec![]),
                Part::StringResource("a".to_owned()),
                Part::BinaryResource(vec![1]),
            ],
        )
        .unwrap();
        assert_eq!(chunk.chunk_type(), ChunkType::EventData);
        assert_eq!(chunk.start_time(), INVALID_TIME);
        assert!(chunk.string_table().is_some());
        assert_eq!(chunk.resources().count(), 2);
        assert_eq!(chunk.get_resource(1), Some(&Part::BinaryResource(vec![1])));

        assert!(matches!(
            Chunk::event_data(3, vec![Part::StringTable(StringTable::new())]),
            Err(CffErr::ChunkErr(ChunkErr::MissingPart(_)))
        ));
        assert!(matches!(
            Chunk::event_data(
                3,
                vec![
                    Part::BinaryEventBuffer(vec![]),
                    Part::FileHeader(Default::default())
                ]
            ),
            Err(CffErr::ChunkErr(ChunkErr::UnexpectedPart(PartType::FileHeader)))
        ));
        assert!(Chunk::event_data(
            3,
            vec![Part::BinaryEventBuffer(vec![]), Part::JsonEventBuffer(vec![])]
        )
        .is_err());
    }

    #[test]
    fn test_file_header_validation() {
        let chunk = Chunk::file_header(1, Default::default()).with_time_range(0, 10);
        assert_eq!(chunk.end_time(), 10);
        assert!(chunk.file_header_part().is_some());
        assert!(chunk.event_buffer().is_none());
        assert!(Chunk::load(1, ChunkType::FileHeader, vec![]).is_err());
        assert!(Chunk::load(
            1,
            ChunkType::FileHeader,
            vec![Part::StringResource(String::new())]
        )
        .is_err());
        assert!(ChunkType::from_u32(3).is_err());
        assert_eq!(ChunkType::from_name("event_data").unwrap(), ChunkType::EventData);
    }

    #[test]
    fn test_chunk_ids() {
        let mut ids = ChunkIdAllocator::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
    }
}
