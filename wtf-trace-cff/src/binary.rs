use crate::{
    format::{padded, padding, ChunkHeader, Endian, MagicHeader, PartEntry, CHUNK_HEADER_SIZE},
    ByteBuffer, Bytes, CffResult, Chunk, ChunkDecoder, ChunkErr, ChunkType, HeaderErr, Part,
    PartType, StreamTarget, WriteTransport,
};

/// Decodes the binary container.
#[derive(Debug, Default)]
pub struct BinaryDecoder {
    buffer: ByteBuffer,
    header: Option<(MagicHeader, Endian)>,
    ended: bool,
}

/// Writes chunks in the binary container. The magic header is written on construction.
#[derive(Debug)]
pub struct BinaryStreamTarget<W: WriteTransport> {
    transport: W,
}

impl BinaryDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn header(&self) -> Option<&MagicHeader> {
        self.header.as_ref().map(|(header, _)| header)
    }

    fn read_header(&mut self) -> CffResult<Option<Endian>> {
        if let Some((_, endian)) = self.header {
            return Ok(Some(endian));
        }
        let size = self.buffer.size();
        if size < MagicHeader::size() {
            if self.ended {
                return Err(if size == 0 {
                    HeaderErr::Missing
                } else {
                    HeaderErr::TooSmall(size)
                }
                .into());
            }
            return Ok(None);
        }
        let bytes = self
            .buffer
            .consume(MagicHeader::size())
            .unwrap_or(Bytes::Empty);
        let (header, endian) = MagicHeader::read_from(bytes.as_slice())?;
        log::debug!(
            "Binary trace: tool version {}, format version {}, {:?} endian",
            header.tool_version,
            header.format_version,
            endian
        );
        self.header = Some((header, endian));
        Ok(Some(endian))
    }
}

impl ChunkDecoder for BinaryDecoder {
    fn push(&mut self, bytes: Bytes) {
        self.buffer.append(bytes);
    }

    fn end(&mut self) {
        self.ended = true;
    }

    fn next_chunk(&mut self) -> CffResult<Option<Chunk>> {
        let endian = match self.read_header()? {
            Some(endian) => endian,
            None => return Ok(None),
        };
        let size = self.buffer.size();
        if size == 0 {
            return Ok(None);
        }
        let fixed = match self.buffer.peek(CHUNK_HEADER_SIZE) {
            Some(fixed) => fixed,
            None if self.ended => return Err(ChunkErr::HeaderTooSmall(size).into()),
            None => return Ok(None),
        };
        let (length, _) = ChunkHeader::peek_length(&fixed, endian)?;
        let total = if size >= padded(length) {
            padded(length)
        } else if self.ended && size >= length {
            // tolerate a missing trailing padding on the last chunk
            size
        } else if self.ended {
            return Err(ChunkErr::Incomplete {
                expected: length,
                actual: size,
            }
            .into());
        } else {
            return Ok(None);
        };
        let bytes = self.buffer.consume(total).unwrap_or(Bytes::Empty).bytes();
        decode_chunk(&bytes, endian).map(Some)
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Decodes one chunk from a buffer holding all of its bytes.
pub fn decode_chunk(bytes: &[u8], endian: Endian) -> CffResult<Chunk> {
    let header = ChunkHeader::read_from(bytes, endian)?;
    let chunk_type = ChunkType::from_u32(header.chunk_type)?;
    let payload = &bytes[header.size()..header.length as usize];
    let mut parts = Vec::with_capacity(header.parts.len());
    for entry in header.parts.iter() {
        let part_type = PartType::from_u32(entry.part_type)?;
        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        parts.push(Part::from_blob(part_type, &payload[start..end])?);
    }
    Ok(Chunk::load(header.id, chunk_type, parts)?.with_time_range(header.start_time, header.end_time))
}

/// Encodes one chunk, including its trailing padding.
pub fn encode_chunk(chunk: &Chunk) -> CffResult<Vec<u8>> {
    let mut entries = Vec::with_capacity(chunk.parts().len());
    let mut payload = Vec::new();
    for part in chunk.parts() {
        let blob = part.to_blob()?;
        entries.push(PartEntry {
            part_type: part.part_type().to_u32(),
            offset: payload.len() as u32,
            length: blob.len() as u32,
        });
        payload.extend_from_slice(&blob);
        payload.resize(padded(payload.len()), 0);
    }
    let header = ChunkHeader {
        id: chunk.id(),
        chunk_type: chunk.chunk_type().to_u32(),
        length: (ChunkHeader::size_of(entries.len()) + payload.len()) as u32,
        start_time: chunk.start_time(),
        end_time: chunk.end_time(),
        parts: entries,
    };
    let mut bytes = Vec::with_capacity(header.length as usize);
    header.write_to(&mut bytes);
    bytes.extend_from_slice(&payload);
    bytes.resize(bytes.len() + padding(bytes.len()), 0);
    Ok(bytes)
}

impl<W: WriteTransport> BinaryStreamTarget<W> {
    pub fn new(mut transport: W) -> CffResult<Self> {
        let mut bytes = Vec::with_capacity(MagicHeader::size());
        MagicHeader::new().write_to(&mut bytes);
        transport.write(Bytes::from(bytes))?;
        Ok(Self { transport })
    }
}

impl<W: WriteTransport> StreamTarget for BinaryStreamTarget<W> {
    type Transport = W;

    fn write_chunk(&mut self, chunk: &Chunk) -> CffResult<()> {
        let bytes = encode_chunk(chunk)?;
        self.transport.write(Bytes::from(bytes))
    }

    fn end(&mut self) -> CffResult<()> {
        self.transport.flush()
    }

    fn transport(&self) -> &W {
        &self.transport
    }

    fn into_transport(self) -> W {
        self.transport
    }
}
