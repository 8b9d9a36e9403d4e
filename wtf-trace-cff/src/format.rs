//! The binary container is a magic header followed by a stream of chunks.
//! Every chunk declares its own length, so a reader can reassemble it from
//! arbitrarily split deliveries before decoding any part.
//!
//! ```ignore
//! +-----------------~-----------------+
//! |            Magic header           |
//! +-----------------~-----------------+
//! |               Chunk               |
//! +-----------------~-----------------+
//! |               Chunk ...           |
//! +-----------------~-----------------+
//!
//! Magic header is:
//! +-------------+--------------+----------------+
//! | 0xDEADBEEF  | tool version | format version |
//! +-------------+--------------+----------------+
//!
//! Chunk is:
//! +----+------+--------+-------+-----+------------+---~---+----~----+-----~-----+
//! | id | type | length | start | end | part count | parts | payload | (padding) |
//! +----+------+--------+-------+-----+------------+---~---+----~----+-----~-----+
//!
//! Part entry is:
//! +-----------+--------+--------+
//! | part type | offset | length |
//! +-----------+--------+--------+
//! ```
//!
//! All fields are `u32`. `length` covers the chunk header and the payload. Part
//! offsets are relative to the start of the payload; every part payload is padded
//! to 4 bytes, and so is the chunk.
//!
//! Numbers are written little endian. A stream whose magic reads byte-swapped is
//! decoded big endian throughout.

use crate::{CffResult, ChunkErr, HeaderErr};
use wtf_trace_types::{FORMAT_VERSION, TOOL_VERSION};

pub const MAGIC: u32 = 0xDEADBEEF;
/// Sentinel for a chunk without a time range.
pub const INVALID_TIME: u32 = 0xFFFFFFFF;
pub const MAGIC_HEADER_SIZE: usize = 3 * 4;
/// Size of a chunk header with no part entries.
pub const CHUNK_HEADER_SIZE: usize = 6 * 4;
pub const PART_ENTRY_SIZE: usize = 3 * 4;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicHeader {
    pub tool_version: u32,
    pub format_version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: u32,
    pub chunk_type: u32,
    /// Header plus payload, excluding the trailing chunk padding.
    pub length: u32,
    pub start_time: u32,
    pub end_time: u32,
    pub parts: Vec<PartEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartEntry {
    pub part_type: u32,
    pub offset: u32,
    pub length: u32,
}

/// Number of zero bytes that align `len` to 4 bytes.
pub const fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

pub const fn padded(len: usize) -> usize {
    len + padding(len)
}

impl Endian {
    /// Panics if `bytes` is shorter than `offset + 4`; callers check sizes first.
    pub fn read_u32(&self, bytes: &[u8], offset: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[offset..offset + 4]);
        match self {
            Self::Little => u32::from_le_bytes(word),
            Self::Big => u32::from_be_bytes(word),
        }
    }

    pub fn write_u32(&self, out: &mut Vec<u8>, value: u32) {
        match self {
            Self::Little => out.extend_from_slice(&value.to_le_bytes()),
            Self::Big => out.extend_from_slice(&value.to_be_bytes()),
        }
    }
}

impl Default for MagicHeader {
    fn default() -> Self {
        Self {
            tool_version: TOOL_VERSION,
            format_version: FORMAT_VERSION,
        }
    }
}

impl MagicHeader {
    pub fn new() -> Self {
        Default::default()
    }

    /// Validates the magic header and detects the byte order of the stream.
    pub fn read_from(bytes: &[u8]) -> CffResult<(Self, Endian)> {
        if bytes.len() < MAGIC_HEADER_SIZE {
            return Err(HeaderErr::TooSmall(bytes.len()).into());
        }
        let endian = match Endian::Little.read_u32(bytes, 0) {
            MAGIC => Endian::Little,
            m if m.swap_bytes() == MAGIC => Endian::Big,
            m => return Err(HeaderErr::ByteMark(m).into()),
        };
        let tool_version = endian.read_u32(bytes, 4);
        if tool_version > TOOL_VERSION {
            return Err(HeaderErr::ToolVersion(tool_version).into());
        }
        let format_version = endian.read_u32(bytes, 8);
        if format_version != FORMAT_VERSION {
            return Err(HeaderErr::Version(format_version).into());
        }
        Ok((
            Self {
                tool_version,
                format_version,
            },
            endian,
        ))
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        let endian = Endian::Little;
        endian.write_u32(out, MAGIC);
        endian.write_u32(out, self.tool_version);
        endian.write_u32(out, self.format_version);
    }

    pub const fn size() -> usize {
        MAGIC_HEADER_SIZE
    }
}

impl ChunkHeader {
    /// Reads the fixed fields at the start of `bytes` and returns
    /// `(length, part_count)`, enough to know how many bytes the chunk spans.
    pub fn peek_length(bytes: &[u8], endian: Endian) -> CffResult<(usize, usize)> {
        if bytes.len() < CHUNK_HEADER_SIZE {
            return Err(ChunkErr::HeaderTooSmall(bytes.len()).into());
        }
        let length = endian.read_u32(bytes, 8) as usize;
        let part_count = endian.read_u32(bytes, 20) as usize;
        if length < Self::size_of(part_count) {
            return Err(ChunkErr::MissingPartLengths.into());
        }
        Ok((length, part_count))
    }

    /// Reads a header from a buffer holding the entire chunk.
    pub fn read_from(bytes: &[u8], endian: Endian) -> CffResult<Self> {
        let (length, part_count) = Self::peek_length(bytes, endian)?;
        if bytes.len() < length {
            return Err(ChunkErr::Incomplete {
                expected: length,
                actual: bytes.len(),
            }
            .into());
        }
        let payload_size = length - Self::size_of(part_count);
        let mut parts = Vec::with_capacity(part_count);
        for index in 0..part_count {
            let o = CHUNK_HEADER_SIZE + index * PART_ENTRY_SIZE;
            let entry = PartEntry {
                part_type: endian.read_u32(bytes, o),
                offset: endian.read_u32(bytes, o + 4),
                length: endian.read_u32(bytes, o + 8),
            };
            if entry.offset as usize + entry.length as usize > payload_size {
                return Err(ChunkErr::PartOutOfBounds { index }.into());
            }
            parts.push(entry);
        }
        Ok(Self {
            id: endian.read_u32(bytes, 0),
            chunk_type: endian.read_u32(bytes, 4),
            length: length as u32,
            start_time: endian.read_u32(bytes, 12),
            end_time: endian.read_u32(bytes, 16),
            parts,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        let endian = Endian::Little;
        endian.write_u32(out, self.id);
        endian.write_u32(out, self.chunk_type);
        endian.write_u32(out, self.length);
        endian.write_u32(out, self.start_time);
        endian.write_u32(out, self.end_time);
        endian.write_u32(out, self.parts.len() as u32);
        for part in self.parts.iter() {
            endian.write_u32(out, part.part_type);
            endian.write_u32(out, part.offset);
            endian.write_u32(out, part.length);
        }
    }

    /// Byte size of a header with `part_count` part entries.
    pub const fn size_of(part_count: usize) -> usize {
        CHUNK_HEADER_SIZE + part_count * PART_ENTRY_SIZE
    }

    pub fn size(&self) -> usize {
        Self::size_of(self.parts.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::CffErr;

    #[test]
    fn test_magic_header() {
        let mut bytes = Vec::new();
        MagicHeader::new().write_to(&mut bytes);
        assert_eq!(&bytes[..4], &[0xEF, 0xBE, 0xAD, 0xDE]);
        let (header, endian) = MagicHeader::read_from(&bytes).unwrap();
        assert_eq!(header.format_version, 10);
        assert_eq!(endian, Endian::Little);

        let swapped: Vec<u8> = bytes.chunks(4).flat_map(|w| w.iter().rev().copied()).collect();
        assert_eq!(MagicHeader::read_from(&swapped).unwrap().1, Endian::Big);

        assert!(matches!(
            MagicHeader::read_from(&bytes[..8]),
            Err(CffErr::HeaderErr(HeaderErr::TooSmall(8)))
        ));
        bytes[0] = 0;
        assert!(matches!(
            MagicHeader::read_from(&bytes),
            Err(CffErr::HeaderErr(HeaderErr::ByteMark(_)))
        ));
    }

    #[test]
    fn test_versions() {
        for (tool_version, format_version, ok) in [(1, 10, true), (2, 10, false), (1, 3, false)] {
            let mut bytes = Vec::new();
            MagicHeader {
                tool_version,
                format_version,
            }
            .write_to(&mut bytes);
            assert_eq!(MagicHeader::read_from(&bytes).is_ok(), ok);
        }
    }

    #[test]
    fn test_chunk_header() {
        let header = ChunkHeader {
            id: 3,
            chunk_type: 2,
            length: (ChunkHeader::size_of(1) + 8) as u32,
            start_time: INVALID_TIME,
            end_time: INVALID_TIME,
            parts: vec![PartEntry {
                part_type: 0x30000,
                offset: 0,
                length: 5,
            }],
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes);
        assert_eq!(bytes.len(), header.size());
        assert!(matches!(
            ChunkHeader::read_from(&bytes, Endian::Little),
            Err(CffErr::ChunkErr(ChunkErr::Incomplete { .. }))
        ));
        bytes.extend_from_slice(&[0; 8]);
        assert_eq!(ChunkHeader::read_from(&bytes, Endian::Little).unwrap(), header);
        assert_eq!(
            ChunkHeader::peek_length(&bytes, Endian::Little).unwrap(),
            (44, 1)
        );

        assert!(matches!(
            ChunkHeader::peek_length(&bytes[..20], Endian::Little),
            Err(CffErr::ChunkErr(ChunkErr::HeaderTooSmall(20)))
        ));
        assert_eq!(padding(5), 3);
        assert_eq!(padded(8), 8);
    }

    #[test]
    fn test_part_out_of_bounds() {
        let header = ChunkHeader {
            id: 1,
            chunk_type: 2,
            length: ChunkHeader::size_of(1) as u32 + 4,
            start_time: 0,
            end_time: 0,
            parts: vec![PartEntry {
                part_type: 0x30000,
                offset: 0,
                length: 8,
            }],
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes);
        bytes.extend_from_slice(&[0; 4]);
        assert!(matches!(
            ChunkHeader::read_from(&bytes, Endian::Little),
            Err(CffErr::ChunkErr(ChunkErr::PartOutOfBounds { index: 0 }))
        ));
    }
}
