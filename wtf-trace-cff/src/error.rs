use crate::PartType;
use std::str::Utf8Error;
use thiserror::Error;
use wtf_trace_types::CodecErr;

#[derive(Error, Debug)]
pub enum CffErr {
    #[error("IO Error: {0}")]
    IoError(#[source] std::io::Error),
    #[error("Utf8Error: {0}")]
    Utf8Error(#[source] Utf8Error),
    #[error("HeaderErr: {0}")]
    HeaderErr(#[source] HeaderErr),
    #[error("ChunkErr: {0}")]
    ChunkErr(#[source] ChunkErr),
    #[error("CodecErr: {0}")]
    CodecErr(#[from] CodecErr),
    #[error("serde_json::Error {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Base64 Error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Task Dead ({0})")]
    TaskDead(&'static str),
    #[error("Transport has been disposed")]
    Disposed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Problems with the magic header at the start of a stream.
pub enum HeaderErr {
    #[error("Header too small: {0} bytes")]
    TooSmall(usize),
    #[error("File magic bytes mismatch: {0:#010x}")]
    ByteMark(u32),
    #[error("Data is from a newer tool version ({0})")]
    ToolVersion(u32),
    #[error("Data version {0} not supported")]
    Version(u32),
    #[error("Stream contains more than one header")]
    Duplicate,
    #[error("Stream has no header")]
    Missing,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Problems with a single chunk or one of its parts.
pub enum ChunkErr {
    #[error("Chunk header too small: {0} bytes")]
    HeaderTooSmall(usize),
    #[error("Chunk header missing part lengths")]
    MissingPartLengths,
    #[error("Data does not contain the entire chunk: expected {expected} bytes, got {actual}")]
    Incomplete { expected: usize, actual: usize },
    #[error("Part {index} lies outside of the chunk")]
    PartOutOfBounds { index: usize },
    #[error("Unknown chunk type {0:#x}")]
    UnknownChunkType(u32),
    #[error("Unknown part type {0:#x}")]
    UnknownPartType(u32),
    #[error("Unknown chunk type `{0}`")]
    UnknownChunkTypeName(String),
    #[error("Unknown part type `{0}`")]
    UnknownPartTypeName(String),
    #[error("Missing required field `{0}`")]
    MissingField(&'static str),
    #[error("Missing required {0} part")]
    MissingPart(&'static str),
    #[error("Unexpected {0:?} part")]
    UnexpectedPart(PartType),
    #[error("Invalid part: {0}")]
    InvalidPart(String),
}

pub type CffResult<T> = Result<T, CffErr>;

impl From<HeaderErr> for CffErr {
    fn from(e: HeaderErr) -> Self {
        Self::HeaderErr(e)
    }
}

impl From<ChunkErr> for CffErr {
    fn from(e: ChunkErr) -> Self {
        Self::ChunkErr(e)
    }
}
