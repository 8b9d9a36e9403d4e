use crate::{
    BinaryDecoder, Bytes, CffErr, CffResult, Chunk, JsonDecoder, ReadTransport, TransportEvent,
};
use std::path::Path;

/// Reassembles complete chunks out of a byte stream.
///
/// Bytes are pushed as they arrive; a chunk is only decoded once all of its bytes
/// are available.
pub trait ChunkDecoder {
    fn push(&mut self, bytes: Bytes);

    /// No more bytes will be pushed. From now on a truncated tail is an error.
    fn end(&mut self);

    /// The next complete chunk, if any. Errors are not recoverable.
    fn next_chunk(&mut self) -> CffResult<Option<Chunk>>;

    /// Drops every buffered byte and pending chunk.
    fn clear(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    ChunkReceived(Chunk),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    /// `.wtf-trace`
    Binary,
    /// `.wtf-json`
    Json,
}

/// Reads chunks from a [`ReadTransport`].
///
/// Errors stop the source: the transport is disposed together with any partial
/// chunk, and every later call fails with [`CffErr::Disposed`].
#[derive(Debug)]
pub struct StreamSource<T: ReadTransport, D: ChunkDecoder> {
    transport: Option<T>,
    decoder: D,
    loaded: u64,
    total: Option<u64>,
    ended: bool,
}

pub type BinaryStreamSource<T> = StreamSource<T, BinaryDecoder>;
pub type JsonStreamSource<T> = StreamSource<T, JsonDecoder>;

#[derive(Debug)]
/// Decides between binary and JSON from the first bytes of the stream.
pub enum AnyDecoder {
    Undetected(Vec<u8>),
    Binary(BinaryDecoder),
    Json(JsonDecoder),
}

impl TraceFormat {
    /// Binary streams start with the magic number in either byte order; JSON
    /// streams with `{` after optional whitespace. Returns `None` if unsure.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => Some(Self::Json),
            Some(0xEF) | Some(0xDE) => Some(Self::Binary),
            _ => None,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        match path.as_ref().extension()?.to_str()? {
            "wtf-trace" => Some(Self::Binary),
            "wtf-json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn decoder(&self) -> AnyDecoder {
        match self {
            Self::Binary => AnyDecoder::Binary(BinaryDecoder::new()),
            Self::Json => AnyDecoder::Json(JsonDecoder::new()),
        }
    }
}

impl<T: ReadTransport, D: ChunkDecoder + Default> StreamSource<T, D> {
    pub fn new(transport: T) -> Self {
        Self::with_decoder(transport, D::default())
    }
}

impl<T: ReadTransport, D: ChunkDecoder> StreamSource<T, D> {
    pub fn with_decoder(transport: T, decoder: D) -> Self {
        Self {
            transport: Some(transport),
            decoder,
            loaded: 0,
            total: None,
            ended: false,
        }
    }

    /// The next chunk, or [`SourceEvent::End`] once the transport has ended and
    /// every complete chunk has been delivered.
    pub async fn next(&mut self) -> CffResult<SourceEvent> {
        loop {
            if self.transport.is_none() {
                return Err(CffErr::Disposed);
            }
            match self.decoder.next_chunk() {
                Ok(Some(chunk)) => {
                    log::debug!("Chunk {} received ({:?})", chunk.id(), chunk.chunk_type());
                    return Ok(SourceEvent::ChunkReceived(chunk));
                }
                Ok(None) => (),
                Err(e) => return Err(self.fail(e)),
            }
            if self.ended {
                return Ok(SourceEvent::End);
            }
            let event = match self.transport.as_mut() {
                Some(transport) => transport.receive().await,
                None => return Err(CffErr::Disposed),
            };
            match event {
                Ok(TransportEvent::Progress { loaded, total }) => {
                    self.loaded = loaded;
                    self.total = total;
                }
                Ok(TransportEvent::Data(bytes)) => self.decoder.push(bytes),
                Ok(TransportEvent::End) => {
                    self.decoder.end();
                    self.ended = true;
                }
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    /// Like [`StreamSource::next`], with the end of stream as `None`.
    pub async fn next_chunk(&mut self) -> CffResult<Option<Chunk>> {
        match self.next().await? {
            SourceEvent::ChunkReceived(chunk) => Ok(Some(chunk)),
            SourceEvent::End => Ok(None),
        }
    }

    /// Reads the stream to the end.
    pub async fn read_all(&mut self) -> CffResult<Vec<Chunk>> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    /// Bytes loaded so far, out of the total if the transport knows it.
    pub fn progress(&self) -> (u64, Option<u64>) {
        (self.loaded, self.total)
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_disposed(&self) -> bool {
        self.transport.is_none()
    }

    /// Stops the source and releases any partial chunk.
    pub fn dispose(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.dispose();
        }
        self.decoder.clear();
    }

    fn fail(&mut self, e: CffErr) -> CffErr {
        log::debug!("Stream source failed: {e}");
        self.dispose();
        e
    }
}

impl Default for AnyDecoder {
    fn default() -> Self {
        Self::Undetected(Vec::new())
    }
}

impl AnyDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn format(&self) -> Option<TraceFormat> {
        match self {
            Self::Undetected(_) => None,
            Self::Binary(_) => Some(TraceFormat::Binary),
            Self::Json(_) => Some(TraceFormat::Json),
        }
    }

    fn detect(&mut self, ended: bool) {
        if let Self::Undetected(bytes) = self {
            let format = match TraceFormat::detect(bytes) {
                Some(format) => format,
                // leave binary to report the bad magic
                None if ended || bytes.len() >= 4 => TraceFormat::Binary,
                None => return,
            };
            let bytes = std::mem::take(bytes);
            let mut decoder = format.decoder();
            decoder.push(Bytes::from(bytes));
            *self = decoder;
        }
    }
}

impl ChunkDecoder for AnyDecoder {
    fn push(&mut self, bytes: Bytes) {
        match self {
            Self::Undetected(buffer) => {
                buffer.extend_from_slice(bytes.as_slice());
                self.detect(false);
            }
            Self::Binary(decoder) => decoder.push(bytes),
            Self::Json(decoder) => decoder.push(bytes),
        }
    }

    fn end(&mut self) {
        self.detect(true);
        match self {
            Self::Undetected(_) => (),
            Self::Binary(decoder) => decoder.end(),
            Self::Json(decoder) => decoder.end(),
        }
    }

    fn next_chunk(&mut self) -> CffResult<Option<Chunk>> {
        match self {
            Self::Undetected(_) => Ok(None),
            Self::Binary(decoder) => decoder.next_chunk(),
            Self::Json(decoder) => decoder.next_chunk(),
        }
    }

    fn clear(&mut self) {
        match self {
            Self::Undetected(bytes) => bytes.clear(),
            Self::Binary(decoder) => decoder.clear(),
            Self::Json(decoder) => decoder.clear(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(TraceFormat::detect(b"\n  {\"wtfVersion\""), Some(TraceFormat::Json));
        assert_eq!(TraceFormat::detect(&[0xEF, 0xBE]), Some(TraceFormat::Binary));
        assert_eq!(TraceFormat::detect(&[0xDE, 0xAD]), Some(TraceFormat::Binary));
        assert_eq!(TraceFormat::detect(b"  "), None);
        assert_eq!(
            TraceFormat::from_path("traces/page.wtf-trace"),
            Some(TraceFormat::Binary)
        );
        assert_eq!(TraceFormat::from_path("page.wtf-json"), Some(TraceFormat::Json));
        assert_eq!(TraceFormat::from_path("page.json"), None);
    }

    #[test]
    fn test_any_decoder() {
        let mut decoder = AnyDecoder::new();
        decoder.push(Bytes::from(&b" "[..]));
        assert_eq!(decoder.format(), None);
        decoder.push(Bytes::from(&b"{\"wtfVersion\": 1, \"formatVersion\": 10}"[..]));
        assert_eq!(decoder.format(), Some(TraceFormat::Json));
        decoder.end();
        assert!(decoder.next_chunk().unwrap().is_none());

        let mut decoder = AnyDecoder::new();
        decoder.push(Bytes::from(&b"junk"[..]));
        assert_eq!(decoder.format(), Some(TraceFormat::Binary));
        decoder.end();
        assert!(decoder.next_chunk().is_err());
    }
}
