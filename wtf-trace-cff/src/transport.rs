use crate::{Bytes, CffErr, CffResult};
use std::future::{ready, Future, Ready};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// `loaded` bytes delivered so far, out of `total` if known.
    Progress { loaded: u64, total: Option<u64> },
    Data(Bytes),
    End,
}

/// Where a stream source gets its bytes from.
pub trait ReadTransport {
    type Future<'a>: Future<Output = CffResult<TransportEvent>>
    where
        Self: 'a;

    /// Receive the next event. After [`TransportEvent::End`] every call yields `End`.
    fn receive(&mut self) -> Self::Future<'_>;

    /// Stop delivering. Every later `receive` fails with [`CffErr::Disposed`].
    fn dispose(&mut self);
}

/// Where a stream target puts its bytes.
pub trait WriteTransport {
    /// This should never block.
    fn write(&mut self, bytes: Bytes) -> CffResult<()>;

    /// Ask for everything written so far to be committed. This should never block.
    fn flush(&mut self) -> CffResult<()>;
}

#[derive(Debug)]
/// Delivers an in-memory buffer, optionally split into segments of a fixed size.
pub struct MemoryReadTransport {
    data: Vec<u8>,
    pos: usize,
    segment_size: Option<usize>,
    started: bool,
    disposed: bool,
}

#[derive(Debug, Default)]
/// Collects everything written into memory.
pub struct MemoryWriteTransport {
    data: Vec<u8>,
    flushes: usize,
}

impl MemoryReadTransport {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            segment_size: None,
            started: false,
            disposed: false,
        }
    }

    /// Deliver at most `size` bytes per [`TransportEvent::Data`].
    pub fn with_segment_size(mut self, size: usize) -> Self {
        self.segment_size = Some(size.max(1));
        self
    }

    fn next_event(&mut self) -> CffResult<TransportEvent> {
        if self.disposed {
            return Err(CffErr::Disposed);
        }
        if !self.started {
            self.started = true;
            return Ok(TransportEvent::Progress {
                loaded: 0,
                total: Some(self.data.len() as u64),
            });
        }
        if self.pos >= self.data.len() {
            return Ok(TransportEvent::End);
        }
        let end = match self.segment_size {
            Some(size) => (self.pos + size).min(self.data.len()),
            None => self.data.len(),
        };
        let bytes = Bytes::from(&self.data[self.pos..end]);
        self.pos = end;
        Ok(TransportEvent::Data(bytes))
    }
}

impl ReadTransport for MemoryReadTransport {
    type Future<'a> = Ready<CffResult<TransportEvent>>;

    fn receive(&mut self) -> Self::Future<'_> {
        ready(self.next_event())
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.data = Vec::new();
    }
}

impl MemoryWriteTransport {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Number of times `flush` has been called.
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl WriteTransport for MemoryWriteTransport {
    fn write(&mut self, bytes: Bytes) -> CffResult<()> {
        self.data.extend_from_slice(bytes.as_slice());
        Ok(())
    }

    fn flush(&mut self) -> CffResult<()> {
        self.flushes += 1;
        Ok(())
    }
}

impl<T: WriteTransport + ?Sized> WriteTransport for Box<T> {
    fn write(&mut self, bytes: Bytes) -> CffResult<()> {
        (**self).write(bytes)
    }

    fn flush(&mut self) -> CffResult<()> {
        (**self).flush()
    }
}
