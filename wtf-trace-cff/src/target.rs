use crate::{CffResult, Chunk, WriteTransport};

/// Serializes chunks to a [`WriteTransport`] as soon as they are written.
///
/// Nothing is buffered beyond the chunk being written.
pub trait StreamTarget {
    type Transport: WriteTransport;

    fn write_chunk(&mut self, chunk: &Chunk) -> CffResult<()>;

    /// Completes the stream and flushes the transport. Chunks written afterwards
    /// produce an invalid stream.
    fn end(&mut self) -> CffResult<()>;

    fn transport(&self) -> &Self::Transport;

    fn into_transport(self) -> Self::Transport
    where
        Self: Sized;

    fn write_chunks<'a, I: IntoIterator<Item = &'a Chunk>>(&mut self, chunks: I) -> CffResult<()>
    where
        Self: Sized,
    {
        for chunk in chunks {
            self.write_chunk(chunk)?;
        }
        Ok(())
    }
}
