use std::{cmp::Ordering, collections::VecDeque};

/// A queue of byte segments as they arrived from a transport.
///
/// Chunks are reassembled from here: a reader peeks at a header, and only
/// consumes once the declared number of bytes is available.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    buf: VecDeque<Bytes>,
    size: usize,
}

#[derive(Clone, PartialEq, Eq)]
pub enum Bytes {
    Empty,
    Byte(u8),
    Word([u8; 4]),
    Bytes(Vec<u8>),
}

impl std::fmt::Debug for Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Byte(b) => write!(f, "Byte({b})"),
            Self::Word(w) => write!(f, "Word({w:?})"),
            Self::Bytes(b) => write!(f, "Bytes(len = {})", b.len()),
        }
    }
}

impl ByteBuffer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn append(&mut self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        self.size += bytes.len();
        self.buf.push_back(bytes);
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Copies the first `size` bytes without consuming them.
    /// Returns `None` if fewer bytes are buffered.
    pub fn peek(&self, size: usize) -> Option<Vec<u8>> {
        if size > self.size {
            return None;
        }
        let mut out = Vec::with_capacity(size);
        for bytes in self.buf.iter() {
            let need = size - out.len();
            if need == 0 {
                break;
            }
            let slice = bytes.as_slice();
            out.extend_from_slice(&slice[..need.min(slice.len())]);
        }
        Some(out)
    }

    /// Removes the first `size` bytes. Returns `None`, leaving the buffer intact,
    /// if fewer bytes are buffered.
    pub fn consume(&mut self, size: usize) -> Option<Bytes> {
        if size > self.size {
            return None;
        }
        let mut buffer = Bytes::Empty;
        let mut remaining = size;
        while remaining > 0 {
            let front = self.buf.front_mut()?;
            match front.len().cmp(&remaining) {
                Ordering::Less | Ordering::Equal => {
                    let bytes = self.buf.pop_front()?;
                    remaining -= bytes.len();
                    buffer.append(bytes);
                }
                Ordering::Greater => {
                    buffer.append(front.pop(remaining));
                    remaining = 0;
                }
            }
        }
        self.size -= size;
        Some(buffer)
    }

    /// Drains everything that is buffered.
    pub fn consume_all(&mut self) -> Bytes {
        let size = self.size;
        self.consume(size).unwrap_or(Bytes::Empty)
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.size = 0;
    }
}

impl Bytes {
    pub fn len(&self) -> usize {
        match self {
            Bytes::Empty => 0,
            Bytes::Byte(_) => 1,
            Bytes::Word(_) => 4,
            Bytes::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            Bytes::Empty => &[],
            Bytes::Byte(b) => std::slice::from_ref(b),
            Bytes::Word(w) => w,
            Bytes::Bytes(bytes) => bytes,
        }
    }

    /// Splits off and returns the first `size` bytes. `size` is clamped to the length.
    pub fn pop(&mut self, size: usize) -> Self {
        let size = size.min(self.len());
        if size == 0 {
            return Self::Empty;
        }
        if size == self.len() {
            return self.take();
        }
        match self.take() {
            Bytes::Word(word) => {
                *self = Self::Bytes(word[size..].to_vec());
                if size == 1 {
                    Self::Byte(word[0])
                } else {
                    Self::Bytes(word[..size].to_vec())
                }
            }
            Bytes::Bytes(mut head) => {
                *self = Self::Bytes(head.split_off(size));
                Self::Bytes(head)
            }
            Bytes::Empty | Bytes::Byte(_) => unreachable!("size is below the length"),
        }
    }

    pub fn bytes(self) -> Vec<u8> {
        match self {
            Bytes::Empty => vec![],
            Bytes::Byte(b) => vec![b],
            Bytes::Word(w) => w.to_vec(),
            Bytes::Bytes(bytes) => bytes,
        }
    }

    pub fn append(&mut self, other: Self) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other;
            return;
        }
        let mut bytes = self.take().bytes();
        bytes.extend_from_slice(other.as_slice());
        *self = Self::Bytes(bytes);
    }

    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Bytes::Empty)
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for Bytes {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<String> for Bytes {
    fn from(string: String) -> Self {
        Self::Bytes(string.into_bytes())
    }
}
