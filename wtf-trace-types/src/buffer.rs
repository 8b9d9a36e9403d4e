//! Big-endian cursor over an event buffer.
//!
//! ```ignore
//! ascii string:
//! +---+---+-------~-------+
//! |  length |  characters |
//! +---+---+-------~-------+
//!
//! utf8 string:
//! +---+---+---+---+-----~-----+
//! |  chars  |  bytes  |  data |
//! +---+---+---+---+-----~-----+
//!
//! string table reference (either kind):
//! +------+------+---+---+---+---+
//! | 0xFF | 0xFF |    ordinal    |
//! +------+------+---+---+---+---+
//! ```
//!
//! A length of zero denotes an absent string.

use crate::{CodecErr, CodecResult, StringTable};

/// Length prefix marking a string table reference.
pub const STRING_REFERENCE: u16 = 0xFFFF;

/// The longest ascii string that fits the length prefix.
pub const MAX_ASCII_LENGTH: usize = STRING_REFERENCE as usize - 1;

/// The longest utf8 string (in bytes) that fits the length prefix.
pub const MAX_UTF8_LENGTH: usize = STRING_REFERENCE as usize - 1;

#[derive(Debug, Clone)]
pub struct BufferReader<'a> {
    data: &'a [u8],
    offset: usize,
    string_table: Option<&'a StringTable>,
}

#[derive(Debug, Default, Clone)]
pub struct BufferWriter {
    data: Vec<u8>,
    string_table: Option<StringTable>,
}

impl<'a> BufferReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            string_table: None,
        }
    }

    /// Resolve string references against the given table.
    pub fn with_string_table(mut self, table: Option<&'a StringTable>) -> Self {
        self.string_table = table;
        self
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, size: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < size {
            return Err(CodecErr::NotEnoughBytes {
                offset: self.offset,
                needed: size,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.offset..self.offset + size];
        self.offset += size;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> CodecResult<i8> {
        Ok(i8::from_be_bytes(self.take_array()?))
    }

    pub fn read_u16(&mut self) -> CodecResult<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_i16(&mut self) -> CodecResult<i16> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> CodecResult<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> CodecResult<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> CodecResult<f32> {
        Ok(f32::from_be_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> CodecResult<u64> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> CodecResult<f64> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    pub fn read_bytes(&mut self, size: usize) -> CodecResult<&'a [u8]> {
        self.take(size)
    }

    /// LEB128 style unsigned integer.
    pub fn read_varuint(&mut self) -> CodecResult<u32> {
        let mut value: u32 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            if shift < 32 {
                value |= ((byte & 0x7F) as u32) << shift;
            }
            shift += 7;
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok(value)
    }

    /// Zig-zag encoded signed integer.
    pub fn read_varint(&mut self) -> CodecResult<i32> {
        let value = self.read_varuint()?;
        Ok(((value >> 1) as i32) ^ -((value & 1) as i32))
    }

    fn lookup(&self, ordinal: u32) -> CodecResult<String> {
        self.string_table
            .and_then(|table| table.get(ordinal))
            .map(|s| s.to_owned())
            .ok_or(CodecErr::StringReference(ordinal))
    }

    pub fn read_ascii_string(&mut self) -> CodecResult<Option<String>> {
        let len = self.read_u16()?;
        match len {
            0 => Ok(None),
            STRING_REFERENCE => {
                let ordinal = self.read_u32()?;
                self.lookup(ordinal).map(Some)
            }
            len => {
                let bytes = self.take(len as usize)?;
                if !bytes.is_ascii() {
                    return Err(CodecErr::NotAscii);
                }
                let string = std::str::from_utf8(bytes).map_err(CodecErr::Utf8Error)?;
                Ok(Some(string.to_owned()))
            }
        }
    }

    pub fn read_utf8_string(&mut self) -> CodecResult<Option<String>> {
        let chars = self.read_u16()?;
        match chars {
            0 => Ok(None),
            STRING_REFERENCE => {
                let ordinal = self.read_u32()?;
                self.lookup(ordinal).map(Some)
            }
            _ => {
                let len = self.read_u16()?;
                let bytes = self.take(len as usize)?;
                let string = std::str::from_utf8(bytes).map_err(CodecErr::Utf8Error)?;
                Ok(Some(string.to_owned()))
            }
        }
    }
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern every ascii string into a string table instead of inlining it.
    pub fn with_string_table(mut self) -> Self {
        self.string_table = Some(StringTable::new());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn string_table(&self) -> Option<&StringTable> {
        self.string_table.as_ref()
    }

    /// Returns the encoded bytes and the string table, if one is in use.
    pub fn finish(self) -> (Vec<u8>, Option<StringTable>) {
        (self.data, self.string_table)
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_varuint(&mut self, mut value: u32) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.write_u8(byte);
                break;
            }
            self.write_u8(byte | 0x80);
        }
    }

    pub fn write_varint(&mut self, value: i32) {
        self.write_varuint(((value << 1) ^ (value >> 31)) as u32);
    }

    pub fn write_string_reference(&mut self, ordinal: u32) {
        self.write_u16(STRING_REFERENCE);
        self.write_u32(ordinal);
    }

    pub fn write_ascii_string(&mut self, value: Option<&str>) -> CodecResult<()> {
        let value = match value {
            Some(value) if !value.is_empty() => value,
            _ => {
                self.write_u16(0);
                return Ok(());
            }
        };
        if !value.is_ascii() {
            return Err(CodecErr::NotAscii);
        }
        if let Some(table) = self.string_table.as_mut() {
            let ordinal = table.add_string(value);
            self.write_string_reference(ordinal);
            return Ok(());
        }
        if value.len() > MAX_ASCII_LENGTH {
            return Err(CodecErr::StringTooLong(value.len()));
        }
        self.write_u16(value.len() as u16);
        self.write_bytes(value.as_bytes());
        Ok(())
    }

    pub fn write_utf8_string(&mut self, value: Option<&str>) -> CodecResult<()> {
        let value = match value {
            Some(value) if !value.is_empty() => value,
            _ => {
                self.write_u16(0);
                return Ok(());
            }
        };
        let chars = value.chars().count();
        if value.len() > MAX_UTF8_LENGTH {
            return Err(CodecErr::StringTooLong(value.len()));
        }
        self.write_u16(chars as u16);
        self.write_u16(value.len() as u16);
        self.write_bytes(value.as_bytes());
        Ok(())
    }
}

/// Encoded size of an ascii string, inlined.
pub fn ascii_string_size(value: Option<&str>) -> usize {
    2 + value.map(|v| v.len()).unwrap_or(0)
}

/// Encoded size of a utf8 string.
pub fn utf8_string_size(value: Option<&str>) -> usize {
    match value {
        Some(value) if !value.is_empty() => 4 + value.len(),
        _ => 2,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_numbers() {
        let mut writer = BufferWriter::new();
        writer.write_u8(1);
        writer.write_u16(0x0203);
        writer.write_u32(0x04050607);
        writer.write_i16(-2);
        writer.write_f32(1.5);
        writer.write_u64(0x0102030405060708);
        writer.write_f64(-0.125);
        assert_eq!(&writer.as_bytes()[..7], &[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(&writer.as_bytes()[13..21], &[1, 2, 3, 4, 5, 6, 7, 8]);

        let mut reader = BufferReader::new(writer.as_bytes());
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert_eq!(reader.read_u16().unwrap(), 0x0203);
        assert_eq!(reader.read_u32().unwrap(), 0x04050607);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.read_u64().unwrap(), 0x0102030405060708);
        assert_eq!(reader.read_f64().unwrap(), -0.125);
        assert!(reader.is_empty());
        assert!(matches!(
            reader.read_u8(),
            Err(CodecErr::NotEnoughBytes { needed: 1, .. })
        ));
    }

    #[test]
    fn test_varint() {
        let mut writer = BufferWriter::new();
        writer.write_varuint(300);
        writer.write_varint(-3);
        writer.write_varint(i32::MAX);
        assert_eq!(&writer.as_bytes()[..2], &[0xAC, 0x02]);
        let mut reader = BufferReader::new(writer.as_bytes());
        assert_eq!(reader.read_varuint().unwrap(), 300);
        assert_eq!(reader.read_varint().unwrap(), -3);
        assert_eq!(reader.read_varint().unwrap(), i32::MAX);
    }

    #[test]
    fn test_strings() {
        let mut writer = BufferWriter::new();
        writer.write_ascii_string(Some("abc")).unwrap();
        writer.write_ascii_string(None).unwrap();
        writer.write_utf8_string(Some("héllo")).unwrap();
        assert!(matches!(
            writer.write_ascii_string(Some("é")),
            Err(CodecErr::NotAscii)
        ));
        assert_eq!(&writer.as_bytes()[..5], &[0, 3, b'a', b'b', b'c']);
        assert_eq!(utf8_string_size(Some("héllo")), 4 + 6);

        let mut reader = BufferReader::new(writer.as_bytes());
        assert_eq!(reader.read_ascii_string().unwrap().as_deref(), Some("abc"));
        assert_eq!(reader.read_ascii_string().unwrap(), None);
        assert_eq!(reader.read_utf8_string().unwrap().as_deref(), Some("héllo"));
        assert!(reader.is_empty());
    }

    #[test]
    fn test_string_table_reference() {
        let mut writer = BufferWriter::new().with_string_table();
        writer.write_ascii_string(Some("first")).unwrap();
        writer.write_ascii_string(Some("second")).unwrap();
        writer.write_ascii_string(Some("first")).unwrap();
        let (bytes, table) = writer.finish();
        let table = table.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(&bytes[..6], &[0xFF, 0xFF, 0, 0, 0, 0]);

        let mut reader = BufferReader::new(&bytes).with_string_table(Some(&table));
        assert_eq!(reader.read_ascii_string().unwrap().as_deref(), Some("first"));
        assert_eq!(reader.read_ascii_string().unwrap().as_deref(), Some("second"));
        assert_eq!(reader.read_ascii_string().unwrap().as_deref(), Some("first"));

        let mut reader = BufferReader::new(&bytes);
        assert!(matches!(
            reader.read_ascii_string(),
            Err(CodecErr::StringReference(0))
        ));
    }
}
