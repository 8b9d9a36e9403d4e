use crate::{
    ascii_string_size, utf8_string_size, BufferReader, BufferWriter, CodecErr, CodecResult,
    SignatureErr, Value,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Wire type of an event argument.
pub enum VariableType {
    Bool,
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
    /// Decoded as an integer while it fits `i64`, as a float beyond.
    Uint64,
    Float32,
    Float64,
    /// A flow identifier, encoded as `uint32`.
    FlowId,
    /// Microseconds on the wire, milliseconds once decoded.
    Time32,
    Ascii,
    Utf8,
    /// JSON carried in a utf8 string.
    Any,
    /// `uint32` element count followed by the elements.
    Sequence(Box<VariableType>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// A named, typed argument of an event signature.
pub struct Variable {
    pub name: String,
    pub ty: VariableType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The result of parsing `name(type arg, ...)`.
pub struct Signature {
    pub name: String,
    pub args: Vec<Variable>,
}

lazy_static! {
    static ref SIGNATURE: Regex = Regex::new(r"^([^()]+)(?:\((.*)\))?$").unwrap();
    static ref ARGUMENT: Regex =
        Regex::new(r"^[ ]*([a-zA-Z0-9 \[\]<>]+?) ([a-zA-Z0-9_]+)(?:@([0-9]+))?[ ]*$").unwrap();
}

impl VariableType {
    /// Resolves a type name, including the WebIDL aliases and `T[]` / `sequence<T>`.
    pub fn from_type_name(name: &str) -> Result<Self, SignatureErr> {
        let name = name.trim();
        if let Some(inner) = name.strip_suffix("[]") {
            return Self::sequence_of(inner);
        }
        if let Some(inner) = name
            .strip_prefix("sequence<")
            .and_then(|s| s.strip_suffix('>'))
        {
            return Self::sequence_of(inner);
        }
        Ok(match name {
            "bool" | "boolean" => Self::Bool,
            "int8" | "byte" => Self::Int8,
            "int16" | "short" => Self::Int16,
            "int32" | "long" => Self::Int32,
            "uint8" | "octet" => Self::Uint8,
            "uint16" | "unsigned short" => Self::Uint16,
            "uint32" | "unsigned long" => Self::Uint32,
            "uint64" | "unsigned long long" => Self::Uint64,
            "float32" | "float" => Self::Float32,
            "float64" | "double" => Self::Float64,
            "flowId" => Self::FlowId,
            "time32" => Self::Time32,
            "ascii" => Self::Ascii,
            "utf8" | "DOMString" => Self::Utf8,
            "any" => Self::Any,
            other => return Err(SignatureErr::UnknownType(other.to_owned())),
        })
    }

    fn sequence_of(inner: &str) -> Result<Self, SignatureErr> {
        match Self::from_type_name(inner)? {
            Self::Any | Self::Sequence(_) => Err(SignatureErr::UnknownType(format!("{inner}[]"))),
            element => Ok(Self::Sequence(Box::new(element))),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Self::Bool => "bool".to_owned(),
            Self::Int8 => "int8".to_owned(),
            Self::Int16 => "int16".to_owned(),
            Self::Int32 => "int32".to_owned(),
            Self::Uint8 => "uint8".to_owned(),
            Self::Uint16 => "uint16".to_owned(),
            Self::Uint32 => "uint32".to_owned(),
            Self::Uint64 => "uint64".to_owned(),
            Self::Float32 => "float32".to_owned(),
            Self::Float64 => "float64".to_owned(),
            Self::FlowId => "flowId".to_owned(),
            Self::Time32 => "time32".to_owned(),
            Self::Ascii => "ascii".to_owned(),
            Self::Utf8 => "utf8".to_owned(),
            Self::Any => "any".to_owned(),
            Self::Sequence(inner) => format!("{}[]", inner.type_name()),
        }
    }

    /// Byte width for fixed-size types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::Int8 | Self::Uint8 => Some(1),
            Self::Int16 | Self::Uint16 => Some(2),
            Self::Int32 | Self::Uint32 | Self::Float32 | Self::FlowId | Self::Time32 => Some(4),
            Self::Uint64 | Self::Float64 => Some(8),
            Self::Ascii | Self::Utf8 | Self::Any | Self::Sequence(_) => None,
        }
    }

    pub fn is_fixed_size(&self) -> bool {
        self.fixed_size().is_some()
    }

    pub fn read_from(&self, reader: &mut BufferReader) -> CodecResult<Value> {
        Ok(match self {
            Self::Bool => Value::Bool(reader.read_u8()? != 0),
            Self::Int8 => Value::Int(reader.read_i8()? as i64),
            Self::Int16 => Value::Int(reader.read_i16()? as i64),
            Self::Int32 => Value::Int(reader.read_i32()? as i64),
            Self::Uint8 => Value::Int(reader.read_u8()? as i64),
            Self::Uint16 => Value::Int(reader.read_u16()? as i64),
            Self::Uint32 | Self::FlowId => Value::Int(reader.read_u32()? as i64),
            Self::Uint64 => {
                let value = reader.read_u64()?;
                match i64::try_from(value) {
                    Ok(value) => Value::Int(value),
                    Err(_) => Value::Float(value as f64),
                }
            }
            Self::Float32 => Value::Float(reader.read_f32()? as f64),
            Self::Float64 => Value::Float(reader.read_f64()?),
            Self::Time32 => Value::Float(reader.read_u32()? as f64 / 1000.0),
            Self::Ascii => reader.read_ascii_string()?.into(),
            Self::Utf8 => reader.read_utf8_string()?.into(),
            Self::Any => match reader.read_utf8_string()? {
                Some(json) => Value::from_json(serde_json::from_str(&json)?),
                None => Value::Null,
            },
            Self::Sequence(element) => {
                let count = reader.read_u32()? as usize;
                // every element takes at least one byte
                if count > reader.remaining() {
                    return Err(CodecErr::NotEnoughBytes {
                        offset: reader.offset(),
                        needed: count,
                        remaining: reader.remaining(),
                    });
                }
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(element.read_from(reader)?);
                }
                Value::Array(values)
            }
        })
    }

    /// Writes `value`; `name` is only used to report a mismatch.
    pub fn write_to(&self, writer: &mut BufferWriter, name: &str, value: &Value) -> CodecResult<()> {
        let mismatch = || CodecErr::TypeMismatch(name.to_owned());
        let int = |min: i64, max: i64| -> CodecResult<i64> {
            match value.as_i64() {
                Some(i) if i >= min && i <= max => Ok(i),
                _ => Err(mismatch()),
            }
        };
        match self {
            Self::Bool => writer.write_u8(value.as_bool().ok_or_else(mismatch)? as u8),
            Self::Int8 => writer.write_i8(int(i8::MIN as i64, i8::MAX as i64)? as i8),
            Self::Int16 => writer.write_i16(int(i16::MIN as i64, i16::MAX as i64)? as i16),
            Self::Int32 => writer.write_i32(int(i32::MIN as i64, i32::MAX as i64)? as i32),
            Self::Uint8 => writer.write_u8(int(0, u8::MAX as i64)? as u8),
            Self::Uint16 => writer.write_u16(int(0, u16::MAX as i64)? as u16),
            Self::Uint32 | Self::FlowId => writer.write_u32(int(0, u32::MAX as i64)? as u32),
            Self::Uint64 => match value {
                Value::Float(f) if f.fract() == 0.0 && (0.0..=u64::MAX as f64).contains(f) => {
                    writer.write_u64(*f as u64)
                }
                _ => writer.write_u64(int(0, i64::MAX)? as u64),
            },
            Self::Float32 => writer.write_f32(value.as_f64().ok_or_else(mismatch)? as f32),
            Self::Float64 => writer.write_f64(value.as_f64().ok_or_else(mismatch)?),
            Self::Time32 => {
                let ms = value.as_f64().ok_or_else(mismatch)?;
                let us = (ms * 1000.0).round();
                if !(0.0..=u32::MAX as f64).contains(&us) {
                    return Err(mismatch());
                }
                writer.write_u32(us as u32)
            }
            Self::Ascii => match value {
                Value::Null => writer.write_ascii_string(None)?,
                value => writer.write_ascii_string(Some(value.as_str().ok_or_else(mismatch)?))?,
            },
            Self::Utf8 => match value {
                Value::Null => writer.write_utf8_string(None)?,
                value => writer.write_utf8_string(Some(value.as_str().ok_or_else(mismatch)?))?,
            },
            Self::Any => {
                if value.is_null() {
                    writer.write_utf8_string(None)?;
                } else {
                    let json = serde_json::to_string(&value.to_json())?;
                    writer.write_utf8_string(Some(&json))?;
                }
            }
            Self::Sequence(element) => {
                let values = value.as_array().ok_or_else(mismatch)?;
                writer.write_u32(values.len() as u32);
                for value in values {
                    element.write_to(writer, name, value)?;
                }
            }
        }
        Ok(())
    }

    /// Exact number of bytes `write_to` emits for `value`, with strings inlined.
    pub fn size_of(&self, value: &Value) -> usize {
        if let Some(size) = self.fixed_size() {
            return size;
        }
        match self {
            Self::Ascii => ascii_string_size(value.as_str()),
            Self::Utf8 => utf8_string_size(value.as_str()),
            Self::Any => {
                if value.is_null() {
                    2
                } else {
                    let json = value.to_json().to_string();
                    utf8_string_size(Some(&json))
                }
            }
            Self::Sequence(element) => {
                4 + value
                    .as_array()
                    .map(|values| values.iter().map(|v| element.size_of(v)).sum())
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }
}

impl Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl Variable {
    pub fn new<S: Into<String>>(name: S, ty: VariableType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn read_from(&self, reader: &mut BufferReader) -> CodecResult<Value> {
        self.ty.read_from(reader)
    }

    pub fn write_to(&self, writer: &mut BufferWriter, value: &Value) -> CodecResult<()> {
        self.ty.write_to(writer, &self.name, value)
    }

    pub fn size_of(&self, value: &Value) -> usize {
        self.ty.size_of(value)
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.ty, self.name)
    }
}

impl Signature {
    /// Parses `name(type arg, type arg@ordinal)`. The argument list is optional.
    ///
    /// When ordinals are given the arguments are ordered by them.
    pub fn parse(signature: &str) -> Result<Self, SignatureErr> {
        let malformed = || SignatureErr::Malformed(signature.to_owned());
        let captures = SIGNATURE.captures(signature.trim()).ok_or_else(malformed)?;
        let name = captures
            .get(1)
            .map(|m| m.as_str().trim())
            .filter(|n| !n.is_empty())
            .ok_or_else(malformed)?;
        let args = match captures.get(2) {
            Some(args) => parse_signature_arguments(args.as_str())?,
            None => Vec::new(),
        };
        Ok(Self {
            name: name.to_owned(),
            args,
        })
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// Parses the comma separated argument list of a signature.
pub fn parse_signature_arguments(args: &str) -> Result<Vec<Variable>, SignatureErr> {
    if args.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut parsed: Vec<(Option<u32>, Variable)> = Vec::new();
    for arg in args.split(',') {
        let captures = ARGUMENT
            .captures(arg)
            .ok_or_else(|| SignatureErr::Malformed(arg.to_owned()))?;
        let ty = VariableType::from_type_name(&captures[1])?;
        let name = captures[2].to_owned();
        if parsed.iter().any(|(_, v)| v.name == name) {
            return Err(SignatureErr::DuplicateArgument(name));
        }
        let ordinal = captures.get(3).and_then(|m| m.as_str().parse().ok());
        parsed.push((ordinal, Variable::new(name, ty)));
    }
    if parsed.iter().all(|(ordinal, _)| ordinal.is_some()) {
        parsed.sort_by_key(|(ordinal, _)| *ordinal);
    }
    Ok(parsed.into_iter().map(|(_, v)| v).collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(
            VariableType::from_type_name("unsigned short").unwrap(),
            VariableType::Uint16
        );
        assert_eq!(
            VariableType::from_type_name("DOMString").unwrap(),
            VariableType::Utf8
        );
        assert_eq!(
            VariableType::from_type_name("sequence<octet>").unwrap(),
            VariableType::Sequence(Box::new(VariableType::Uint8))
        );
        assert_eq!(
            VariableType::from_type_name("uint32[]").unwrap().type_name(),
            "uint32[]"
        );
        assert!(VariableType::from_type_name("any[]").is_err());
        assert_eq!(
            VariableType::from_type_name("double").unwrap(),
            VariableType::Float64
        );
        assert_eq!(
            VariableType::from_type_name("uint64[]").unwrap().fixed_size(),
            None
        );
        let sig = Signature::parse("x(float64 v, uint64 n)").unwrap();
        assert_eq!(sig.args[0].ty, VariableType::Float64);
        assert_eq!(sig.args[1].ty.fixed_size(), Some(8));
        assert_eq!(sig.to_string(), "x(float64 v, uint64 n)");
        assert_eq!(
            VariableType::from_type_name("int64"),
            Err(SignatureErr::UnknownType("int64".to_owned()))
        );
    }

    #[test]
    fn test_parse_signature() {
        let sig = Signature::parse("foo#bar(uint32 x, ascii name, unsigned long y)").unwrap();
        assert_eq!(sig.name, "foo#bar");
        assert_eq!(sig.args.len(), 3);
        assert_eq!(sig.args[1], Variable::new("name", VariableType::Ascii));
        assert_eq!(sig.args[2].ty, VariableType::Uint32);
        assert_eq!(
            sig.to_string(),
            "foo#bar(uint32 x, ascii name, uint32 y)"
        );

        let sig = Signature::parse("noargs()").unwrap();
        assert!(sig.args.is_empty());
        let sig = Signature::parse("bare").unwrap();
        assert_eq!(sig.name, "bare");

        let sig = Signature::parse("ord(uint8 b@1, uint8 a@0)").unwrap();
        assert_eq!(sig.args[0].name, "a");

        assert!(Signature::parse("dup(uint8 a, uint8 a)").is_err());
        assert!(Signature::parse("bad(uint8)").is_err());
        assert!(Signature::parse("(uint8 a)").is_err());
    }

    #[test]
    fn test_codec() {
        let vars = vec![
            (VariableType::Bool, Value::Bool(true)),
            (VariableType::Int8, Value::Int(-5)),
            (VariableType::Uint16, Value::Int(65535)),
            (VariableType::Int32, Value::Int(-70000)),
            (VariableType::Float32, Value::Float(0.25)),
            (VariableType::Float64, Value::Float(0.1)),
            (VariableType::Uint64, Value::Int(1 << 40)),
            (VariableType::Uint64, Value::Float(18446744073709549568.0)),
            (VariableType::Time32, Value::Float(1.5)),
            (VariableType::Ascii, Value::from("hello")),
            (VariableType::Utf8, Value::from("wörld")),
            (VariableType::Any, Value::from_json(serde_json::json!({"a": 1}))),
            (
                VariableType::Sequence(Box::new(VariableType::Uint8)),
                Value::Array(vec![Value::Int(1), Value::Int(2)]),
            ),
        ];
        let mut writer = BufferWriter::new();
        let mut size = 0;
        for (ty, value) in vars.iter() {
            ty.write_to(&mut writer, "arg", value).unwrap();
            size += ty.size_of(value);
        }
        assert_eq!(writer.len(), size);

        let mut reader = BufferReader::new(writer.as_bytes());
        for (ty, value) in vars.iter() {
            assert_eq!(&ty.read_from(&mut reader).unwrap(), value);
        }
        assert!(reader.is_empty());
    }

    #[test]
    fn test_type_mismatch() {
        let mut writer = BufferWriter::new();
        assert!(matches!(
            VariableType::Uint8.write_to(&mut writer, "x", &Value::Int(256)),
            Err(CodecErr::TypeMismatch(name)) if name == "x"
        ));
        assert!(VariableType::Ascii
            .write_to(&mut writer, "s", &Value::Int(1))
            .is_err());
        assert!(VariableType::Uint32
            .write_to(&mut writer, "n", &Value::from("1"))
            .is_err());
        assert!(VariableType::Uint64
            .write_to(&mut writer, "n", &Value::Int(-1))
            .is_err());
        assert!(VariableType::Float64
            .write_to(&mut writer, "f", &Value::from("x"))
            .is_err());
    }
}
