use std::str::Utf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
/// Errors raised while reading or writing event arguments.
pub enum CodecErr {
    #[error("Not enough bytes: needed {needed} at offset {offset}, only {remaining} remaining")]
    NotEnoughBytes {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("Utf8Error: {0}")]
    Utf8Error(#[source] Utf8Error),
    #[error("String contains non-ascii characters")]
    NotAscii,
    #[error("String too long: {0}")]
    StringTooLong(usize),
    #[error("String table reference {0} cannot be resolved")]
    StringReference(u32),
    #[error("Value does not fit argument `{0}`")]
    TypeMismatch(String),
    #[error("Missing argument `{0}`")]
    MissingArgument(String),
    #[error("serde_json::Error {0}")]
    SerdeJson(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Errors raised while parsing an event signature such as `foo(uint32 x)`.
pub enum SignatureErr {
    #[error("Malformed signature: `{0}`")]
    Malformed(String),
    #[error("Unknown argument type `{0}`")]
    UnknownType(String),
    #[error("Duplicate argument `{0}`")]
    DuplicateArgument(String),
}

pub type CodecResult<T> = Result<T, CodecErr>;
