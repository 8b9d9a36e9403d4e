//! # WTF Trace Types
//!
//! The vocabulary shared by the container and the database: the argument codec,
//! event type descriptors and their registry, the built-in event catalogue and the
//! constants of the trace file formats.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_debug_implementations)]

mod buffer;
mod builtin;
mod context;
mod error;
mod event_type;
mod event_type_table;
mod formats;
mod string_table;
mod value;
mod variable;
mod zone;

pub use buffer::*;
pub use builtin::*;
pub use context::*;
pub use error::*;
pub use event_type::*;
pub use event_type_table::*;
pub use formats::*;
pub use string_table::*;
pub use value::*;
pub use variable::*;
pub use zone::*;

pub mod export {
    pub use regex;
    pub use serde_json;
}
