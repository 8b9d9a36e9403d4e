//! # WTF Trace Chunked File Container
//!
//! Traces are streams of chunks. A chunk is a list of typed parts; the first chunk of a
//! file carries the file header, the rest carry event data. The same model is
//! serialized either as a compact binary stream (see [`format`]) or as JSON.
//!
//! Sources reassemble chunks from a [`ReadTransport`], targets write chunks to a
//! [`WriteTransport`]. Neither performs I/O of its own.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_debug_implementations)]

#[cfg(all(feature = "runtime-async-std", feature = "runtime-tokio"))]
compile_error!("'runtime-async-std' and 'runtime-tokio' cannot be enabled at the same time");

mod binary;
mod buffer;
mod chunk;
mod error;
#[cfg(any(feature = "runtime-tokio", feature = "runtime-async-std"))]
mod file;
pub mod format;
mod json;
mod part;
#[cfg(any(feature = "runtime-tokio", feature = "runtime-async-std"))]
mod runtime;
mod source;
mod target;
mod transport;

pub use binary::*;
pub use buffer::*;
pub use chunk::*;
pub use error::*;
#[cfg(any(feature = "runtime-tokio", feature = "runtime-async-std"))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "runtime-tokio", feature = "runtime-async-std"))))]
pub use file::*;
pub use json::*;
pub use part::*;
pub use source::*;
pub use target::*;
pub use transport::*;
