//! <div align="center">
//!
//!   <h1>wtf-trace</h1>
//!
//!   <p>
//!     <strong>Reader, writer and event database for WTF traces</strong>
//!   </p>
//!
//! </div>
//!
//! Traces recorded by the Web Tracing Framework are streams of chunks, in a binary
//! or a JSON container. This crate reads and writes those streams, and loads them
//! into an event database that rebuilds scopes, frames, marks, time ranges and
//! flows for each zone.
//!
//! ## Architecture
//!
//! `wtf-trace` is the facade crate re-exporting implementation from a number of sub-crates:
//!
//! + `wtf-trace-types`: event types, the argument codec and format constants
//! + `wtf-trace-cff`: the chunked file format, its transports, sources and targets
//! + `wtf-trace-db`: the event database, enabled with the `db` feature
//!
//! Reading from files needs one of the `runtime-tokio` or `runtime-async-std` features.
//!
//! ```ignore
//! let db = wtf_trace::Database::load_file("session.wtf-trace").await?;
//! for zone in db.zones() {
//!     println!("{}: {} events", zone.name(), zone.event_list().len());
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(all(feature = "runtime-async-std", feature = "runtime-tokio"))]
compile_error!("'runtime-async-std' and 'runtime-tokio' cannot be enabled at the same time");

pub use wtf_trace_types::*;

#[cfg(feature = "wtf-trace-cff")]
#[cfg_attr(docsrs, doc(cfg(feature = "cff")))]
pub use wtf_trace_cff::*;

#[cfg(feature = "wtf-trace-db")]
#[cfg_attr(docsrs, doc(cfg(feature = "db")))]
pub use wtf_trace_db::*;
