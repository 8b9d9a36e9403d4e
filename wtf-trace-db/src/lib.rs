//! # WTF Trace Database
//!
//! Turns trace streams into a queryable event database. A [`Database`] owns the
//! event type table and one [`Zone`] per thread of execution; each zone keeps its
//! events in a time-ordered [`EventList`], walked with an [`EventIterator`].
//!
//! Derived structures such as [`MarkList`], [`FrameList`], [`TimeRangeList`] and
//! [`EventIndex`] implement [`AncillaryList`] and are rebuilt by the event list in
//! one scan whenever a batch of events has been inserted. Flows may cross zones,
//! so the [`FlowList`] belongs to the database and is rebuilt after the zones.
//!
//! ```ignore
//! let db = Database::load(MemoryReadTransport::new(bytes), None).await?;
//! for zone in db.zones() {
//!     let mut it = zone.event_list().begin();
//!     while !it.done() {
//!         println!("{} {}", it.time(), it.name());
//!         it.next();
//!     }
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_debug_implementations)]

#[cfg(all(feature = "runtime-async-std", feature = "runtime-tokio"))]
compile_error!("'runtime-async-std' and 'runtime-tokio' cannot be enabled at the same time");

mod ancillary;
mod builder;
mod data_source;
mod database;
mod error;
mod event_index;
mod event_list;
mod flow_list;
mod frame_list;
mod iterator;
mod mark_list;
mod notify;
mod parser;
mod statistics;
mod time_range_list;
mod zone;

pub use ancillary::*;
pub use builder::*;
pub use data_source::*;
pub use database::*;
pub use error::*;
pub use event_index::*;
pub use event_list::*;
pub use flow_list::*;
pub use frame_list::*;
pub use iterator::*;
pub use mark_list::*;
pub use notify::*;
pub use parser::*;
pub use statistics::*;
pub use time_range_list::*;
pub use zone::*;
