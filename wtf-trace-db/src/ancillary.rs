use crate::{EventIterator, EventList};
use std::sync::{Arc, Mutex};
use wtf_trace_types::{EventType, EventTypeTable};

/// A structure derived from an [`EventList`], rebuilt by the list in one linear scan.
///
/// 1. `begin_rebuild` clears the structure and names the event types it wants to see.
///    Types are resolved by name against the table, as wire ids are local to a source.
/// 2. `handle_event` is called for every matching event in time order, with the index
///    of the matching entry in the declared list.
/// 3. `end_rebuild` finalizes and notifies subscribers.
pub trait AncillaryList: Send {
    fn begin_rebuild(&mut self, event_types: &EventTypeTable) -> Vec<Option<Arc<EventType>>>;

    fn handle_event(
        &mut self,
        event_type_index: usize,
        event_type: &Arc<EventType>,
        it: &EventIterator<'_>,
    );

    fn end_rebuild(&mut self, events: &EventList);
}

/// Registration of an ancillary list on an [`EventList`].
pub type AncillaryHandle = Arc<Mutex<dyn AncillaryList>>;

/// Whether two handles point at the same list.
pub fn same_list(a: &AncillaryHandle, b: &AncillaryHandle) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
