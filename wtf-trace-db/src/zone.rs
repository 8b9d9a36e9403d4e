use crate::{
    AncillaryHandle, EventIndex, EventList, FrameList, MarkList, TimeRangeList,
};
use std::{
    fmt::Display,
    sync::{Arc, Mutex, PoisonError},
};
use wtf_trace_types::{EventTypeTable, ZoneType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Identifies a zone within its database.
pub struct ZoneId(u32);

/// A thread of execution, with its own event list and derived lists.
pub struct Zone {
    id: ZoneId,
    name: String,
    zone_type: ZoneType,
    location: String,
    event_list: EventList,
    mark_list: Arc<Mutex<MarkList>>,
    frame_list: Arc<Mutex<FrameList>>,
    time_range_list: Arc<Mutex<TimeRangeList>>,
    indices: Vec<SharedIndex>,
}

struct SharedIndex {
    index: Arc<Mutex<EventIndex>>,
    users: usize,
}

impl ZoneId {
    pub(crate) fn new(id: usize) -> Self {
        Self(id as u32)
    }

    pub fn id(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zone")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("zone_type", &self.zone_type)
            .field("location", &self.location)
            .field("event_list", &self.event_list)
            .field("indices", &self.indices.len())
            .finish()
    }
}

impl Zone {
    pub fn new(
        id: ZoneId,
        name: &str,
        zone_type: ZoneType,
        location: &str,
        max_scope_depth: usize,
        event_types: &EventTypeTable,
    ) -> Self {
        let mut zone = Self {
            id,
            name: name.to_owned(),
            zone_type,
            location: location.to_owned(),
            event_list: EventList::with_max_scope_depth(max_scope_depth),
            mark_list: Default::default(),
            frame_list: Default::default(),
            time_range_list: Default::default(),
            indices: Vec::new(),
        };
        let lists: [AncillaryHandle; 3] = [
            zone.mark_list.clone(),
            zone.frame_list.clone(),
            zone.time_range_list.clone(),
        ];
        for list in lists {
            zone.event_list.register_ancillary_list(list, event_types);
        }
        zone
    }

    /// `name:type:location`, unique within a database.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.name, self.zone_type, self.location)
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn zone_type(&self) -> &ZoneType {
        &self.zone_type
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub(crate) fn reset_info(&mut self, name: &str, zone_type: ZoneType, location: &str) {
        self.name = name.to_owned();
        self.zone_type = zone_type;
        self.location = location.to_owned();
    }

    /// `name (type)` and the location on the next line.
    pub fn info_string(&self) -> String {
        format!("{} ({})\n{}", self.name, self.zone_type, self.location)
    }

    pub fn event_list(&self) -> &EventList {
        &self.event_list
    }

    pub fn event_list_mut(&mut self) -> &mut EventList {
        &mut self.event_list
    }

    pub fn mark_list(&self) -> &Arc<Mutex<MarkList>> {
        &self.mark_list
    }

    pub fn frame_list(&self) -> &Arc<Mutex<FrameList>> {
        &self.frame_list
    }

    pub fn time_range_list(&self) -> &Arc<Mutex<TimeRangeList>> {
        &self.time_range_list
    }

    /// An index over `event_names`, shared with every other caller asking for the
    /// same names. Pair with [`Zone::release_shared_index`].
    pub fn get_shared_index(
        &mut self,
        event_names: &[&str],
        event_types: &EventTypeTable,
    ) -> Arc<Mutex<EventIndex>> {
        for shared in self.indices.iter_mut() {
            let index = shared.index.lock().unwrap_or_else(PoisonError::into_inner);
            let matches = index.event_names() == event_names;
            drop(index);
            if matches {
                shared.users += 1;
                return shared.index.clone();
            }
        }
        let index = Arc::new(Mutex::new(EventIndex::new(event_names.iter().copied())));
        self.event_list
            .register_ancillary_list(index.clone(), event_types);
        self.indices.push(SharedIndex {
            index: index.clone(),
            users: 1,
        });
        index
    }

    /// Unregisters the index once its last user has released it.
    pub fn release_shared_index(&mut self, index: &Arc<Mutex<EventIndex>>) {
        let position = match self
            .indices
            .iter()
            .position(|s| Arc::ptr_eq(&s.index, index))
        {
            Some(position) => position,
            None => return,
        };
        let shared = &mut self.indices[position];
        shared.users -= 1;
        if shared.users == 0 {
            let shared = self.indices.remove(position);
            let handle: AncillaryHandle = shared.index;
            self.event_list.unregister_ancillary_list(&handle);
        }
    }

    pub fn shared_index_count(&self) -> usize {
        self.indices.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use wtf_trace_types::{EventFlags, EventTypeDef};

    #[test]
    fn test_shared_index() {
        let mut table = EventTypeTable::new();
        let a = table.define_type(EventTypeDef::instance("app#a", EventFlags::empty()).unwrap());
        let mut zone = Zone::new(ZoneId::new(0), "main", ZoneType::Script, "http://a", 1024, &table);
        assert_eq!(zone.key(), "main:script:http://a");
        assert_eq!(zone.info_string(), "main (script)\nhttp://a");
        assert_eq!(zone.event_list().ancillary_list_count(), 3);

        zone.event_list_mut().insert(a, 1.0, None);
        zone.event_list_mut().rebuild(&mut table);

        let first = zone.get_shared_index(&["app#a"], &table);
        let second = zone.get_shared_index(&["app#a"], &table);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.lock().unwrap().count(), 1);
        assert_eq!(zone.event_list().ancillary_list_count(), 4);

        zone.release_shared_index(&first);
        assert_eq!(zone.shared_index_count(), 1);
        zone.release_shared_index(&second);
        assert_eq!(zone.shared_index_count(), 0);
        assert_eq!(zone.event_list().ancillary_list_count(), 3);
    }
}
