use crate::{
    ChunkedDataSource, DataSourceInfo, DbErr, DbResult, FlowList, FrameList, Notifier,
    SourceHeader, SourceId, Zone, ZoneId, MAX_SCOPE_DEPTH,
};
use flume::Receiver;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use wtf_trace_cff::{ReadTransport, TraceFormat};
use wtf_trace_types::{Arguments, EventType, EventTypeTable, ZoneType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// Scopes nested deeper than this are left out of the tree, with a warning.
    pub max_scope_depth: usize,
    /// Close the scopes left open under a leave that names its target depth.
    pub synthesize_unbalanced_leaves: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_scope_depth: MAX_SCOPE_DEPTH,
            synthesize_unbalanced_leaves: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseEvent {
    SourcesChanged,
    SourceError { source: SourceId, message: String },
    SourceEnded(SourceId),
    /// Zones created during the insertion batch that just ended.
    ZonesAdded(Vec<ZoneId>),
    /// Every zone has been rebuilt.
    Invalidated,
}

/// All events of a trace session, across every source and zone.
///
/// Events are inserted in batches: between [`Database::begin_inserting_events`] and
/// [`Database::end_inserting_events`], after which every zone is rebuilt and
/// subscribers are told.
#[derive(Debug)]
pub struct Database {
    options: DatabaseOptions,
    event_types: EventTypeTable,
    sources: Vec<DataSourceInfo>,
    common_timebase: Option<f64>,
    zones: Vec<Zone>,
    zones_by_key: HashMap<String, ZoneId>,
    default_zone: Option<ZoneId>,
    flow_list: Arc<Mutex<FlowList>>,
    /// Zone count when the current batch began.
    inserting: Option<usize>,
    first_event_time: f64,
    last_event_time: f64,
    next_time_range_id: u32,
    next_flow_id: u32,
    revision: u64,
    notifier: Notifier<DatabaseEvent>,
}

impl Default for Database {
    fn default() -> Self {
        Self::with_options(DatabaseOptions::default())
    }
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DatabaseOptions) -> Self {
        Self {
            options,
            event_types: EventTypeTable::new(),
            sources: Vec::new(),
            common_timebase: None,
            zones: Vec::new(),
            zones_by_key: HashMap::new(),
            default_zone: None,
            flow_list: Default::default(),
            inserting: None,
            first_event_time: 0.0,
            last_event_time: 0.0,
            next_time_range_id: 1,
            next_flow_id: 1,
            revision: 0,
            notifier: Notifier::new(),
        }
    }

    /// Loads a whole stream into a new database. Fails with the first error of the
    /// stream; no partial database is returned.
    pub async fn load<T: ReadTransport>(transport: T, format: Option<TraceFormat>) -> DbResult<Self> {
        Self::load_with_options(transport, format, DatabaseOptions::default()).await
    }

    pub async fn load_with_options<T: ReadTransport>(
        transport: T,
        format: Option<TraceFormat>,
        options: DatabaseOptions,
    ) -> DbResult<Self> {
        let mut db = Self::with_options(options);
        db.add_stream(transport, format, "stream").await?;
        Ok(db)
    }

    /// Loads a `.wtf-trace` or `.wtf-json` file. Other extensions are detected
    /// from the content.
    #[cfg(any(feature = "runtime-tokio", feature = "runtime-async-std"))]
    #[cfg_attr(docsrs, doc(cfg(any(feature = "runtime-tokio", feature = "runtime-async-std"))))]
    pub async fn load_file(path: &str) -> DbResult<Self> {
        let transport = wtf_trace_cff::FileReadTransport::new(path).await?;
        let mut db = Self::new();
        db.add_stream(transport, TraceFormat::from_path(path), path)
            .await?;
        Ok(db)
    }

    /// Reads another stream into this database, aligned on the sources loaded
    /// before. On error, the events of the chunks fully read so far are kept.
    pub async fn add_stream<T: ReadTransport, S: Into<String>>(
        &mut self,
        transport: T,
        format: Option<TraceFormat>,
        label: S,
    ) -> DbResult<SourceId> {
        let mut source = ChunkedDataSource::new(self, transport, format, label);
        source.run(self).await?;
        Ok(source.id())
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    pub fn subscribe(&mut self) -> Receiver<DatabaseEvent> {
        self.notifier.subscribe()
    }

    /// Bumped at the end of every insertion batch.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn event_type_table(&self) -> &EventTypeTable {
        &self.event_types
    }

    pub fn event_type_table_mut(&mut self) -> &mut EventTypeTable {
        &mut self.event_types
    }

    pub fn get_event_type(&self, name: &str) -> Option<&Arc<EventType>> {
        self.event_types.get_by_name(name)
    }

    pub fn sources(&self) -> &[DataSourceInfo] {
        &self.sources
    }

    pub fn source(&self, id: SourceId) -> Option<&DataSourceInfo> {
        self.sources.get(id.index())
    }

    pub fn add_source(&mut self, label: String, format: Option<TraceFormat>) -> SourceId {
        let id = SourceId::new(self.sources.len());
        self.sources.push(DataSourceInfo::new(id, label, format));
        self.notifier.emit(DatabaseEvent::SourcesChanged);
        id
    }

    pub(crate) fn initialize_source(&mut self, id: SourceId, header: SourceHeader) {
        if let Some(source) = self.sources.get_mut(id.index()) {
            source.initialize(header);
        }
        self.notifier.emit(DatabaseEvent::SourcesChanged);
    }

    pub fn source_error(&mut self, id: SourceId, message: String) {
        log::warn!("Source {id} failed: {message}");
        if let Some(source) = self.sources.get_mut(id.index()) {
            source.fail(message.clone());
        }
        self.notifier.emit(DatabaseEvent::SourceError {
            source: id,
            message,
        });
    }

    pub fn source_ended(&mut self, id: SourceId) {
        if let Some(source) = self.sources.get_mut(id.index()) {
            source.end();
        }
        self.notifier.emit(DatabaseEvent::SourceEnded(id));
    }

    /// The timebase of the first source initialized.
    pub fn common_timebase(&self) -> Option<f64> {
        self.common_timebase
    }

    /// Milliseconds to add to the times of a source with `timebase` to align it
    /// with the first source. The first source defines the common timebase.
    pub fn compute_time_delay(&mut self, timebase: f64) -> f64 {
        match self.common_timebase {
            Some(common) => timebase - common,
            None => {
                self.common_timebase = Some(timebase);
                0.0
            }
        }
    }

    /// A database-wide time range id, so ranges of different sources never collide.
    pub fn allocate_time_range_id(&mut self) -> u32 {
        let id = self.next_time_range_id;
        self.next_time_range_id += 1;
        id
    }

    /// A database-wide flow id, so flows of different sources never collide.
    pub fn allocate_flow_id(&mut self) -> u32 {
        let id = self.next_flow_id;
        self.next_flow_id += 1;
        id
    }

    /// Every flow, across all zones.
    pub fn flow_list(&self) -> &Arc<Mutex<FlowList>> {
        &self.flow_list
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(id.index())
    }

    pub fn zone_mut(&mut self, id: ZoneId) -> Option<&mut Zone> {
        self.zones.get_mut(id.index())
    }

    pub fn default_zone(&self) -> Option<&Zone> {
        self.zone(self.default_zone?)
    }

    /// The default zone, created nameless if no zone exists yet.
    pub fn get_default_zone(&mut self) -> ZoneId {
        match self.default_zone {
            Some(id) => id,
            None => {
                let id = self.push_zone("", ZoneType::Other(String::new()), "");
                self.default_zone = Some(id);
                id
            }
        }
    }

    /// The zone keyed `name:type:location`, created if needed. A nameless default
    /// zone takes on the identity of the first zone created.
    pub fn create_or_get_zone(&mut self, name: &str, zone_type: &str, location: &str) -> ZoneId {
        let key = format!("{name}:{zone_type}:{location}");
        let zone_type: ZoneType = zone_type.parse().unwrap_or_default();
        if let Some(id) = self.default_zone {
            let zone = &mut self.zones[id.index()];
            if zone.name().is_empty() {
                zone.reset_info(name, zone_type, location);
                self.zones_by_key.insert(key, id);
                return id;
            }
        }
        if let Some(id) = self.zones_by_key.get(&key) {
            return *id;
        }
        let id = self.push_zone(name, zone_type, location);
        self.zones_by_key.insert(key, id);
        if self.default_zone.is_none() {
            self.default_zone = Some(id);
        }
        id
    }

    fn push_zone(&mut self, name: &str, zone_type: ZoneType, location: &str) -> ZoneId {
        let id = ZoneId::new(self.zones.len());
        log::debug!("Zone {id} created: {name} ({zone_type}) {location}");
        self.zones.push(Zone::new(
            id,
            name,
            zone_type,
            location,
            self.options.max_scope_depth,
            &self.event_types,
        ));
        id
    }

    pub fn is_inserting(&self) -> bool {
        self.inserting.is_some()
    }

    pub fn begin_inserting_events(&mut self) -> DbResult<()> {
        if self.inserting.is_some() {
            return Err(DbErr::AlreadyInserting);
        }
        let nameless_default =
            self.zones.len() == 1 && self.zones[0].name().is_empty();
        self.inserting = Some(if nameless_default { 0 } else { self.zones.len() });
        Ok(())
    }

    /// Appends an event to a zone. It only shows in queries after the batch ends.
    pub fn insert_event(
        &mut self,
        zone: ZoneId,
        event_type: Arc<EventType>,
        time: f64,
        args: Option<Arguments>,
    ) -> usize {
        self.zones[zone.index()]
            .event_list_mut()
            .insert(event_type, time, args)
    }

    /// Rebuilds every zone and the flows between them, then announces new zones and the invalidation.
    pub fn end_inserting_events(&mut self) -> DbResult<()> {
        let beginning = self.inserting.take().ok_or(DbErr::NotInserting)?;
        let mut first = f64::MAX;
        let mut last = f64::MIN;
        for zone in self.zones.iter_mut() {
            let list = zone.event_list_mut();
            list.rebuild(&mut self.event_types);
            if !list.is_empty() {
                first = first.min(list.first_event_time());
                last = last.max(list.last_event_time());
            }
        }
        if first > last {
            first = 0.0;
            last = 0.0;
        }
        self.flow_list
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rebuild(&self.zones, &self.event_types);
        self.first_event_time = first;
        self.last_event_time = last;
        self.revision += 1;

        if beginning < self.zones.len() {
            let added = self.zones[beginning..].iter().map(Zone::id).collect();
            self.notifier.emit(DatabaseEvent::ZonesAdded(added));
        }
        self.notifier.emit(DatabaseEvent::Invalidated);
        Ok(())
    }

    pub fn first_event_time(&self) -> f64 {
        self.first_event_time
    }

    pub fn last_event_time(&self) -> f64 {
        self.last_event_time
    }

    /// The frame list of the first zone that has frames.
    pub fn get_first_frame_list(&self) -> Option<Arc<Mutex<FrameList>>> {
        self.zones
            .iter()
            .find(|zone| {
                let frames = zone.frame_list().lock();
                !frames.unwrap_or_else(PoisonError::into_inner).is_empty()
            })
            .map(|zone| zone.frame_list().clone())
    }

    /// Total number of events across every zone.
    pub fn total_event_count(&self) -> usize {
        self.zones.iter().map(|z| z.event_list().len()).sum()
    }
}
