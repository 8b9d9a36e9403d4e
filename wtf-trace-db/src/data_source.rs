use crate::{Database, DbErr, DbResult, EventParser};
use serde_json::{Map, Value as JsonValue};
use std::fmt::Display;
use wtf_trace_cff::{
    AnyDecoder, ChunkErr, Chunk, ChunkType, FileHeaderPart, Part, ReadTransport, StreamSource,
    TraceFormat,
};
use wtf_trace_types::{ContextInfo, FileFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Identifies a source within its database.
pub struct SourceId(u32);

/// What the database knows about a source it loads events from.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceInfo {
    id: SourceId,
    label: String,
    format: Option<TraceFormat>,
    header: Option<SourceHeader>,
    error: Option<String>,
    ended: bool,
}

/// The file header of a source, and the delay aligning its times on the database.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceHeader {
    pub context_info: ContextInfo,
    pub flags: FileFlags,
    pub metadata: Map<String, JsonValue>,
    /// Wall clock origin of the source times, in milliseconds.
    pub timebase: f64,
    /// Milliseconds added to every time of the source.
    pub time_delay: f64,
}

impl SourceId {
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

impl Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl DataSourceInfo {
    pub(crate) fn new(id: SourceId, label: String, format: Option<TraceFormat>) -> Self {
        Self {
            id,
            label,
            format,
            header: None,
            error: None,
            ended: false,
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    /// A file name or any other description given when the source was added.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// `None` if the format is detected from the stream.
    pub fn format(&self) -> Option<TraceFormat> {
        self.format
    }

    pub fn is_initialized(&self) -> bool {
        self.header.is_some()
    }

    pub fn header(&self) -> Option<&SourceHeader> {
        self.header.as_ref()
    }

    pub fn time_delay(&self) -> f64 {
        self.header.as_ref().map(|h| h.time_delay).unwrap_or_default()
    }

    /// The error that stopped the source.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub(crate) fn initialize(&mut self, header: SourceHeader) {
        self.header = Some(header);
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.error = Some(message);
    }

    pub(crate) fn end(&mut self) {
        self.ended = true;
    }
}

/// Feeds the chunks of a stream into a database.
///
/// The file header chunk initializes the source; every event data chunk after it
/// is parsed into the zones of the database.
#[derive(Debug)]
pub struct ChunkedDataSource<T: ReadTransport> {
    id: SourceId,
    source: StreamSource<T, AnyDecoder>,
    parser: EventParser,
}

impl<T: ReadTransport> ChunkedDataSource<T> {
    /// Registers a new source on `db`. With no `format`, it is detected from the
    /// first bytes of the stream.
    pub fn new<S: Into<String>>(
        db: &mut Database,
        transport: T,
        format: Option<TraceFormat>,
        label: S,
    ) -> Self {
        let decoder = match format {
            Some(format) => format.decoder(),
            None => AnyDecoder::new(),
        };
        let id = db.add_source(label.into(), format);
        Self {
            id,
            source: StreamSource::with_decoder(transport, decoder),
            parser: EventParser::new(),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Reads the stream to its end, inside one insertion batch. Returns the number
    /// of events inserted.
    ///
    /// On error the stream is disposed and the error recorded on the source. Events
    /// of the chunks processed before the error stay in the database; the failing
    /// chunk adds nothing.
    pub async fn run(&mut self, db: &mut Database) -> DbResult<usize> {
        db.begin_inserting_events()?;
        let result = self.read_to_end(db).await;
        db.end_inserting_events()?;
        match result {
            Ok(count) => {
                log::debug!("Source {} ended with {count} events", self.id);
                db.source_ended(self.id);
                Ok(count)
            }
            Err(e) => {
                self.source.dispose();
                db.source_error(self.id, e.to_string());
                Err(e)
            }
        }
    }

    async fn read_to_end(&mut self, db: &mut Database) -> DbResult<usize> {
        let mut count = 0;
        while let Some(chunk) = self.source.next_chunk().await? {
            count += self.process_chunk(db, &chunk)?;
        }
        Ok(count)
    }

    /// Applies one chunk, entirely or not at all. Returns the number of events
    /// inserted.
    pub fn process_chunk(&mut self, db: &mut Database, chunk: &Chunk) -> DbResult<usize> {
        let initialized = db
            .source(self.id)
            .map(DataSourceInfo::is_initialized)
            .unwrap_or_default();
        match chunk.chunk_type() {
            ChunkType::FileHeader => {
                if initialized {
                    return Err(DbErr::AlreadyInitialized);
                }
                let header = chunk
                    .file_header_part()
                    .ok_or(ChunkErr::MissingPart("file_header"))
                    .map_err(wtf_trace_cff::CffErr::from)?;
                self.initialize(db, header);
                Ok(0)
            }
            ChunkType::EventData => {
                if !initialized {
                    return Err(DbErr::NotInitialized);
                }
                match chunk.event_buffer() {
                    Some(Part::BinaryEventBuffer(data)) | Some(Part::LegacyEventBuffer(data)) => {
                        self.parser.parse_binary(db, data, chunk.string_table())
                    }
                    Some(Part::JsonEventBuffer(entries)) => self.parser.parse_json(db, entries),
                    _ => Ok(0),
                }
            }
        }
    }

    fn initialize(&mut self, db: &mut Database, header: &FileHeaderPart) {
        let time_delay = db.compute_time_delay(header.timebase);
        self.parser.set_time_delay(time_delay);
        log::debug!(
            "Source {} timebase {} delay {time_delay}",
            self.id,
            header.timebase
        );
        db.initialize_source(
            self.id,
            SourceHeader {
                context_info: header.context_info.clone(),
                flags: header.flags,
                metadata: header.metadata.clone(),
                timebase: header.timebase,
                time_delay,
            },
        );
    }

    /// Stops reading. The source yields nothing more.
    pub fn dispose(&mut self) {
        self.source.dispose();
    }
}
