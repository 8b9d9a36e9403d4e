#![allow(dead_code)]
use serde_json::json;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use wtf_trace_cff::{Chunk, FileHeaderPart, Part};
use wtf_trace_types::{ContextInfo, FileFlags, ScriptContextInfo, StringTable};

pub fn temp_path(name: &str, extension: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let path = std::env::temp_dir().join(format!("{name}-{millis}.{extension}"));
    path.to_string_lossy().into_owned()
}

pub async fn sleep(millis: u64) {
    #[cfg(feature = "runtime-tokio")]
    tokio::time::sleep(Duration::from_millis(millis)).await;
    #[cfg(feature = "runtime-async-std")]
    async_std::task::sleep(Duration::from_millis(millis)).await;
}

/// A file header chunk followed by event data chunks using every part type.
pub fn sample_chunks() -> Vec<Chunk> {
    let mut table = StringTable::new();
    table.add_string("first");
    table.add_string("second");
    let header = FileHeaderPart::new(
        FileFlags::HAS_HIGH_RESOLUTION_TIMES,
        1_360_000_000_000.0,
        ContextInfo::Script(ScriptContextInfo {
            uri: "http://example.com/app".to_owned(),
            title: Some("App".to_owned()),
            ..Default::default()
        }),
    );
    vec![
        Chunk::file_header(1, header),
        Chunk::event_data(
            2,
            vec![
                Part::StringTable(table),
                Part::BinaryEventBuffer((0..=250).collect()),
                Part::StringResource("resource".to_owned()),
                Part::BinaryResource(vec![7; 3]),
            ],
        )
        .unwrap()
        .with_time_range(0, 1000),
        Chunk::event_data(3, vec![Part::LegacyEventBuffer(vec![1, 2, 3])]).unwrap(),
        Chunk::event_data(
            4,
            vec![Part::JsonEventBuffer(vec![
                json!({ "event": "app#load", "time": 12.5, "args": { "url": "/" } }),
            ])],
        )
        .unwrap()
        .with_time_range(1000, 2000),
    ]
}
