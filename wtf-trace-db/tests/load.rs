mod util;
use util::*;

// cargo test --test load --features=test,runtime-tokio -- --nocapture
// cargo test --test load --features=test,runtime-async-std -- --nocapture
#[cfg(feature = "test")]
#[cfg_attr(feature = "runtime-tokio", tokio::test)]
#[cfg_attr(feature = "runtime-async-std", async_std::test)]
async fn main() -> anyhow::Result<()> {
    use wtf_trace_cff::{
        BinaryStreamTarget, JsonMode, JsonStreamTarget, MemoryReadTransport, MemoryWriteTransport,
        StreamTarget, TraceFormat,
    };
    use wtf_trace_db::Database;

    env_logger::init();
    let chunks = sample_trace(1_000.0)?;

    let mut target = BinaryStreamTarget::new(MemoryWriteTransport::new())?;
    target.write_chunks(chunks.iter())?;
    target.end()?;
    let binary = target.into_transport().into_data();

    let mut target = JsonStreamTarget::new(MemoryWriteTransport::new(), JsonMode::Partial)?;
    target.write_chunks(chunks.iter())?;
    target.end()?;
    let json = target.into_transport().into_data();

    let path = std::env::temp_dir().join("wtf-trace-db-load.wtf-trace");
    std::fs::write(&path, &binary)?;
    let db = Database::load_file(&path.to_string_lossy()).await?;
    check(&db)?;
    std::fs::remove_file(&path)?;

    for (bytes, format) in [(binary, Some(TraceFormat::Binary)), (json, None)] {
        let transport = MemoryReadTransport::new(bytes).with_segment_size(7);
        let db = Database::load(transport, format).await?;
        check(&db)?;
    }
    println!("Load ... ok");

    Ok(())
}

#[cfg(feature = "test")]
fn check(db: &wtf_trace_db::Database) -> anyhow::Result<()> {
    use wtf_trace_db::{EventStatistics, SortMode};
    use wtf_trace_types::Value;

    assert_eq!(db.zones().len(), 1);
    let zone = &db.zones()[0];
    assert_eq!(zone.info_string(), "main (script)\napp.js");
    assert_eq!(db.first_event_time(), 0.0);
    assert_eq!(db.last_event_time(), 33.0);

    let source = &db.sources()[0];
    assert!(source.is_initialized());
    assert!(source.is_ended());
    assert_eq!(source.header().map(|h| h.timebase), Some(1_000.0));

    let list = zone.event_list();
    assert_eq!(list.len(), 12);
    let update = list.get_event(2);
    assert_eq!(update.name(), "app#update");
    assert!(update.is_scope());
    assert_eq!(update.end_time(), 4.0);
    assert_eq!(update.total_duration(), 3.0);
    assert_eq!(update.argument("frame").and_then(Value::as_u32), Some(1));
    let log = list.get_event(3);
    assert_eq!(log.argument("message").and_then(Value::as_str), Some("hello"));
    assert_eq!(log.parent().map(|p| p.index()), Some(2));
    assert_eq!(list.get_index_of_root_scope_including_time(2.5), 2);

    {
        let frames = zone.frame_list().lock().unwrap();
        assert_eq!(frames.len(), 2);
        let first = frames.get_frame(1).unwrap();
        assert_eq!((first.time(), first.end_time()), (0.0, 16.0));
        assert_eq!(frames.get_frame_at_time(20.0).map(|f| f.number()), Some(2));
        let (before, after) = frames.get_intra_frame_at_time(16.2);
        assert_eq!(before.map(|f| f.number()), Some(1));
        assert_eq!(after.map(|f| f.number()), Some(2));
    }
    assert!(db.get_first_frame_list().is_some());

    {
        let marks = zone.mark_list().lock().unwrap();
        assert_eq!(marks.len(), 1);
        assert_eq!(marks.marks()[0].name(), "load");
        assert_eq!(marks.marks()[0].end_time(), 33.0);
    }
    {
        let ranges = zone.time_range_list().lock().unwrap();
        assert_eq!(ranges.len(), 1);
        let net = &ranges.time_ranges()[0];
        assert_eq!(net.id(), 1);
        assert_eq!(net.name(), "net");
        assert_eq!((net.time(), net.end_time()), (3.0, 20.0));
    }
    {
        let flows = db.flow_list().lock().unwrap();
        let request = flows.get_flow_by_id(1).unwrap();
        assert!(request.is_terminated());
        assert_eq!(request.end_time(), 8.0);
        assert_eq!(request.data().get("value").and_then(Value::as_str), Some("ok"));
    }

    let mut statistics = EventStatistics::new();
    let table = statistics.get_full_table(db);
    let entry = table.get_event_type_entry("app#update").unwrap();
    assert_eq!(entry.count(), 1);
    assert_eq!(entry.total_time(), 3.0);
    assert_eq!(entry.own_time(), 3.0);
    assert_eq!(table.get_event_type_entry("app#log").map(|e| e.count()), Some(1));
    assert_eq!(table.sorted_entries(SortMode::TotalTime)[0].name(), "app#update");
    let selected = statistics.get_table(db, 10.0, 40.0);
    assert!(selected.get_event_type_entry("app#update").is_none());

    Ok(())
}
