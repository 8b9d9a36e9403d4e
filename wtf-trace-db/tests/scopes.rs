mod util;
use util::*;

// cargo test --test scopes --features=test,runtime-tokio -- --nocapture
// cargo test --test scopes --features=test,runtime-async-std -- --nocapture
#[cfg(feature = "test")]
#[cfg_attr(feature = "runtime-tokio", tokio::test)]
#[cfg_attr(feature = "runtime-async-std", async_std::test)]
async fn main() -> anyhow::Result<()> {
    use wtf_trace_cff::{BinaryStreamTarget, Chunk, MemoryReadTransport, MemoryWriteTransport, StreamTarget};
    use wtf_trace_db::{Database, DatabaseOptions, EventBufferBuilder};
    use wtf_trace_types::{Arguments, EventFlags, EventTypeDef};

    env_logger::init();

    fn serialize(chunks: &[Chunk]) -> anyhow::Result<Vec<u8>> {
        let mut target = BinaryStreamTarget::new(MemoryWriteTransport::new())?;
        target.write_chunks(chunks.iter())?;
        target.end()?;
        Ok(target.into_transport().into_data())
    }

    // a leave targeting depth 0 while two scopes are open
    let mut builder = EventBufferBuilder::new();
    builder.define(EventTypeDef::instance(
        "wtf.scope#leave(uint32 depth)",
        EventFlags::BUILTIN | EventFlags::INTERNAL,
    )?)?;
    builder.define(EventTypeDef::scope("app#a", EventFlags::empty())?)?;
    builder.define(EventTypeDef::scope("app#b", EventFlags::empty())?)?;
    builder.append("app#a", 1.0, &Arguments::new())?;
    builder.append("app#b", 2.0, &Arguments::new())?;
    builder.append("wtf.scope#leave", 3.0, &Arguments::new().with("depth", 0u32))?;
    let unbalanced = serialize(&[header(1, 0.0), Chunk::event_data(2, builder.finish())?])?;

    let db = Database::load(MemoryReadTransport::new(unbalanced.clone()), None).await?;
    let list = db.zones()[0].event_list();
    assert_eq!(list.len(), 4);
    let (a, b) = (list.get_event(0), list.get_event(1));
    assert_eq!((a.name(), a.end_time(), a.depth()), ("app#a", 3.0, 0));
    assert_eq!((b.name(), b.end_time(), b.depth()), ("app#b", 3.0, 1));
    println!("Unbalanced leave ... ok");

    let options = DatabaseOptions {
        synthesize_unbalanced_leaves: false,
        ..Default::default()
    };
    let db = Database::load_with_options(MemoryReadTransport::new(unbalanced.clone()), None, options).await?;
    let list = db.zones()[0].event_list();
    assert_eq!(list.len(), 3);
    assert!(list.get_event(1).is_scope());
    assert!(!list.get_event(0).is_scope());
    println!("Unbalanced leave, not synthesized ... ok");

    // the built-in leave has no depth, so it closes one scope and nothing more
    let mut builder = EventBufferBuilder::new();
    builder.define(EventTypeDef::scope("app#a", EventFlags::empty())?)?;
    builder.define(EventTypeDef::scope("app#b", EventFlags::empty())?)?;
    builder.append("app#a", 1.0, &Arguments::new())?;
    builder.append("app#b", 2.0, &Arguments::new())?;
    builder.append("wtf.scope#leave", 3.0, &Arguments::new())?;
    let plain = serialize(&[header(1, 0.0), Chunk::event_data(2, builder.finish())?])?;
    let mut db = Database::load(MemoryReadTransport::new(plain), None).await?;
    let list = db.zones()[0].event_list();
    assert_eq!(list.len(), 3);
    assert_eq!(list.get_event(1).end_time(), 3.0);
    let leave = db.get_event_type("wtf.scope#leave").cloned();
    assert_eq!(leave.map(|t| t.args().len()), Some(0));

    // a later source still balances with the depth of its own leave
    db.add_stream(MemoryReadTransport::new(unbalanced.clone()), None, "depth")
        .await?;
    assert_eq!(db.zones()[0].event_list().len(), 3 + 4);
    println!("Built-in leave ... ok");

    // events arriving out of order are sorted by the rebuild
    let mut builder = EventBufferBuilder::new();
    builder.define(EventTypeDef::instance("app#sample(uint32 n)", EventFlags::empty())?)?;
    let mut times: Vec<f64> = (0..200).map(|_| fastrand::u32(0..1_000_000) as f64 / 1000.0).collect();
    for (n, time) in times.iter().enumerate() {
        builder.append("app#sample", *time, &Arguments::new().with("n", n as u32))?;
    }
    let shuffled = serialize(&[header(1, 0.0), Chunk::event_data(2, builder.finish())?])?;
    let db = Database::load(MemoryReadTransport::new(shuffled).with_segment_size(64), None).await?;
    let list = db.zones()[0].event_list();
    times.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(list.times(), times.as_slice());
    for (n, time) in times.iter().enumerate() {
        let found = list.binary_search_by_time(*time);
        assert_eq!(found.map(|i| list.times()[i]), Ok(*time));
        assert!(found.map(|i| i <= n).unwrap_or_default());
    }
    println!("Time order ... ok");

    Ok(())
}
