#![allow(dead_code)]
use wtf_trace_cff::{Chunk, FileHeaderPart};
use wtf_trace_db::{DbResult, EventBufferBuilder};
use wtf_trace_types::{
    Arguments, ContextInfo, EventFlags, EventTypeDef, FileFlags, ScriptContextInfo, Value,
};

pub fn header(id: u32, timebase: f64) -> Chunk {
    Chunk::file_header(
        id,
        FileHeaderPart::new(
            FileFlags::HAS_HIGH_RESOLUTION_TIMES,
            timebase,
            ContextInfo::Script(ScriptContextInfo {
                uri: "http://example.com/app".to_owned(),
                ..Default::default()
            }),
        ),
    )
}

fn args() -> Arguments {
    Arguments::new()
}

/// Two frames of an app with a scope, a mark, a time range and a flow, in zone `main`.
pub fn sample_trace(timebase: f64) -> DbResult<Vec<Chunk>> {
    let mut builder = EventBufferBuilder::with_string_table();
    builder.define(EventTypeDef::scope("app#update(uint32 frame)", EventFlags::empty())?)?;
    builder.define(EventTypeDef::instance("app#log(ascii message)", EventFlags::empty())?)?;
    builder.append(
        "wtf.zone#create",
        0.0,
        &args()
            .with("zoneId", 1u32)
            .with("name", "main")
            .with("type", "script")
            .with("location", "app.js"),
    )?;
    builder.append("wtf.zone#set", 0.0, &args().with("zoneId", 1u32))?;
    builder.append("wtf.timing#frameStart", 0.0, &args().with("number", 1u32))?;
    builder.append("wtf.trace#mark", 0.5, &args().with("name", "load").with("value", Value::Null))?;
    builder.append("app#update", 1.0, &args().with("frame", 1u32))?;
    builder.append("app#log", 2.0, &args().with("message", "hello"))?;
    builder.append(
        "wtf.timeRange#begin",
        3.0,
        &args().with("id", 5u32).with("name", "net").with("value", Value::Null),
    )?;
    builder.append("wtf.scope#leave", 4.0, &args())?;
    builder.append(
        "wtf.flow#branch",
        5.0,
        &args()
            .with("id", 1u32)
            .with("parentId", 0u32)
            .with("name", "request")
            .with("value", Value::Null),
    )?;
    builder.append("wtf.flow#terminate", 8.0, &args().with("id", 1u32).with("value", "ok"))?;
    builder.append("wtf.timing#frameEnd", 16.0, &args().with("number", 1u32))?;
    builder.append("wtf.timing#frameStart", 16.5, &args().with("number", 2u32))?;
    builder.append("wtf.timeRange#end", 20.0, &args().with("id", 5u32))?;
    builder.append("wtf.timing#frameEnd", 33.0, &args().with("number", 2u32))?;
    Ok(vec![
        header(1, timebase),
        Chunk::event_data(2, builder.finish())?.with_time_range(0, 33_000),
    ])
}
