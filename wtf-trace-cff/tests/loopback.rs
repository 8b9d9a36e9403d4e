mod util;
use util::*;

// cargo test --test loopback --features=test,runtime-tokio -- --nocapture
// cargo test --test loopback --features=test,runtime-async-std -- --nocapture
#[cfg(feature = "test")]
#[cfg_attr(feature = "runtime-tokio", tokio::test)]
#[cfg_attr(feature = "runtime-async-std", async_std::test)]
async fn main() -> anyhow::Result<()> {
    use wtf_trace_cff::{
        BinaryStreamSource, BinaryStreamTarget, Bytes, FileReadTransport, FileWriteTransport,
        JsonMode, JsonStreamSource, JsonStreamTarget, ReadTransport, StreamTarget, TransportEvent,
        WriteMode, WriteTransport,
    };

    const TEST: &str = "loopback";
    env_logger::init();

    let path = temp_path(TEST, "bin");
    let mut sink = FileWriteTransport::new(&path, WriteMode::Truncate).await?;
    sink.write(Bytes::Word([1, 2, 3, 4]))?;
    sink.write(Bytes::from(vec![5, 6, 7]))?;
    sink.sync().await?;

    let mut source = FileReadTransport::with_buffer_size(&path, 2).await?;
    let mut read = Vec::new();
    loop {
        match source.receive().await? {
            TransportEvent::Data(bytes) => read.extend_from_slice(bytes.as_slice()),
            TransportEvent::Progress { total, .. } => assert_eq!(total, Some(7)),
            TransportEvent::End => break,
        }
    }
    assert_eq!(read, vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(source.receive().await?, TransportEvent::End);
    println!("Bytes ... ok");

    let mut sink = FileWriteTransport::new(&path, WriteMode::Append).await?;
    sink.write(Bytes::Byte(8))?;
    sink.close().await?;
    assert_eq!(std::fs::read(&path)?.len(), 8);
    println!("Append ... ok");

    let path = temp_path(TEST, "flush");
    let mut sink = FileWriteTransport::new(&path, WriteMode::Truncate).await?;
    for byte in 1..=3 {
        sink.write(Bytes::Byte(byte))?;
        sink.flush()?;
    }
    // no receipt is awaited, yet every write has to land
    let mut size = 0;
    for _ in 0..200 {
        size = std::fs::metadata(&path)?.len();
        if size == 3 {
            break;
        }
        sleep(10).await;
    }
    assert_eq!(size, 3);
    assert_eq!(sink.receipt().await?, 1);
    sink.write(Bytes::Byte(4))?;
    sink.close().await?;
    assert_eq!(std::fs::read(&path)?, vec![1, 2, 3, 4]);
    println!("Unawaited flush ... ok");

    let chunks = sample_chunks();
    let path = temp_path(TEST, "wtf-trace");
    let mut target =
        BinaryStreamTarget::new(FileWriteTransport::new(&path, WriteMode::Truncate).await?)?;
    target.write_chunks(chunks.iter())?;
    target.end()?;
    let mut sink = target.into_transport();
    sink.sync().await?;
    let mut source = BinaryStreamSource::new(FileReadTransport::new(&path).await?);
    assert_eq!(source.read_all().await?, chunks);
    println!("Binary file ... ok");

    let path = temp_path(TEST, "wtf-json");
    let mut target = JsonStreamTarget::new(
        FileWriteTransport::new(&path, WriteMode::Truncate).await?,
        JsonMode::Partial,
    )?;
    target.write_chunks(chunks.iter())?;
    target.end()?;
    target.into_transport().close().await?;
    let mut source = JsonStreamSource::new(FileReadTransport::new(&path).await?);
    assert_eq!(source.read_all().await?, chunks);
    println!("JSON file ... ok");

    Ok(())
}
