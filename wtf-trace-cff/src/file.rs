use flume::{bounded, r#async::RecvFut, unbounded, Receiver, Sender};
use futures::FutureExt;
use std::future::Future;

use crate::{
    runtime::{spawn_task, AsyncReadExt, AsyncWriteExt, File, OpenOptions, TaskHandle},
    Bytes, CffErr, CffResult, ReadTransport, TransportEvent, WriteTransport,
};

pub const BUFFER_SIZE: usize = 1024;

/// Reads a file from start to end on a background task.
///
/// The channel has no capacity, so the consumer controls the pace: the task reads
/// the next block only after the previous one has been received.
pub struct FileReadTransport {
    receiver: Option<Receiver<CffResult<TransportEvent>>>,
    ended: bool,
    _handle: TaskHandle<()>,
}

/// Buffered file writer. Writes are queued to a background task and never block.
pub struct FileWriteTransport {
    sender: Sender<Request>,
    update: Receiver<Update>,
    marker: u32,
    _handle: TaskHandle<()>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Truncate the file
    #[default]
    Truncate,
    /// Append to the file
    Append,
}

#[derive(Debug)]
enum Request {
    Bytes(Bytes),
    Flush(u32),
}

#[derive(Debug)]
enum Update {
    Error(CffErr),
    Receipt(u32),
}

impl std::fmt::Debug for FileReadTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReadTransport")
            .field("disposed", &self.receiver.is_none())
            .field("ended", &self.ended)
            .finish()
    }
}

impl std::fmt::Debug for FileWriteTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWriteTransport")
            .field("marker", &self.marker)
            .finish()
    }
}

impl FileReadTransport {
    #[inline]
    pub async fn new(path: &str) -> CffResult<Self> {
        Self::with_buffer_size(path, BUFFER_SIZE).await
    }

    pub async fn with_buffer_size(path: &str, buffer_size: usize) -> CffResult<Self> {
        let file = File::open(path).await.map_err(CffErr::IoError)?;
        let total = file.metadata().await.ok().map(|m| m.len());
        let (sender, receiver) = bounded(0);
        let handle = Self::spawn_task(file, total, buffer_size.max(1), sender, path.to_owned());
        Ok(Self {
            receiver: Some(receiver),
            ended: false,
            _handle: handle,
        })
    }

    fn spawn_task(
        mut file: File,
        total: Option<u64>,
        buffer_size: usize,
        sender: Sender<CffResult<TransportEvent>>,
        path: String,
    ) -> TaskHandle<()> {
        spawn_task(async move {
            let mut buffer = vec![0u8; buffer_size];
            let mut loaded = 0u64;
            if sender
                .send_async(Ok(TransportEvent::Progress { loaded, total }))
                .await
                .is_err()
            {
                return;
            }
            while !sender.is_disconnected() {
                let bytes_read = match file.read(&mut buffer).await {
                    Ok(bytes_read) => bytes_read,
                    Err(e) => {
                        if let Err(e) = sender.send_async(Err(CffErr::IoError(e))).await {
                            log::error!("{:?}", e.into_inner());
                        }
                        break;
                    }
                };
                if bytes_read == 0 {
                    if sender.send_async(Ok(TransportEvent::End)).await.is_err() {
                        log::debug!("FileReadTransport: receiver gone before end ({})", path);
                    }
                    break;
                }
                loaded += bytes_read as u64;
                let bytes = match bytes_read {
                    1 => Bytes::Byte(buffer[0]),
                    4 => Bytes::Word([buffer[0], buffer[1], buffer[2], buffer[3]]),
                    _ => Bytes::from(&buffer[..bytes_read]),
                };
                if sender.send_async(Ok(TransportEvent::Data(bytes))).await.is_err()
                    || sender
                        .send_async(Ok(TransportEvent::Progress { loaded, total }))
                        .await
                        .is_err()
                {
                    break;
                }
            }
            log::debug!("FileReadTransport task finish ({})", path);
        })
    }
}

impl ReadTransport for FileReadTransport {
    type Future<'a> = FileReceive<'a>;

    fn receive(&mut self) -> Self::Future<'_> {
        FileReceive {
            future: self.receiver.as_ref().map(|r| r.recv_async()),
            ended: &mut self.ended,
        }
    }

    fn dispose(&mut self) {
        // dropping the receiver stops the task
        self.receiver.take();
    }
}

pub struct FileReceive<'a> {
    future: Option<RecvFut<'a, CffResult<TransportEvent>>>,
    ended: &'a mut bool,
}

impl<'a> std::fmt::Debug for FileReceive<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReceive")
            .field("ended", &self.ended)
            .finish()
    }
}

impl<'a> Future for FileReceive<'a> {
    type Output = CffResult<TransportEvent>;

    fn poll(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        use std::task::Poll::{Pending, Ready};

        let this = &mut *self;
        let future = match this.future.as_mut() {
            Some(future) => future,
            None => return Ready(Err(CffErr::Disposed)),
        };
        if *this.ended {
            return Ready(Ok(TransportEvent::End));
        }
        match future.poll_unpin(cx) {
            Ready(Ok(Ok(TransportEvent::End))) => {
                *this.ended = true;
                Ready(Ok(TransportEvent::End))
            }
            Ready(Ok(res)) => Ready(res),
            // Channel closed
            Ready(Err(_)) => Ready(Err(CffErr::TaskDead("file read"))),
            Pending => Pending,
        }
    }
}

impl FileWriteTransport {
    pub async fn new(path: &str, mode: WriteMode) -> CffResult<Self> {
        let mut options = OpenOptions::new();
        options.write(true).create(true);
        match mode {
            WriteMode::Truncate => options.truncate(true),
            WriteMode::Append => options.append(true),
        };
        let mut file = options.open(path).await.map_err(CffErr::IoError)?;
        let (sender, pending) = unbounded();
        // receipts queue up until awaited, the task never waits on them
        let (notify, update) = unbounded();
        let path = path.to_owned();

        let handle = spawn_task(async move {
            while let Ok(request) = pending.recv_async().await {
                match request {
                    Request::Bytes(bytes) => {
                        if let Err(e) = file.write_all(bytes.as_slice()).await {
                            std::mem::drop(pending); // trigger error
                            send_error(&notify, CffErr::IoError(e)).await;
                            break;
                        }
                    }
                    Request::Flush(marker) => {
                        if let Err(e) = file.flush().await {
                            std::mem::drop(pending); // trigger error
                            send_error(&notify, CffErr::IoError(e)).await;
                            break;
                        }
                        if notify.send_async(Update::Receipt(marker)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            log::debug!("FileWriteTransport task finish ({})", path);
        });

        async fn send_error(notify: &Sender<Update>, e: CffErr) {
            if let Err(e) = notify.send_async(Update::Error(e)).await {
                log::error!("{:?}", e.into_inner());
            }
        }

        Ok(Self {
            sender,
            update,
            marker: 0,
            _handle: handle,
        })
    }

    fn return_err(&mut self) -> CffResult<()> {
        Err(loop {
            match self.update.try_recv() {
                Ok(Update::Error(err)) => break err,
                Ok(Update::Receipt(_)) => (),
                Err(_) => break CffErr::TaskDead("file write"),
            }
        })
    }

    /// Waits for the next flush receipt, returning its marker.
    pub async fn receipt(&mut self) -> CffResult<u32> {
        match self.update.recv_async().await {
            Ok(Update::Receipt(receipt)) => Ok(receipt),
            Ok(Update::Error(err)) => Err(err),
            Err(_) => Err(CffErr::TaskDead("file write")),
        }
    }

    /// Flushes and waits until everything written so far has reached the file.
    pub async fn sync(&mut self) -> CffResult<()> {
        self.flush()?;
        let marker = self.marker;
        loop {
            if self.receipt().await? == marker {
                return Ok(());
            }
        }
    }

    /// Flushes, waits, then stops the background task.
    pub async fn close(mut self) -> CffResult<()> {
        self.sync().await
    }
}

impl WriteTransport for FileWriteTransport {
    /// This method never blocks
    fn write(&mut self, bytes: Bytes) -> CffResult<()> {
        if self.sender.send(Request::Bytes(bytes)).is_err() {
            self.return_err()
        } else {
            Ok(())
        }
    }

    /// Queues a flush; its receipt can be awaited with [`FileWriteTransport::receipt`].
    fn flush(&mut self) -> CffResult<()> {
        self.marker += 1;
        if self.sender.send(Request::Flush(self.marker)).is_err() {
            self.return_err()
        } else {
            Ok(())
        }
    }
}
