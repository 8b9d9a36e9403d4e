#[cfg(feature = "runtime-tokio")]
pub use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncReadExt, AsyncWriteExt},
    task::{spawn as spawn_task, JoinHandle as TaskHandle},
};

#[cfg(feature = "runtime-async-std")]
pub use async_std::{
    fs::{File, OpenOptions},
    io::{ReadExt as AsyncReadExt, WriteExt as AsyncWriteExt},
    task::{spawn as spawn_task, JoinHandle as TaskHandle},
};
