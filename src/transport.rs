//! Tokio helpers for running an endpoint over an async byte link.
//!
//! The endpoint core is synchronous and byte-oriented; these helpers bridge
//! it to an `AsyncRead`/`AsyncWrite` pair (a serial port, a socket, a test
//! duplex):
//!
//! ```text
//! Endpoint tx ─► channel_writer ─► unbounded queue ─► writer task ─► link
//! link ─► pump_reader ─► Endpoint::receive_all ─► dispatch
//! ```
//!
//! The writer task batches queued bytes into chunked writes so per-byte
//! emission from the frame layer does not become per-byte syscalls.
//! Hosts that own a real UART driver need none of this - any `FnMut(u8)`
//! writer plus calls to [`Endpoint::receive_all`] is the whole contract.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::protocol::ByteWriter;

/// Maximum bytes drained from the queue per write.
pub const MAX_WRITE_BATCH: usize = 256;

/// Read chunk size for the reader pump.
const READ_CHUNK: usize = 512;

/// Create a queue-backed byte writer and its drain half.
///
/// The returned closure is the endpoint's `ByteWriter`; hand the receiver to
/// [`spawn_writer_task`]. If the drain is dropped the link behaves like an
/// unplugged cable: bytes are discarded silently.
pub fn channel_writer() -> (impl FnMut(u8) + Send + 'static, mpsc::UnboundedReceiver<u8>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |byte: u8| {
            let _ = tx.send(byte);
        },
        rx,
    )
}

/// Spawn the writer task: drains the byte queue into `sink`, batching
/// whatever is immediately available into single writes.
///
/// Completes cleanly when every writer handle is dropped.
pub fn spawn_writer_task<T>(
    mut queue: mpsc::UnboundedReceiver<u8>,
    mut sink: T,
) -> JoinHandle<Result<()>>
where
    T: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut batch = Vec::with_capacity(MAX_WRITE_BATCH);
        loop {
            let Some(first) = queue.recv().await else {
                // Queue closed, clean shutdown.
                return Ok(());
            };
            batch.clear();
            batch.push(first);
            while batch.len() < MAX_WRITE_BATCH {
                match queue.try_recv() {
                    Ok(byte) => batch.push(byte),
                    Err(_) => break,
                }
            }
            sink.write_all(&batch).await?;
            sink.flush().await?;
        }
    })
}

/// Feed bytes from `reader` into the endpoint until EOF.
///
/// Dispatch (handshake handling, listeners, the default handler) runs on
/// the caller's task, inside this future.
pub async fn pump_reader<R, W>(mut reader: R, ep: &mut Endpoint<W>) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: ByteWriter,
{
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        ep.receive_all(&buf[..n]);
    }
}
