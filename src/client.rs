//! Per-client MJPEG multipart emission.
//!
//! Each attached `/stream` client is driven by its own task so a slow or
//! stalled client never delays delivery to the others (the Tokio
//! equivalent of the source's non-blocking `bufferevent` writes). The
//! ticker fans out by `try_send`-ing the current frame's bytes into a
//! bounded (capacity 1) channel per client; if the client hasn't drained
//! last tick's frame yet, this tick's frame is simply dropped for it.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::registry::ClientHandle;

pub const BOUNDARY: &str = "boundarydonotcross";

const PREAMBLE: &str = concat!(
    "HTTP/1.0 200 OK\r\n",
    "Access-Control-Allow-Origin: *\r\n",
    "Cache-Control: no-store, no-cache, must-revalidate, pre-check=0, post-check=0, max-age=0\r\n",
    "Pragma: no-cache\r\n",
    "Expires: Mon, 3 Jan 2000 12:34:56 GMT\r\n",
    "Content-Type: multipart/x-mixed-replace;boundary=boundarydonotcross\r\n",
    "\r\n",
    "--boundarydonotcross\r\n",
);

/// Channel capacity of exactly one tick's worth of frame bytes: no queue
/// of pending frames is ever maintained.
pub const TICK_CHANNEL_CAPACITY: usize = 1;

pub fn new_channel() -> (mpsc::Sender<Bytes>, mpsc::Receiver<Bytes>) {
    mpsc::channel(TICK_CHANNEL_CAPACITY)
}

/// Build the bytes for one multipart part (or preamble + first part, if
/// `need_initial`), sampling the wall clock at assembly time.
pub fn format_write(need_initial: bool, jpeg: &Bytes) -> BytesMut {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();

    let mut buf = BytesMut::with_capacity(jpeg.len() + PREAMBLE.len() + 128);
    if need_initial {
        buf.put_slice(PREAMBLE.as_bytes());
    }
    buf.put_slice(
        format!(
            "Content-Type: image/jpeg\r\nContent-Length: {}\r\nX-Timestamp: {}.{:06}\r\n\r\n",
            jpeg.len(),
            now.as_secs(),
            now.subsec_micros(),
        )
        .as_bytes(),
    );
    buf.put_slice(jpeg);
    buf.put_slice(format!("\r\n--{}\r\n", BOUNDARY).as_bytes());
    buf
}

/// Drive one attached `/stream` client: receive frame bytes from the
/// refresh ticker, assemble a multipart part, and write it. Reports its
/// own handle back over `closed_tx` on the first write error, then exits.
pub async fn run(
    mut stream: TcpStream,
    handle: ClientHandle,
    mut rx: mpsc::Receiver<Bytes>,
    closed_tx: mpsc::UnboundedSender<ClientHandle>,
) {
    let mut need_initial = true;

    while let Some(jpeg) = rx.recv().await {
        let buf = format_write(need_initial, &jpeg);
        match stream.write_all(&buf).await {
            Ok(()) => {
                trace!("wrote {} bytes to stream client", buf.len());
                need_initial = false;
            }
            Err(e) => {
                debug!("stream client write failed, detaching: {}", e);
                break;
            }
        }
    }

    let _ = closed_tx.send(handle);
}
