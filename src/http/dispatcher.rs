//! Accepts connections, routes `/`, `/ping`, `/snapshot`, `/stream`, and
//! handles `HEAD` uniformly across all routes.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::request::{self, Method};
use crate::refresh::NewStreamClient;
use crate::snapshot::ExposedSnapshot;

const INDEX_HTML: &str = concat!(
    "<!DOCTYPE html><html><head><meta charset=\"utf-8\">",
    "<title>mjpg-httpd</title></head><body><ul>",
    "<li><a href=\"/ping\">/ping</a></li>",
    "<li><a href=\"/snapshot\">/snapshot</a></li>",
    "<li><a href=\"/stream\">/stream</a></li>",
    "</ul></body></html>",
);

/// Handle one accepted TCP connection: parse its request line, route it,
/// and either answer it directly or (for a `GET /stream`) hand the raw
/// socket off to the refresh ticker.
pub async fn handle_connection(
    stream: TcpStream,
    idle_timeout: Duration,
    exposed: Arc<RwLock<ExposedSnapshot>>,
    new_clients_tx: mpsc::Sender<NewStreamClient>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let request_line = match timeout(idle_timeout, request::read_request(&mut reader)).await {
        Ok(Ok(Some(line))) => line,
        Ok(Ok(None)) => return, // peer closed before sending a request
        Ok(Err(e)) => {
            debug!("error reading request: {}", e);
            return;
        }
        Err(_) => {
            debug!("idle timeout waiting for request line");
            return;
        }
    };

    if !matches!(request_line.method, Method::Get | Method::Head) {
        let _ = request::write_response(
            &mut write_half,
            "HTTP/1.0 405 Method Not Allowed",
            &[("Allow", "GET, HEAD")],
            b"",
        )
        .await;
        return;
    }

    let is_head = request_line.method == Method::Head;

    match request_line.path.as_str() {
        "/" => respond_index(&mut write_half, is_head).await,
        "/ping" => respond_ping(&mut write_half, is_head, &exposed).await,
        "/snapshot" => respond_snapshot(&mut write_half, is_head, &exposed).await,
        "/stream" => {
            if is_head {
                respond_head_ok(&mut write_half).await;
                return;
            }
            // Reassemble the stream so the refresh ticker's client task
            // owns the whole socket going forward.
            let stream = read_half_and_write_half_to_stream(reader, write_half);
            let new_client = NewStreamClient { stream };
            if new_clients_tx.send(new_client).await.is_err() {
                warn!("refresh ticker is not accepting new stream clients");
            }
        }
        _ => respond_not_found(&mut write_half, is_head).await,
    }
}

fn read_half_and_write_half_to_stream(
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
) -> TcpStream {
    let read_half = reader.into_inner();
    read_half
        .reunite(writer)
        .expect("read and write halves originated from the same TcpStream")
}

async fn respond_head_ok(writer: &mut (impl AsyncWriteExt + Unpin)) {
    let _ = writer.write_all(b"HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n").await;
}

async fn respond_not_found(writer: &mut (impl AsyncWriteExt + Unpin), is_head: bool) {
    if is_head {
        respond_head_ok(writer).await;
        return;
    }
    let _ = request::write_response(writer, "HTTP/1.0 404 Not Found", &[], b"not found").await;
}

async fn respond_index(writer: &mut (impl AsyncWriteExt + Unpin), is_head: bool) {
    if is_head {
        respond_head_ok(writer).await;
        return;
    }
    let _ = request::write_response(
        writer,
        "HTTP/1.0 200 OK",
        &[("Content-Type", "text/html")],
        INDEX_HTML.as_bytes(),
    )
    .await;
}

async fn respond_ping(
    writer: &mut (impl AsyncWriteExt + Unpin),
    is_head: bool,
    exposed: &Arc<RwLock<ExposedSnapshot>>,
) {
    if is_head {
        respond_head_ok(writer).await;
        return;
    }
    let body = {
        let exposed = exposed.read();
        serde_json::json!({
            "stream": {
                "resolution": { "width": exposed.width(), "height": exposed.height() },
                "online": exposed.online(),
            }
        })
        .to_string()
    };
    let _ = request::write_response(
        writer,
        "HTTP/1.0 200 OK",
        &[("Content-Type", "application/json")],
        body.as_bytes(),
    )
    .await;
}

async fn respond_snapshot(
    writer: &mut (impl AsyncWriteExt + Unpin),
    is_head: bool,
    exposed: &Arc<RwLock<ExposedSnapshot>>,
) {
    if is_head {
        respond_head_ok(writer).await;
        return;
    }
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let x_timestamp = format!("{}.{:06}", now.as_secs(), now.subsec_micros());
    let body = { exposed.read().bytes().to_vec() };

    let _ = request::write_response(
        writer,
        "HTTP/1.0 200 OK",
        &[
            ("Access-Control-Allow-Origin", "*"),
            (
                "Cache-Control",
                "no-store, no-cache, must-revalidate, pre-check=0, post-check=0, max-age=0",
            ),
            ("Pragma", "no-cache"),
            ("Expires", "Mon, 3 Jan 2000 12:34:56 GMT"),
            ("X-Timestamp", &x_timestamp),
            ("Content-Type", "image/jpeg"),
        ],
        &body,
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blank::BLANK_JPEG;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn spawn_connection(
        exposed: Arc<RwLock<ExposedSnapshot>>,
    ) -> (TcpStream, mpsc::Receiver<NewStreamClient>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (new_clients_tx, new_clients_rx) = mpsc::channel(4);

        let client = TcpStream::connect(addr).await.unwrap();
        let (server_side, _) = listener.accept().await.unwrap();

        tokio::spawn(handle_connection(
            server_side,
            Duration::from_secs(5),
            exposed,
            new_clients_tx,
        ));

        (client, new_clients_rx)
    }

    async fn read_all(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).to_string()
    }

    async fn read_all_bytes(stream: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf).await;
        buf
    }

    #[tokio::test]
    async fn test_get_snapshot_returns_blank_jpeg_bytes() {
        let exposed = Arc::new(RwLock::new(ExposedSnapshot::blank()));
        let (mut client, _rx) = spawn_connection(exposed).await;
        client.write_all(b"GET /snapshot HTTP/1.0\r\n\r\n").await.unwrap();

        let response = read_all_bytes(&mut client).await;
        let header_end = response
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("response should contain header/body separator");
        let headers = String::from_utf8_lossy(&response[..header_end]);
        assert!(headers.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(headers.contains("Content-Type: image/jpeg\r\n"));
        let body_start = header_end + 4;
        assert_eq!(&response[body_start..], BLANK_JPEG);
    }

    #[tokio::test]
    async fn test_head_snapshot_returns_empty_body_no_content_type() {
        let exposed = Arc::new(RwLock::new(ExposedSnapshot::blank()));
        let (mut client, _rx) = spawn_connection(exposed).await;
        client.write_all(b"HEAD /snapshot HTTP/1.0\r\n\r\n").await.unwrap();

        let response = read_all(&mut client).await;
        assert_eq!(response, "HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn test_get_ping_reports_offline_blank_resolution() {
        let exposed = Arc::new(RwLock::new(ExposedSnapshot::blank()));
        let (mut client, _rx) = spawn_connection(exposed).await;
        client.write_all(b"GET /ping HTTP/1.0\r\n\r\n").await.unwrap();

        let response = read_all(&mut client).await;
        assert!(response.contains("Content-Type: application/json"));
        assert!(response.contains("\"online\":false"));
        assert!(response.contains("\"width\":640"));
        assert!(response.contains("\"height\":480"));
    }

    #[tokio::test]
    async fn test_unsupported_method_returns_405() {
        let exposed = Arc::new(RwLock::new(ExposedSnapshot::blank()));
        let (mut client, _rx) = spawn_connection(exposed).await;
        client.write_all(b"DELETE /ping HTTP/1.0\r\n\r\n").await.unwrap();

        let response = read_all(&mut client).await;
        assert!(response.starts_with("HTTP/1.0 405 Method Not Allowed\r\n"));
        assert!(response.contains("Allow: GET, HEAD"));
    }

    #[tokio::test]
    async fn test_head_stream_does_not_create_client() {
        let exposed = Arc::new(RwLock::new(ExposedSnapshot::blank()));
        let (mut client, mut rx) = spawn_connection(exposed).await;
        client.write_all(b"HEAD /stream HTTP/1.0\r\n\r\n").await.unwrap();

        let response = read_all(&mut client).await;
        assert_eq!(response, "HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_get_stream_hands_off_to_ticker() {
        let exposed = Arc::new(RwLock::new(ExposedSnapshot::blank()));
        let (mut client, mut rx) = spawn_connection(exposed).await;
        client.write_all(b"GET /stream HTTP/1.0\r\n\r\n").await.unwrap();

        let new_client = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .expect("a new stream client should have been handed off");
        drop(new_client);
    }

    #[tokio::test]
    async fn test_unknown_path_returns_404() {
        let exposed = Arc::new(RwLock::new(ExposedSnapshot::blank()));
        let (mut client, _rx) = spawn_connection(exposed).await;
        client.write_all(b"GET /nope HTTP/1.0\r\n\r\n").await.unwrap();

        let response = read_all(&mut client).await;
        assert!(response.starts_with("HTTP/1.0 404 Not Found\r\n"));
    }
}
