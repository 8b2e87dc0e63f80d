//! Minimal HTTP request-line parsing. The dispatcher only ever needs the
//! method and the path, headers and any body are read and discarded.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Other,
}

#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: Method,
    pub path: String,
}

pub fn parse_request_line(line: &str) -> Option<RequestLine> {
    let mut parts = line.trim_end().split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?.to_string();
    let _version = parts.next()?;

    let method = match method {
        "GET" => Method::Get,
        "HEAD" => Method::Head,
        _ => Method::Other,
    };

    Some(RequestLine { method, path })
}

/// Read a request line followed by headers up to the blank line that
/// terminates them, returning the parsed request line. Headers are
/// consumed but not retained: the core doesn't need them.
pub async fn read_request(
    reader: &mut BufReader<OwnedReadHalf>,
) -> std::io::Result<Option<RequestLine>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None); // peer closed before sending anything
    }
    let request_line = parse_request_line(&line);

    loop {
        let mut header_line = String::new();
        if reader.read_line(&mut header_line).await? == 0 {
            break;
        }
        if header_line.trim_end().is_empty() {
            break;
        }
    }

    Ok(request_line)
}

pub async fn write_response(
    writer: &mut (impl AsyncWriteExt + Unpin),
    status_line: &str,
    headers: &[(&str, &str)],
    body: &[u8],
) -> std::io::Result<()> {
    let mut out = format!("{}\r\n", status_line);
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
    writer.write_all(out.as_bytes()).await?;
    writer.write_all(body).await?;
    Ok(())
}
