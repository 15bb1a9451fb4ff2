//! Shared utilities for integration testing.
//!
//! Provides a line-oriented wire codec (the crate treats framing as an
//! external collaborator) and helpers for driving a server over real
//! sockets.
//!
//! Wire format, one request or response per newline-terminated line:
//! ```text
//! request:  METHOD /path?k=v|header=value;header=value|body
//! response: STATUS|header=value;header=value|body
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use portico::config::ServerConfig;
use portico::http::request::RequestHead;
use portico::http::response::Response;
use portico::net::pipeline::{BoxedStream, ProtocolCodec};

/// Minimal newline-delimited codec standing in for real HTTP framing.
pub struct LineCodec;

#[async_trait]
impl ProtocolCodec for LineCodec {
    async fn read_request(
        &self,
        stream: &mut BoxedStream,
        max_body_length: usize,
    ) -> io::Result<Option<(RequestHead, Vec<u8>)>> {
        let line = match read_line(stream).await? {
            Some(line) => line,
            None => return Ok(None),
        };

        let mut parts = line.splitn(3, '|');
        let request_line = parts.next().unwrap_or("");
        let header_part = parts.next().unwrap_or("");
        let body = parts.next().unwrap_or("").as_bytes().to_vec();

        if body.len() > max_body_length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "body exceeds codec limit",
            ));
        }

        let (method, target) = request_line
            .split_once(' ')
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad request line"))?;
        let method = method
            .parse::<Method>()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad method"))?;

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        let mut head = RequestHead::new(method, path);
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                match pair.split_once('=') {
                    Some((k, v)) => head.query.insert(k, v),
                    None => head.query.insert(pair, ""),
                }
            }
        }
        for pair in header_part.split(';').filter(|p| !p.is_empty()) {
            if let Some((k, v)) = pair.split_once('=') {
                head.headers.insert(k, v);
            }
        }

        Ok(Some((head, body)))
    }

    async fn write_response(
        &self,
        stream: &mut BoxedStream,
        response: &Response,
    ) -> io::Result<()> {
        let mut headers = String::new();
        for (name, value) in response.headers.iter() {
            if !headers.is_empty() {
                headers.push(';');
            }
            headers.push_str(&format!("{name}={value}"));
        }

        let line = format!(
            "{}|{}|{}\n",
            response.status.as_u16(),
            headers,
            String::from_utf8_lossy(&response.body)
        );
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await
    }
}

async fn read_line(stream: &mut BoxedStream) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        match stream.read(&mut byte).await? {
            0 => {
                if buf.is_empty() {
                    return Ok(None);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed mid-request",
                ));
            }
            _ => {
                if byte[0] == b'\n' {
                    let line = String::from_utf8(buf)
                        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "not utf-8"))?;
                    return Ok(Some(line));
                }
                buf.push(byte[0]);
            }
        }
    }
}

/// Arc'd codec for server construction.
#[allow(dead_code)]
pub fn line_codec() -> Arc<LineCodec> {
    Arc::new(LineCodec)
}

/// Config bound to one loopback port.
#[allow(dead_code)]
pub fn loopback_config(port: u16) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.ports.push(portico::config::PortConfig {
        host: "127.0.0.1".to_string(),
        port,
        protocols: vec![portico::Protocol::Http],
    });
    config.io_threads = 2;
    config.shutdown.quiet_period_secs = 1;
    config.shutdown.timeout_secs = 3;
    config
}

/// A parsed response line.
#[allow(dead_code)]
#[derive(Debug)]
pub struct WireResponse {
    pub status: u16,
    pub headers: String,
    pub body: String,
}

/// Send one request line and read the response line.
#[allow(dead_code)]
pub async fn roundtrip(addr: SocketAddr, request: &str) -> io::Result<WireResponse> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(format!("{request}\n").as_bytes()).await?;

    let mut raw = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte).await? {
            0 => break,
            _ if byte[0] == b'\n' => break,
            _ => raw.push(byte[0]),
        }
    }

    let line = String::from_utf8_lossy(&raw).to_string();
    let mut parts = line.splitn(3, '|');
    let status = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad response line"))?;
    Ok(WireResponse {
        status,
        headers: parts.next().unwrap_or("").to_string(),
        body: parts.next().unwrap_or("").to_string(),
    })
}

/// Poll until `condition` holds or `deadline` elapses.
#[allow(dead_code)]
pub async fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
