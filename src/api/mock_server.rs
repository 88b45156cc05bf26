//! Loopback HTTP/1.1 server for tests: answers each connection with the next
//! canned reply and records what was asked.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub struct Reply {
    status: u16,
    chunks: Vec<String>,
    chunked: bool,
}

impl Reply {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            chunks: vec![body.into()],
            chunked: false,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self::json(status, "")
    }

    /// `text/event-stream` body sent with chunked transfer encoding, one
    /// HTTP chunk per entry.
    pub fn stream(chunks: &[&str]) -> Self {
        Self {
            status: 200,
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            chunked: true,
        }
    }
}

pub struct MockServer {
    pub url: url::Url,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    /// Serve `replies` in order, one per connection, then stop accepting.
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            for reply in replies {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                recorded.lock().unwrap().push(request);
                write_reply(&mut socket, reply).await;
            }
        });

        Self {
            url: url::Url::parse(&format!("http://{}", addr)).unwrap(),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> RecordedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.split_whitespace();
    RecordedRequest {
        method: request_line.next().unwrap_or_default().to_string(),
        path: request_line.next().unwrap_or_default().to_string(),
        body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
    }
}

async fn write_reply(socket: &mut TcpStream, reply: Reply) {
    let reason = match reply.status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    };

    if reply.chunked {
        let head = format!(
            "HTTP/1.1 {} {}\r\ncontent-type: text/event-stream\r\n\
             transfer-encoding: chunked\r\nconnection: close\r\n\r\n",
            reply.status, reason
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        for chunk in &reply.chunks {
            let framed = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
            socket.write_all(framed.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
        }
        socket.write_all(b"0\r\n\r\n").await.unwrap();
    } else {
        let body = reply.chunks.concat();
        let response = format!(
            "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\n\
             content-length: {}\r\nconnection: close\r\n\r\n{}",
            reply.status,
            reason,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
    }
    let _ = socket.shutdown().await;
}
