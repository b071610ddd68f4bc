//! Tiny one-shot HTTP fixtures for exercising the streaming clients without a
//! real backend. Test-only.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

async fn read_request(sock: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::with_capacity(8192);
    let mut tmp = [0u8; 4096];
    // Read until the header/body split, then honor Content-Length.
    let header_end = loop {
        let n = sock.read(&mut tmp).await.expect("request read");
        if n == 0 {
            return String::from_utf8_lossy(&buf).into_owned();
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let content_length = head
        .lines()
        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(str::trim).map(String::from))
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = sock.read(&mut tmp).await.expect("request body read");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
    }

    String::from_utf8_lossy(&buf[header_end..]).into_owned()
}

/// Serve one canned response per incoming connection, in order, recording each
/// request body. The join handle completes once every response has been sent.
pub async fn serve_responses(
    responses: Vec<(u16, String, String)>,
) -> (String, Arc<Mutex<Vec<String>>>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    let handle = tokio::spawn(async move {
        for (status, content_type, body) in responses {
            let (mut sock, _) = listener.accept().await.expect("accept");
            let request_body = read_request(&mut sock).await;
            seen.lock().expect("requests lock").push(request_body);

            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason(status),
                content_type,
                body.len(),
                body
            );
            sock.write_all(response.as_bytes()).await.expect("write response");
            let _ = sock.shutdown().await;
        }
    });

    (format!("http://{}", addr), requests, handle)
}

/// Serve a single canned response.
pub async fn serve_once(status: u16, content_type: &str, body: String) -> (String, JoinHandle<()>) {
    let (url, _requests, handle) =
        serve_responses(vec![(status, content_type.to_string(), body)]).await;
    (url, handle)
}

/// Serve response headers plus `first_chunk`, then hold the connection open
/// without ever completing the body. For exercising cancellation while the
/// client is blocked mid-stream.
pub async fn serve_stalling(first_chunk: String) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.expect("accept");
        let _ = read_request(&mut sock).await;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            first_chunk.len() + 1_000_000,
            first_chunk
        );
        sock.write_all(response.as_bytes()).await.expect("write response");
        // Keep the socket open; the body never completes.
        tokio::time::sleep(std::time::Duration::from_secs(600)).await;
        drop(sock);
    });

    (format!("http://{}", addr), handle)
}
