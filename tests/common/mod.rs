#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Reference URL used in tests; fake proxies answer it without resolving
pub const TEST_URL: &str = "http://reference.test/200";

pub fn temp_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("proxygrab-{}-{}", label, uuid::Uuid::new_v4()))
}

async fn read_request_line(socket: &mut TcpStream) -> String {
    let mut buffer = vec![0; 4096];
    match socket.read(&mut buffer).await {
        Ok(n) if n > 0 => String::from_utf8_lossy(&buffer[..n])
            .lines()
            .next()
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

async fn respond(socket: &mut TcpStream, status: &str, content_type: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Forwarding proxy stand-in that answers every request with 200
pub struct FakeProxy {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeProxy {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let seen = seen.clone();
                tokio::spawn(async move {
                    let line = read_request_line(&mut socket).await;
                    seen.lock().unwrap().push(line);
                    respond(&mut socket, "200 OK", "text/plain", "").await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Paginated JSON listing stand-in
///
/// `pages[n]` is served for `page=n+1`; later pages get an empty `data`
/// array. A page given as `Err(status)` is answered with that status.
pub struct FakeListing {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeListing {
    pub async fn start(pages: Vec<Result<String, &'static str>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let pages = Arc::new(pages);

        let seen = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let seen = seen.clone();
                let pages = pages.clone();
                tokio::spawn(async move {
                    let line = read_request_line(&mut socket).await;
                    let page = page_number(&line).unwrap_or(1);
                    seen.lock().unwrap().push(line);

                    match pages.get(page.saturating_sub(1)) {
                        Some(Ok(body)) => respond(&mut socket, "200 OK", "application/json", body).await,
                        Some(Err(status)) => respond(&mut socket, status, "text/plain", "error").await,
                        None => respond(&mut socket, "200 OK", "application/json", r#"{"data":[]}"#).await,
                    }
                });
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}/api/proxy-list", self.addr)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn page_number(request_line: &str) -> Option<usize> {
    let target = request_line.split_whitespace().nth(1)?;
    let (_, query) = target.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("page="))
        .and_then(|page| page.parse().ok())
}

/// A local port with nothing listening on it
pub async fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

/// Render listing entries as a page body
pub fn listing_page(entries: &[(&str, u16)]) -> String {
    let data: Vec<serde_json::Value> = entries
        .iter()
        .enumerate()
        .map(|(i, (ip, port))| {
            // Alternate string and numeric ports, as the real listing varies
            if i % 2 == 0 {
                serde_json::json!({ "ip": ip, "port": port.to_string() })
            } else {
                serde_json::json!({ "ip": ip, "port": port })
            }
        })
        .collect();
    serde_json::json!({ "data": data }).to_string()
}
