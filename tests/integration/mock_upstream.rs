// Mock upstream repository for integration tests
// A raw TCP server speaking just enough HTTP/1.1 to exercise the client

use mirror_cache::cache::{CacheEngine, HttpUpstream};
use mirror_cache::config::UpstreamTimeouts;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the mock answers one path
#[derive(Debug, Clone)]
pub enum Route {
    /// 200 with the body and a matching Content-Length
    Ok(Vec<u8>),
    /// Empty response with the given status
    Status(u16),
    /// Wait before sending a 200
    Delayed(Duration, Vec<u8>),
    /// Declare more bytes than are sent, then close the connection
    Truncated { declared: usize, body: Vec<u8> },
    /// Send part of the body, then go quiet without closing
    Stall { declared: usize, prefix: Vec<u8> },
    /// Send `declared` bytes one at a time with `pause` between them
    Drip { declared: usize, pause: Duration },
}

impl Route {
    pub fn ok(body: &str) -> Self {
        Route::Ok(body.as_bytes().to_vec())
    }
}

/// Find a port nobody is listening on
pub fn unused_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// A running mock upstream; stopped when dropped
pub struct MockUpstream {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    paths: Arc<std::sync::Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    /// Serve `routes` (request path -> answer); unknown paths get 404
    pub async fn start(routes: Vec<(&str, Route)>) -> Self {
        Self::start_with_prefix("", routes).await
    }

    /// Like `start`, with every route mounted under `prefix` (e.g. `/maven2`)
    pub async fn start_with_prefix(prefix: &str, routes: Vec<(&str, Route)>) -> Self {
        let routes: HashMap<String, Route> = routes
            .into_iter()
            .map(|(path, route)| (format!("{}{}", prefix, path), route))
            .collect();
        let routes = Arc::new(routes);
        let hits = Arc::new(AtomicUsize::new(0));
        let paths = Arc::new(std::sync::Mutex::new(Vec::new()));

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = {
            let hits = hits.clone();
            let paths = paths.clone();
            tokio::spawn(async move {
                loop {
                    if let Ok((socket, _)) = listener.accept().await {
                        let routes = routes.clone();
                        let hits = hits.clone();
                        let paths = paths.clone();
                        tokio::spawn(async move {
                            let _ = serve(socket, &routes, &hits, &paths).await;
                        });
                    }
                }
            })
        };

        Self {
            base_url: format!("http://127.0.0.1:{}{}", port, prefix),
            hits,
            paths,
            handle,
        }
    }

    /// Number of requests received
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Raw request paths received, in order
    pub fn requested_paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(
    mut socket: TcpStream,
    routes: &HashMap<String, Route>,
    hits: &AtomicUsize,
    paths: &std::sync::Mutex<Vec<String>>,
) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buffer = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let read = socket.read(&mut buffer).await?;
        if read == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buffer[..read]);
    }

    let request = String::from_utf8_lossy(&request);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    hits.fetch_add(1, Ordering::SeqCst);
    paths.lock().unwrap().push(path.clone());

    match routes.get(&path).cloned().unwrap_or(Route::Status(404)) {
        Route::Ok(body) => write_ok(&mut socket, body.len(), &body).await?,
        Route::Status(status) => {
            let head = format!(
                "HTTP/1.1 {} Mock\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status
            );
            socket.write_all(head.as_bytes()).await?;
        }
        Route::Delayed(delay, body) => {
            tokio::time::sleep(delay).await;
            write_ok(&mut socket, body.len(), &body).await?;
        }
        Route::Truncated { declared, body } => {
            write_ok(&mut socket, declared, &body).await?;
            socket.shutdown().await?;
        }
        Route::Stall { declared, prefix } => {
            write_ok(&mut socket, declared, &prefix).await?;
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Route::Drip { declared, pause } => {
            write_ok(&mut socket, declared, &[]).await?;
            for _ in 0..declared {
                socket.flush().await?;
                tokio::time::sleep(pause).await;
                socket.write_all(b"x").await?;
            }
        }
    }
    socket.flush().await
}

async fn write_ok(socket: &mut TcpStream, declared: usize, body: &[u8]) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        declared
    );
    socket.write_all(head.as_bytes()).await?;
    socket.write_all(body).await
}

/// Timeouts short enough to keep failing upstreams from slowing tests down
pub fn short_timeouts() -> UpstreamTimeouts {
    UpstreamTimeouts {
        connect: Duration::from_millis(500),
        request: Duration::from_millis(500),
        read: Duration::from_millis(300),
        transfer: Duration::from_millis(1500),
    }
}

/// Engine over `servers` using the real HTTP client
pub fn http_engine(servers: Vec<String>, cache_root: &Path) -> CacheEngine {
    let fetcher = HttpUpstream::new(short_timeouts()).unwrap();
    CacheEngine::new(servers, cache_root.to_path_buf(), Arc::new(fetcher)).unwrap()
}
