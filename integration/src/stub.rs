use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Scripted response for one request: status code plus artificial latency.
#[derive(Debug, Clone, Copy)]
pub struct Reply {
    pub status: u16,
    pub delay: Duration,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            status: 200,
            delay: Duration::ZERO,
        }
    }

    pub fn rejected() -> Self {
        Self {
            status: 503,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(status: u16, delay: Duration) -> Self {
        Self { status, delay }
    }
}

/// Per-path reply scripts: the n-th request to a path gets the n-th entry,
/// with the last entry repeating once the script is exhausted.
pub type Script = HashMap<String, Vec<Reply>>;

pub fn script(entries: &[(&str, &[Reply])]) -> Script {
    entries
        .iter()
        .map(|(path, replies)| (path.to_string(), replies.to_vec()))
        .collect()
}

/// Minimal in-process HTTP target with scripted outcomes, so the harness's
/// own properties are testable without a real gateway. Unscripted paths
/// always answer 200. Not a rate limiter: replies depend only on the script
/// and per-path arrival order.
pub struct StubTarget {
    base_url: String,
    accept_loop: JoinHandle<()>,
}

impl StubTarget {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub listener addr");
        let script = Arc::new(script);
        let arrivals: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));

        let accept_loop = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let script = script.clone();
                let arrivals = arrivals.clone();
                tokio::spawn(serve_connection(socket, script, arrivals));
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            accept_loop,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Drop for StubTarget {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn serve_connection(
    mut socket: tokio::net::TcpStream,
    script: Arc<Script>,
    arrivals: Arc<Mutex<HashMap<String, usize>>>,
) {
    let mut buf = [0u8; 1024];
    let read = socket.read(&mut buf).await.unwrap_or(0);
    let request = String::from_utf8_lossy(&buf[..read]).into_owned();
    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

    let reply = {
        let mut arrivals = arrivals.lock().expect("arrivals lock");
        let index = arrivals.entry(path.clone()).or_insert(0);
        let reply = script
            .get(&path)
            .and_then(|replies| replies.get(*index).or_else(|| replies.last()))
            .copied()
            .unwrap_or_else(Reply::ok);
        *index += 1;
        reply
    };

    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let reason = match reply.status {
        200 => "OK",
        503 => "Service Temporarily Unavailable",
        _ => "Response",
    };
    let body = "ok";
    let response = format!(
        "HTTP/1.1 {} {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        reply.status,
        reason,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
}
