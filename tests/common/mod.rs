/// Common utilities for integration tests
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream};

/// Find an available port
pub fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to random port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Unique temporary file path for a test
pub fn temp_file(tag: &str, ext: &str) -> PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    let counter = COUNTER.fetch_add(1, Ordering::SeqCst);

    std::env::temp_dir().join(format!(
        "sni-router-test-{}-{}-{}-{}.{}",
        tag,
        timestamp,
        counter,
        std::process::id(),
        ext
    ))
}

/// Generate temporary certificate files for testing
pub fn generate_test_certs() -> (PathBuf, PathBuf) {
    use sni_router::tls;

    let cert_path = temp_file("cert", "pem");
    let key_path = temp_file("key", "pem");

    tls::generate_self_signed_cert(
        "localhost",
        &[
            "127.0.0.1".to_string(),
            "localhost".to_string(),
            "svc.internal".to_string(),
        ],
        &cert_path,
        &key_path,
    )
    .expect("Failed to generate test certificates");

    (cert_path, key_path)
}

/// Create a simple echo server for testing
pub async fn start_echo_server(port: u16) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let listener = TokioTcpListener::bind(format!("127.0.0.1:{}", port))
            .await
            .expect("Failed to bind echo server");

        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) => break, // Connection closed
                                Ok(n) => {
                                    if socket.write_all(&buf[..n]).await.is_err() {
                                        break;
                                    }
                                }
                                Err(_) => break,
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    })
}

/// Backend that drains its input to EOF, then replies with the byte count
///
/// Used to verify half-close propagation: the reply can only be produced
/// after the proxy forwards the client's end-of-input, and must still reach
/// the client afterwards.
pub async fn start_drain_then_reply_server(port: u16) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let listener = TokioTcpListener::bind(format!("127.0.0.1:{}", port))
            .await
            .expect("Failed to bind drain server");

        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = Vec::new();
                        if socket.read_to_end(&mut buf).await.is_ok() {
                            let reply = format!("received {} bytes", buf.len());
                            let _ = socket.write_all(reply.as_bytes()).await;
                        }
                    });
                }
                Err(_) => break,
            }
        }
    })
}

/// Wait for server to be ready
pub async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    for _ in 0..max_attempts {
        if TcpStream::connect(format!("127.0.0.1:{}", port))
            .await
            .is_ok()
        {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

/// Wait until the metrics file holds at least `expected` records
pub async fn wait_for_metrics_records(
    path: &Path,
    expected: usize,
    max_wait: Duration,
) -> Vec<serde_json::Value> {
    let deadline = std::time::Instant::now() + max_wait;
    loop {
        if let Ok(contents) = std::fs::read_to_string(path) {
            let records: Vec<serde_json::Value> = contents
                .lines()
                .map(|line| serde_json::from_str(line).expect("metrics line must be valid JSON"))
                .collect();
            if records.len() >= expected {
                return records;
            }
        }
        if std::time::Instant::now() >= deadline {
            panic!(
                "Timed out waiting for {} metrics record(s) in {}",
                expected,
                path.display()
            );
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Cleanup function for test resources
pub struct TestCleanup {
    paths: Vec<PathBuf>,
}

impl TestCleanup {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl Drop for TestCleanup {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            let _ = std::fs::remove_file(path);
        }
    }
}
