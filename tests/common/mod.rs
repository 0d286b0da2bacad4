/*!
 * Common test utilities for the qbsession test suite
 */

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use qbsession::{ApplicationCredentials, SessionManager, Transport};

pub const TEST_SESSION_URL: &str = "https://api.example.com/session.json";

/// Route library logs to the test output when RUST_LOG is set
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Credentials used by the signature golden values
pub fn test_credentials() -> ApplicationCredentials {
    ApplicationCredentials::new("1", "k", "s")
}

/// Session manager over the given transport
pub fn manager_with<T: Transport + 'static>(transport: T) -> Arc<SessionManager> {
    init_logger();
    Arc::new(SessionManager::new(
        test_credentials(),
        Arc::new(transport),
        TEST_SESSION_URL,
    ))
}

/// Serve exactly one HTTP request with a canned response
///
/// Returns the base URL and a handle resolving to the raw request text.
pub async fn serve_once(
    status_line: &'static str,
    body: impl Into<String>,
) -> Result<(String, JoinHandle<Result<String>>)> {
    let body = body.into();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await?;
        let request = read_request(&mut socket).await?;

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await?;
        socket.shutdown().await?;

        Ok::<String, anyhow::Error>(request)
    });

    Ok((format!("http://{}", addr), handle))
}

/// Accept one connection and never answer it
pub async fn serve_silently() -> Result<(String, JoinHandle<Result<()>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await?;
        let _ = read_request(&mut socket).await;
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        Ok::<(), anyhow::Error>(())
    });

    Ok((format!("http://{}", addr), handle))
}

async fn read_request(socket: &mut TcpStream) -> Result<String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let read = socket.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        if let Some(header_end) = find_header_end(&buffer) {
            let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);

            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    Ok(String::from_utf8_lossy(&buffer).to_string())
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}
