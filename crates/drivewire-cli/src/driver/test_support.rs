//! Loopback fake drivers for tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drivewire_core::codec::{encode_response, parse_request_header};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::session::{Session, SessionOptions};

/// A session whose peer is an in-process fake driver.
pub struct FakeDriver {
    pub session: Session,
    /// Every request received, decoded lossily as text.
    pub requests: RequestLog,
    /// Every request received, as raw fields.
    pub raw: RawLog,
    pub task: JoinHandle<()>,
}

/// Read one request frame and split it into raw fields.
///
/// Returns `None` once the peer closes the connection.
pub async fn read_request(stream: &mut TcpStream) -> Option<Vec<Vec<u8>>> {
    let mut header = Vec::new();
    loop {
        let byte = stream.read_u8().await.ok()?;
        if byte == b'\n' {
            break;
        }
        header.push(byte);
    }
    let lengths = parse_request_header(&header).ok()?;
    let mut fields = Vec::with_capacity(lengths.len());
    for len in lengths {
        let mut field = vec![0u8; len];
        stream.read_exact(&mut field).await.ok()?;
        fields.push(field);
    }
    Some(fields)
}

/// Request logs shared between a fake driver task and the test.
pub type RequestLog = Arc<Mutex<Vec<Vec<String>>>>;
pub type RawLog = Arc<Mutex<Vec<Vec<Vec<u8>>>>>;

/// Answer requests on `stream` with `handler` until the peer goes away.
pub async fn serve<F>(mut stream: TcpStream, mut handler: F, requests: RequestLog, raw: RawLog)
where
    F: FnMut(&[String]) -> Vec<u8>,
{
    while let Some(fields) = read_request(&mut stream).await {
        let text: Vec<String> = fields
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        let reply = handler(&text);
        requests.lock().unwrap().push(text);
        raw.lock().unwrap().push(fields);
        if stream.write_all(&encode_response(&reply)).await.is_err() {
            return;
        }
    }
}

/// Connect a fake driver to `addr` that answers each request with `handler`.
///
/// Connection attempts are retried briefly so the driver may start before
/// the listener is bound.
pub fn spawn_driver<F>(addr: SocketAddr, handler: F) -> (RequestLog, RawLog, JoinHandle<()>)
where
    F: FnMut(&[String]) -> Vec<u8> + Send + 'static,
{
    let requests = RequestLog::default();
    let raw = RawLog::default();
    let (req_log, raw_log) = (requests.clone(), raw.clone());

    let task = tokio::spawn(async move {
        for _ in 0..100 {
            if let Ok(stream) = TcpStream::connect(addr).await {
                serve(stream, handler, req_log, raw_log).await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });
    (requests, raw, task)
}

/// Accept a session from a fake driver on an ephemeral loopback port.
pub async fn connected_session<F>(handler: F) -> FakeDriver
where
    F: FnMut(&[String]) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (requests, raw, task) = spawn_driver(addr, handler);
    let session = Session::accept_from(&listener, SessionOptions::default())
        .await
        .unwrap();
    FakeDriver {
        session,
        requests,
        raw,
        task,
    }
}
