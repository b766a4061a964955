//! Transport session: one TCP connection to one driver.
//!
//! A session sends a request frame and reads the matching response while
//! holding the stream lock, so concurrent callers never interleave frames.
//! Any transport or framing failure poisons the session: the stream is
//! dropped and every later call fails with `ConnectionAborted`.

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use drivewire_core::codec::{self, Arg, ResponseDecoder};
use drivewire_core::error::{DriverError, Result};
use socket2::SockRef;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Size of each socket read while collecting a response.
const READ_CHUNK: usize = 64 * 1024;

/// Longest payload excerpt written to debug logs.
const LOG_PREVIEW_LEN: usize = 256;

/// Socket-level options applied when a session is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// `SO_SNDBUF` in bytes. `None` keeps the OS default.
    pub send_buffer_size: Option<usize>,
    /// Hard limit for one request/response exchange. Exceeding it is fatal.
    pub call_timeout: Option<Duration>,
}

/// A connected driver.
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    label: String,
    connected_at: DateTime<Utc>,
    call_timeout: Option<Duration>,
    closed: AtomicBool,
    stream: Mutex<Option<TcpStream>>,
}

impl Session {
    /// Listen on `0.0.0.0:port`, accept exactly one driver, then stop listening.
    pub async fn accept_one(port: u16, options: SessionOptions) -> Result<Self> {
        let listener = bind_listener(port).await?;
        Self::accept_from(&listener, options).await
    }

    /// Accept the next driver from an already bound listener.
    pub async fn accept_from(listener: &TcpListener, options: SessionOptions) -> Result<Self> {
        let local = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "listener".to_string());
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| DriverError::connection_aborted(local, e))?;
        Self::from_stream(stream, options)
    }

    /// Dial a driver that is listening itself.
    pub async fn connect<A>(addr: A, options: SessionOptions) -> Result<Self>
    where
        A: ToSocketAddrs + std::fmt::Display,
    {
        let label = addr.to_string();
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| DriverError::connection_aborted(label, e))?;
        Self::from_stream(stream, options)
    }

    /// Wrap an established stream.
    pub fn from_stream(stream: TcpStream, options: SessionOptions) -> Result<Self> {
        let peer = stream
            .peer_addr()
            .map_err(|e| DriverError::connection_aborted("unknown peer", e))?;

        if let Some(size) = options.send_buffer_size {
            if let Err(e) = SockRef::from(&stream).set_send_buffer_size(size) {
                warn!("Failed to set send buffer of {} bytes for {}: {}", size, peer, e);
            }
        }
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
        }

        info!("Driver connected from {}", peer);
        Ok(Self {
            peer,
            label: peer.to_string(),
            connected_at: Utc::now(),
            call_timeout: options.call_timeout,
            closed: AtomicBool::new(false),
            stream: Mutex::new(Some(stream)),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn peer_ip(&self) -> IpAddr {
        self.peer.ip()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// True once the session failed or was closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send a command and return its reply as trimmed text.
    ///
    /// Replies are decoded as UTF-8, replacing invalid sequences.
    pub async fn call(&self, args: &[Arg]) -> Result<String> {
        let payload = self.call_binary(args).await?;
        Ok(String::from_utf8_lossy(&payload).trim().to_string())
    }

    /// Send a command and return the raw reply payload.
    pub async fn call_binary(&self, args: &[Arg]) -> Result<Bytes> {
        let command = match args.first() {
            Some(first) => first.to_wire_text().into_owned(),
            None => return Err(DriverError::invalid_argument("empty command")),
        };
        self.exchange(&command, codec::encode(args)).await
    }

    /// Upload bytes with the three-field file framing.
    pub async fn push_file(&self, func_name: &str, to_path: &str, file: &[u8]) -> Result<String> {
        let payload = self
            .exchange(func_name, codec::encode_file(func_name, to_path, file))
            .await?;
        Ok(String::from_utf8_lossy(&payload).trim().to_string())
    }

    /// Drop the connection. Later calls fail with `ConnectionAborted`.
    pub async fn close(&self) {
        let mut guard = self.stream.lock().await;
        if let Some(mut stream) = guard.take() {
            let _ = stream.shutdown().await;
            info!("Closed session with {}", self.label);
        }
        self.closed.store(true, Ordering::Release);
    }

    async fn exchange(&self, command: &str, frame: Vec<u8>) -> Result<Bytes> {
        let mut guard = self.stream.lock().await;
        // out of the slot while in flight; a dropped call never returns it
        let Some(mut stream) = guard.take() else {
            return Err(DriverError::connection_aborted(
                &self.label,
                "session already closed",
            ));
        };
        let mut in_flight = InFlight::new(self, command);

        debug!("---> {} {} ({} bytes)", self.label, preview(&frame), frame.len());

        let result = match self.call_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, round_trip(&mut stream, &frame, &self.label)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(DriverError::connection_aborted(
                        &self.label,
                        format!("no reply to `{}` within {:?}", command, limit),
                    )),
                }
            }
            None => round_trip(&mut stream, &frame, &self.label).await,
        };
        in_flight.complete();

        match &result {
            Ok(payload) => {
                debug!("<--- {} {} ({} bytes)", self.label, preview(payload), payload.len());
                *guard = Some(stream);
            }
            Err(e) if e.is_fatal_for_session() => {
                warn!("Session with {} failed during `{}`: {}", self.label, command, e);
                self.closed.store(true, Ordering::Release);
            }
            Err(_) => *guard = Some(stream),
        }
        result
    }
}

/// Marks the session closed if an exchange is dropped before it completes.
///
/// The reply to an abandoned request may still arrive, so the stream can
/// never be reused.
struct InFlight<'a> {
    session: &'a Session,
    command: &'a str,
    completed: bool,
}

impl<'a> InFlight<'a> {
    fn new(session: &'a Session, command: &'a str) -> Self {
        Self {
            session,
            command,
            completed: false,
        }
    }

    fn complete(&mut self) {
        self.completed = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.completed {
            warn!(
                "Call `{}` to {} was cancelled, dropping the session",
                self.command, self.session.label
            );
            self.session.closed.store(true, Ordering::Release);
        }
    }
}

/// Bind the IPv4 wildcard address for incoming drivers.
pub async fn bind_listener(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.map_err(|e| DriverError::Listen {
        addr: addr.to_string(),
        reason: e.to_string(),
    })?;
    let bound = listener.local_addr().unwrap_or(addr);
    info!("Listening for drivers on {}", bound);
    Ok(listener)
}

async fn round_trip(stream: &mut TcpStream, frame: &[u8], peer: &str) -> Result<Bytes> {
    stream
        .write_all(frame)
        .await
        .map_err(|e| DriverError::connection_aborted(peer, e))?;
    stream
        .flush()
        .await
        .map_err(|e| DriverError::connection_aborted(peer, e))?;

    let mut decoder = ResponseDecoder::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| DriverError::connection_aborted(peer, e))?;
        if let Some(payload) = decoder
            .feed(&chunk[..n])
            .map_err(|e| DriverError::from_frame(e, peer))?
        {
            return Ok(payload);
        }
    }
}

/// Log-friendly excerpt of a frame.
fn preview(bytes: &[u8]) -> Cow<'_, str> {
    if bytes.len() <= LOG_PREVIEW_LEN {
        String::from_utf8_lossy(bytes)
    } else {
        Cow::Owned(format!(
            "{}...",
            String::from_utf8_lossy(&bytes[..LOG_PREVIEW_LEN])
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use drivewire_core::args;
    use drivewire_core::codec::encode_response;
    use tokio::task::JoinSet;

    use super::*;
    use crate::driver::test_support::{connected_session, read_request, FakeDriver};

    #[tokio::test]
    async fn test_call_returns_trimmed_text() {
        let FakeDriver { session, requests, .. } =
            connected_session(|_| b"  true\n".to_vec()).await;

        let reply = session.call(&args!["click", 12.5, 7]).await.unwrap();
        assert_eq!(reply, "true");
        assert_eq!(
            requests.lock().unwrap()[0],
            vec!["click".to_string(), "12.5".to_string(), "7".to_string()]
        );
    }

    #[tokio::test]
    async fn test_response_split_across_reads() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let driver = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            read_request(&mut stream).await.unwrap();
            for part in [&b"1"[..], b"1/hello", b" world"] {
                stream.write_all(part).await.unwrap();
                stream.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            stream
        });
        let session = Session::accept_from(&listener, SessionOptions::default())
            .await
            .unwrap();

        let reply = session.call(&args!["getText"]).await.unwrap();
        assert_eq!(reply, "hello world");
        drop(driver.await.unwrap());
    }

    #[tokio::test]
    async fn test_disconnect_poisons_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            read_request(&mut stream).await;
            // close without replying
        });
        let session = Session::accept_from(&listener, SessionOptions::default())
            .await
            .unwrap();

        let err = session.call(&args!["home"]).await.unwrap_err();
        assert!(matches!(err, DriverError::ConnectionAborted { .. }));
        assert!(session.is_closed());

        let again = session.call(&args!["home"]).await.unwrap_err();
        assert!(again.to_string().contains("session already closed"));
    }

    #[tokio::test]
    async fn test_malformed_prefix_is_fatal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            read_request(&mut stream).await;
            stream.write_all(b"abc/whatever").await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });
        let session = Session::accept_from(&listener, SessionOptions::default())
            .await
            .unwrap();

        let err = session.call(&args!["getColor", 1, 2]).await.unwrap_err();
        assert!(matches!(err, DriverError::MalformedFrame { .. }));
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_binary_payload_is_untouched() {
        let png = vec![0x89, b'P', b'N', b'G', 0x00, 0xff, b'\n'];
        let expected = png.clone();
        let FakeDriver { session, .. } = connected_session(move |_| png.clone()).await;

        let bytes = session.call_binary(&args!["takeScreenshot"]).await.unwrap();
        assert_eq!(bytes.as_ref(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_push_file_uses_three_field_framing() {
        let FakeDriver { session, raw, .. } = connected_session(|_| b"true".to_vec()).await;

        let reply = session
            .push_file("pushFile", "/storage/emulated/0/a.bin", &[0, 1, 2, 255])
            .await
            .unwrap();
        assert_eq!(reply, "true");

        let frames = raw.lock().unwrap();
        assert_eq!(frames[0][0], b"pushFile".to_vec());
        assert_eq!(frames[0][1], b"/storage/emulated/0/a.bin".to_vec());
        assert_eq!(frames[0][2], vec![0, 1, 2, 255]);
    }

    #[tokio::test]
    async fn test_empty_command_rejected_without_io() {
        let FakeDriver { session, requests, .. } = connected_session(|_| b"x".to_vec()).await;
        let err = session.call(&[]).await.unwrap_err();
        assert!(matches!(err, DriverError::InvalidArgument(_)));
        assert!(!session.is_closed());
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_calls_never_interleave() {
        let FakeDriver { session, .. } =
            connected_session(|req| format!("echo:{}", req[1]).into_bytes()).await;
        let session = Arc::new(session);

        let mut tasks = JoinSet::new();
        for i in 0..16 {
            let session = session.clone();
            tasks.spawn(async move {
                let tag = format!("task-{}", i);
                let reply = session.call(&args!["echo", tag.as_str()]).await.unwrap();
                assert_eq!(reply, format!("echo:{}", tag));
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap();
        }
    }

    #[tokio::test]
    async fn test_call_timeout_aborts_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            read_request(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(2)).await;
            let _ = stream.write_all(&encode_response(b"late")).await;
        });
        let options = SessionOptions {
            send_buffer_size: None,
            call_timeout: Some(Duration::from_millis(100)),
        };
        let session = Session::accept_from(&listener, options).await.unwrap();

        let err = session.call(&args!["findImage"]).await.unwrap_err();
        assert!(matches!(err, DriverError::ConnectionAborted { .. }));
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_cancelled_call_drops_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            while let Some(fields) = read_request(&mut stream).await {
                let command = String::from_utf8_lossy(&fields[0]).into_owned();
                if command == "slow" {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                let reply = format!("reply-to-{}", command);
                if stream.write_all(&encode_response(reply.as_bytes())).await.is_err() {
                    return;
                }
            }
        });
        let session = Session::accept_from(&listener, SessionOptions::default())
            .await
            .unwrap();

        let cancelled =
            tokio::time::timeout(Duration::from_millis(50), session.call(&args!["slow"])).await;
        assert!(cancelled.is_err());
        assert!(session.is_closed());

        let err = session.call(&args!["fast"]).await.unwrap_err();
        assert!(matches!(err, DriverError::ConnectionAborted { .. }));
    }

    #[tokio::test]
    async fn test_connect_role_and_metadata() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            stream.write_all(&encode_response(b"ok")).await.unwrap();
        });

        let before = Utc::now();
        let options = SessionOptions {
            send_buffer_size: Some(1024 * 1024),
            call_timeout: None,
        };
        let session = Session::connect(addr, options).await.unwrap();
        assert_eq!(session.peer_addr(), addr);
        assert!(session.connected_at() >= before);
        assert_eq!(session.call(&args!["ping"]).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_close_then_call_fails() {
        let FakeDriver { session, .. } = connected_session(|_| b"true".to_vec()).await;
        session.close().await;
        assert!(session.is_closed());
        let err = session.call(&args!["home"]).await.unwrap_err();
        assert!(matches!(err, DriverError::ConnectionAborted { .. }));
    }

    #[test]
    fn test_preview_truncates() {
        let long = vec![b'a'; 1000];
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.len(), LOG_PREVIEW_LEN + 3);
        assert_eq!(preview(b"short"), "short");
    }
}
