//! # Transport Abstraction
//!
//! A minimal, async interface for moving whole messages between the peer and
//! the host.
//!
//! ## Philosophy
//!
//! - **Message-Oriented**: `recv` yields exactly one encoded message at a time.
//!   The transport finds message boundaries but never interprets the contents.
//! - **Duplex**: both sides may send at any moment. Correlation of requests and
//!   responses is the peer's job, not the transport's.

use std::fmt;
use std::process::Stdio;

use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::ToSocketAddrs;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::Mutex;

use nvwire::FrameScanner;

/// Errors that occur at the stream layer. Any of these ends the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The host hung up or the stream was closed.
    ConnectionLost(String),
    /// Generic I/O error or an undecodable byte stream.
    Io(String),
    /// The embedded host process could not be started.
    Spawn(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
            Self::Spawn(msg) => write!(f, "Failed to spawn host: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof => Self::ConnectionLost(e.to_string()),
            _ => Self::Io(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A duplex channel of encoded messages.
///
/// This trait is designed to be object-safe (`Arc<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Writes one encoded message.
    async fn send(&self, payload: &[u8]) -> Result<()>;

    /// Reads the next encoded message. `Ok(None)` means the stream closed cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>>;

    /// Closes the outbound direction. The default does nothing.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Stream transport
// ============================================================================

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

const READ_CHUNK: usize = 8 * 1024;

struct ReadState {
    stream: BoxedReader,
    buf: Vec<u8>,
    /// Progress through the message at the front of `buf`.
    scanner: FrameScanner,
}

/// A transport over any byte stream pair: stdio, sockets, or a child's pipes.
pub struct StreamTransport {
    reader: Mutex<ReadState>,
    writer: Mutex<BoxedWriter>,
}

impl StreamTransport {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Mutex::new(ReadState {
                stream: Box::new(reader),
                buf: Vec::new(),
                scanner: FrameScanner::new(),
            }),
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Talks to the host over this process's stdin and stdout.
    ///
    /// This is how a host launches a plugin. Nothing else may write to stdout.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    pub async fn connect_tcp(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (r, w) = stream.into_split();
        Ok(Self::new(r, w))
    }

    #[cfg(unix)]
    pub async fn connect_unix(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let stream = tokio::net::UnixStream::connect(path).await?;
        let (r, w) = stream.into_split();
        Ok(Self::new(r, w))
    }

    /// Starts a host as a child process speaking the protocol on its stdio,
    /// e.g. `spawn_embedded("nvim", ["--embed", "--headless"])`.
    ///
    /// The child is killed when the returned handle is dropped.
    pub fn spawn_embedded<I, S>(program: &str, args: I) -> Result<(Self, Child)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransportError::Spawn(format!("{}: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("child stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("child stdout not captured".into()))?;

        Ok((Self::new(stdout, stdin), child))
    }
}

#[async_trait::async_trait]
impl Transport for StreamTransport {
    async fn send(&self, payload: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(payload).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>> {
        let mut state = self.reader.lock().await;
        let ReadState { stream, buf, scanner } = &mut *state;
        loop {
            if let Some(n) = scanner.scan(&buf[..]).map_err(|e| TransportError::Io(e.to_string()))? {
                return Ok(Some(buf.drain(..n).collect()));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let read = stream.read(&mut chunk).await?;
            if read == 0 {
                if buf.is_empty() {
                    return Ok(None);
                }
                return Err(TransportError::ConnectionLost(format!(
                    "stream closed with {} bytes of a partial message",
                    buf.len()
                )));
            }
            buf.extend_from_slice(&chunk[..read]);
        }
    }

    async fn close(&self) -> Result<()> {
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::DuplexStream;

    use nvwire::Message;
    use nvwire::Value;

    use super::*;

    /// A transport reading from and writing to the returned host end.
    fn connect(capacity: usize) -> (StreamTransport, DuplexStream) {
        let (ours, host) = tokio::io::duplex(capacity);
        let (r, w) = tokio::io::split(ours);
        (StreamTransport::new(r, w), host)
    }

    fn notification(method: &str, params: Vec<Value>) -> Vec<u8> {
        Message::Notification { method: method.into(), params }.encode().unwrap()
    }

    #[tokio::test]
    async fn test_splits_back_to_back_messages() {
        let (transport, mut host) = connect(64 * 1024);
        let a = notification("a", vec![Value::from(1i64)]);
        let b = notification("b", vec![Value::from("two")]);
        let c = notification("c", vec![]);

        let mut all = a.clone();
        all.extend_from_slice(&b);
        all.extend_from_slice(&c);
        host.write_all(&all).await.unwrap();

        assert_eq!(transport.recv().await.unwrap(), Some(a));
        assert_eq!(transport.recv().await.unwrap(), Some(b));
        assert_eq!(transport.recv().await.unwrap(), Some(c));
    }

    #[tokio::test]
    async fn test_joins_a_message_arriving_in_pieces() {
        let (transport, mut host) = connect(64 * 1024);
        let message = notification("pieces", vec![Value::from("x".repeat(100)), Value::from(7i64)]);

        let expected = message.clone();
        let writer = tokio::spawn(async move {
            for piece in message.chunks(3) {
                host.write_all(piece).await.unwrap();
                host.flush().await.unwrap();
                tokio::task::yield_now().await;
            }
            host
        });

        assert_eq!(transport.recv().await.unwrap(), Some(expected));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_clean_eof_is_none() {
        let (transport, mut host) = connect(1024);
        let message = notification("last", vec![]);
        host.write_all(&message).await.unwrap();
        drop(host);

        assert_eq!(transport.recv().await.unwrap(), Some(message));
        assert_eq!(transport.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_eof_inside_a_message_is_connection_lost() {
        let (transport, mut host) = connect(1024);
        let message = notification("cut", vec![Value::from("abcdef")]);
        host.write_all(&message[..message.len() - 2]).await.unwrap();
        drop(host);

        assert!(matches!(transport.recv().await, Err(TransportError::ConnectionLost(_))));
    }

    #[tokio::test]
    async fn test_garbage_is_an_io_error() {
        let (transport, mut host) = connect(1024);
        host.write_all(&[0xc1]).await.unwrap();
        assert!(matches!(transport.recv().await, Err(TransportError::Io(_))));
    }

    #[tokio::test]
    async fn test_send_writes_whole_message() {
        let (transport, mut host) = connect(1024);
        let message = notification("out", vec![Value::from(true)]);
        transport.send(&message).await.unwrap();
        transport.close().await.unwrap();

        let mut received = Vec::new();
        host.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, message);
    }

    #[tokio::test]
    async fn test_large_message_through_small_pipe() {
        let (transport, mut host) = connect(8 * 1024);
        let line = "z".repeat(1024);
        let lines: Vec<Value> = (0..4 * 1024).map(|_| Value::from(line.as_str())).collect();
        let message = notification("nvim_buf_lines_event", vec![Value::Array(lines)]);
        assert!(message.len() > 4 * 1024 * 1024);

        let expected_len = message.len();
        let writer = tokio::spawn(async move {
            host.write_all(&message).await.unwrap();
            host
        });

        let received = tokio::time::timeout(Duration::from_secs(20), transport.recv())
            .await
            .expect("reading a large message took too long")
            .unwrap()
            .unwrap();
        assert_eq!(received.len(), expected_len);
        assert!(Message::decode(&received).is_ok());
        writer.await.unwrap();
    }

    #[test]
    fn test_io_error_mapping() {
        use std::io::Error as IoError;
        use std::io::ErrorKind;

        for kind in [
            ErrorKind::BrokenPipe,
            ErrorKind::ConnectionReset,
            ErrorKind::ConnectionAborted,
            ErrorKind::UnexpectedEof,
        ] {
            let err = TransportError::from(IoError::new(kind, "gone"));
            assert!(matches!(err, TransportError::ConnectionLost(_)), "{:?}", kind);
        }
        let err = TransportError::from(IoError::new(ErrorKind::PermissionDenied, "no"));
        assert!(matches!(err, TransportError::Io(_)));
    }
}
