//! # One-shot control-port client.
//!
//! [`ControlClient`] performs a single request/reply exchange per call:
//!
//! ```text
//! send_raw(text, max_reply_bytes)
//!   ├─► connect(addr)            (bounded by connect_timeout)
//!   ├─► write "text\n"           (bounded by io_timeout)
//!   ├─► read until '\n', EOF or max_reply_bytes
//!   │      (each read bounded by io_timeout)
//!   └─► close, return reply text
//! ```
//!
//! ## Rules
//! - No persistent connection: a hung or crashed engine only affects the call in flight.
//! - Every I/O failure is returned as [`ControlError::Unreachable`] or
//!   [`ControlError::TimedOut`]; nothing panics.
//! - A reply that stops mid-way is returned as received once the next read times out.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use super::command::Command;
use crate::error::ControlError;

/// Stateless client for the engine's control endpoint. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ControlClient {
    addr: SocketAddr,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl ControlClient {
    /// Creates a client for `addr` with the given connect and per-read timeouts.
    pub fn new(addr: SocketAddr, connect_timeout: Duration, io_timeout: Duration) -> Self {
        Self {
            addr,
            connect_timeout,
            io_timeout,
        }
    }

    /// Control endpoint this client dials.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends a typed command using its default reply limit.
    pub async fn send(&self, command: Command) -> Result<String, ControlError> {
        self.send_raw(&command.wire(), command.reply_limit()).await
    }

    /// Opens a connection, writes `command` plus a newline, reads at most
    /// `max_reply_bytes` of reply and closes the connection.
    pub async fn send_raw(
        &self,
        command: &str,
        max_reply_bytes: usize,
    ) -> Result<String, ControlError> {
        let mut stream = match time::timeout(self.connect_timeout, TcpStream::connect(self.addr))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.unreachable(e)),
            Err(_elapsed) => return Err(self.timed_out(self.connect_timeout)),
        };

        let mut request = Vec::with_capacity(command.len() + 1);
        request.extend_from_slice(command.as_bytes());
        request.push(b'\n');
        match time::timeout(self.io_timeout, stream.write_all(&request)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.unreachable(e)),
            Err(_elapsed) => return Err(self.timed_out(self.io_timeout)),
        }

        let reply = self.read_reply(&mut stream, max_reply_bytes).await?;
        let _ = stream.shutdown().await;
        Ok(reply)
    }

    /// Exec-time query parsed as whole seconds.
    pub async fn exec_time_secs(&self) -> Result<u64, ControlError> {
        let reply = self.send(Command::ExecTime).await?;
        reply
            .trim()
            .parse::<u64>()
            .map_err(|_| ControlError::MalformedReply {
                command: Command::ExecTime.wire(),
                reply,
            })
    }

    async fn read_reply(
        &self,
        stream: &mut TcpStream,
        max_reply_bytes: usize,
    ) -> Result<String, ControlError> {
        let max = max_reply_bytes.max(1);
        let mut buf = vec![0u8; max];
        let mut filled = 0usize;

        while filled < max {
            match time::timeout(self.io_timeout, stream.read(&mut buf[filled..])).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    filled += n;
                    if buf[filled - 1] == b'\n' {
                        break;
                    }
                }
                Ok(Err(e)) if filled == 0 => return Err(self.unreachable(e)),
                Ok(Err(e)) => {
                    tracing::debug!(addr = %self.addr, error = %e, "reply cut short");
                    break;
                }
                Err(_elapsed) if filled == 0 => return Err(self.timed_out(self.io_timeout)),
                Err(_elapsed) => break,
            }
        }

        buf.truncate(filled);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn unreachable(&self, e: std::io::Error) -> ControlError {
        ControlError::Unreachable {
            addr: self.addr,
            reason: e.to_string(),
        }
    }

    fn timed_out(&self, after: Duration) -> ControlError {
        ControlError::TimedOut {
            addr: self.addr,
            after,
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    use super::*;

    fn client(addr: SocketAddr) -> ControlClient {
        ControlClient::new(addr, Duration::from_secs(1), Duration::from_millis(300))
    }

    /// Accepts one connection, records the request line, answers with `reply`.
    async fn one_shot_engine(reply: &'static str) -> (SocketAddr, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (rd, mut wr) = stream.into_split();
            let mut line = String::new();
            BufReader::new(rd).read_line(&mut line).await.unwrap();
            wr.write_all(reply.as_bytes()).await.unwrap();
            line
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_command_is_newline_terminated() {
        let (addr, engine) = one_shot_engine("OK\n").await;
        let reply = client(addr).send(Command::Quit).await.unwrap();
        assert_eq!(reply, "OK\n");
        assert_eq!(engine.await.unwrap(), "quit()\n");
    }

    #[tokio::test]
    async fn test_nothing_listening_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(addr).send(Command::ExecTime).await.unwrap_err();
        assert!(err.is_unreachable(), "{err:?}");
        assert!(matches!(err, ControlError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_reply_is_capped() {
        let (addr, _engine) = one_shot_engine("0123456789\n").await;
        let reply = client(addr).send_raw("runtime_logs()", 4).await.unwrap();
        assert_eq!(reply, "0123");
    }

    #[tokio::test]
    async fn test_silent_engine_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let err = client(addr).send(Command::ExecTime).await.unwrap_err();
        assert!(matches!(err, ControlError::TimedOut { .. }), "{err:?}");
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_exec_time_parse() {
        let (addr, _engine) = one_shot_engine("3661\n").await;
        assert_eq!(client(addr).exec_time_secs().await.unwrap(), 3661);

        let (addr, _engine) = one_shot_engine("oops\n").await;
        let err = client(addr).exec_time_secs().await.unwrap_err();
        assert!(matches!(err, ControlError::MalformedReply { .. }));
        assert!(!err.is_unreachable());
    }
}
