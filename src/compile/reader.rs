//! # LogStreamReader: blocking line stream → pollable queue.
//!
//! Converts a blocking, line-oriented byte stream (the compiler's merged
//! stdout/stderr) into a non-blocking sequence of [`LogLine`]s for one consumer,
//! while forwarding every line to the event bus for live viewers.
//!
//! ## Architecture
//! ```text
//!  child pipe ──► [blocking reader task] ──┬──► queue (Mutex<VecDeque>) ──► read_line / drain
//!                   read_line() loop       ├──► Bus: CompileOutput
//!                                          └──► end_of_stream (AtomicBool) + Notify
//! ```
//!
//! ## Rules
//! - Lines are delivered in the exact order the child produced them.
//! - The queue ends with the line containing a terminal phrase, or at EOF. After
//!   the phrase the pipe is still read to EOF (forwarded to the bus only), so the
//!   child can finish writing without hitting a closed pipe.
//! - `end_of_stream` is monotonic: once true, stays true.
//! - EOF before a terminal phrase is [`StreamEnd::UnexpectedEof`], a value, not an error.
//! - A line is enqueued **before** `end_of_stream` is raised, so a consumer that
//!   sees the flag and then drains never misses the terminal line.

use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};

use crate::events::{Bus, Event, EventKind};

/// Phrase printed by the compiler script when the build failed.
pub const FINISHED_WITH_ERRORS: &str = "Compilation finished with errors!";
/// Phrase printed by the compiler script when the build succeeded.
pub const FINISHED_SUCCESSFULLY: &str = "Compilation finished successfully!";

/// One line of child output with its position in the stream (0-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Position in the stream.
    pub seq: u64,
    /// Line text, including the trailing newline when the child wrote one.
    pub text: String,
}

/// Result announced by a terminal phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    /// `"Compilation finished successfully!"`
    Success,
    /// `"Compilation finished with errors!"`
    Failure,
}

impl CompileOutcome {
    /// Detects a terminal phrase anywhere in `line`.
    pub fn detect(line: &str) -> Option<Self> {
        if line.contains(FINISHED_WITH_ERRORS) {
            Some(CompileOutcome::Failure)
        } else if line.contains(FINISHED_SUCCESSFULLY) {
            Some(CompileOutcome::Success)
        } else {
            None
        }
    }

    /// Stable lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            CompileOutcome::Success => "success",
            CompileOutcome::Failure => "errors",
        }
    }
}

/// How the stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// A terminal phrase was observed.
    Finished(CompileOutcome),
    /// The stream closed before any terminal phrase.
    UnexpectedEof,
    /// Reading failed; the stream is treated as closed.
    ReadError(String),
}

/// State shared between the background reader and the consumer.
struct Shared {
    queue: Mutex<VecDeque<LogLine>>,
    end: Mutex<Option<StreamEnd>>,
    end_of_stream: AtomicBool,
    notify: Notify,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, VecDeque<LogLine>> {
        self.queue.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn finish(&self, end: StreamEnd) {
        *self.end.lock().unwrap_or_else(|p| p.into_inner()) = Some(end);
        self.end_of_stream.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

/// Non-blocking, pollable view over a blocking line stream.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct LogStreamReader {
    shared: Arc<Shared>,
}

impl LogStreamReader {
    /// Takes ownership of `stream` and starts the background reading task.
    ///
    /// Each line is forwarded to `bus` as [`EventKind::CompileOutput`]. Must be
    /// called from within a tokio runtime.
    pub fn spawn<R>(stream: R, bus: Bus) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            end: Mutex::new(None),
            end_of_stream: AtomicBool::new(false),
            notify: Notify::new(),
        });

        let worker = Arc::clone(&shared);
        tokio::task::spawn_blocking(move || populate(stream, &worker, &bus));

        Self { shared }
    }

    /// Returns the next buffered line, waiting at most `timeout`.
    ///
    /// - `Duration::ZERO` never waits.
    /// - Returns `None` on timeout, or once the stream ended and the queue is empty.
    pub async fn read_line(&self, timeout: Duration) -> Option<LogLine> {
        if timeout.is_zero() {
            return self.try_read_line();
        }

        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(line) = self.try_read_line() {
                return Some(line);
            }
            if self.is_end_of_stream() {
                // The terminal line may have landed between the pop and the flag check.
                return self.try_read_line();
            }
            if time::timeout_at(deadline, notified).await.is_err() {
                return self.try_read_line();
            }
        }
    }

    /// Pops the next buffered line without waiting.
    pub fn try_read_line(&self) -> Option<LogLine> {
        self.shared.queue().pop_front()
    }

    /// Takes every buffered line, oldest first.
    pub fn drain(&self) -> Vec<LogLine> {
        self.shared.queue().drain(..).collect()
    }

    /// True once a terminal phrase was read or the stream closed. Monotonic.
    pub fn is_end_of_stream(&self) -> bool {
        self.shared.end_of_stream.load(Ordering::Acquire)
    }

    /// How the stream ended, once it has.
    pub fn end(&self) -> Option<StreamEnd> {
        self.shared
            .end
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

/// Background loop: read, enqueue, forward, detect terminal phrases.
fn populate<R: BufRead>(mut stream: R, shared: &Shared, bus: &Bus) {
    let mut seq = 0u64;
    loop {
        let mut text = String::new();
        let end = match stream.read_line(&mut text) {
            Ok(0) => Some(StreamEnd::UnexpectedEof),
            Ok(_) => {
                let outcome = CompileOutcome::detect(&text);
                bus.publish(Event::new(EventKind::CompileOutput).with_line(text.as_str()));
                shared.queue().push_back(LogLine { seq, text });
                seq += 1;
                shared.notify.notify_waiters();
                outcome.map(StreamEnd::Finished)
            }
            Err(e) => Some(StreamEnd::ReadError(e.to_string())),
        };

        let Some(end) = end else { continue };
        match &end {
            StreamEnd::Finished(outcome) => {
                bus.publish(Event::new(EventKind::CompileFinished).with_reason(outcome.as_str()));
            }
            StreamEnd::UnexpectedEof => {
                tracing::warn!(lines = seq, "compiler output ended without a terminal phrase");
                bus.publish(
                    Event::new(EventKind::CompileStreamEnded).with_reason("unexpected end of stream"),
                );
            }
            StreamEnd::ReadError(reason) => {
                tracing::warn!(lines = seq, %reason, "compiler output read failed");
                bus.publish(Event::new(EventKind::CompileStreamEnded).with_reason(reason.as_str()));
            }
        }
        let finished = matches!(end, StreamEnd::Finished(_));
        shared.finish(end);
        if finished {
            drain_tail(stream, bus);
        }
        return;
    }
}

/// Keeps the read end open after the terminal phrase until the child closes
/// it, so late writes do not raise SIGPIPE in the compiler. Tail lines only
/// reach the bus; the queue is final.
fn drain_tail<R: BufRead>(mut stream: R, bus: &Bus) {
    let mut text = String::new();
    loop {
        text.clear();
        match stream.read_line(&mut text) {
            Ok(0) => return,
            Ok(_) => bus.publish(Event::new(EventKind::CompileOutput).with_line(text.as_str())),
            Err(e) => {
                tracing::debug!(error = %e, "compiler output tail unreadable");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    async fn wait_eos(reader: &LogStreamReader) {
        for _ in 0..200 {
            if reader.is_end_of_stream() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("reader never reached end of stream");
    }

    #[test]
    fn test_detect_phrases() {
        assert_eq!(
            CompileOutcome::detect("Compilation finished successfully!\n"),
            Some(CompileOutcome::Success)
        );
        assert_eq!(
            CompileOutcome::detect("[ERR] Compilation finished with errors!"),
            Some(CompileOutcome::Failure)
        );
        assert_eq!(CompileOutcome::detect("Compiling main.st"), None);
    }

    #[tokio::test]
    async fn test_lines_in_order() {
        let input = "L1\nL2\nL3\nCompilation finished successfully!\n";
        let reader = LogStreamReader::spawn(Cursor::new(input), Bus::new(16));

        let mut got = Vec::new();
        while let Some(line) = reader.read_line(Duration::from_millis(500)).await {
            got.push(line);
        }

        let texts: Vec<&str> = got.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            ["L1\n", "L2\n", "L3\n", "Compilation finished successfully!\n"]
        );
        let seqs: Vec<u64> = got.iter().map(|l| l.seq).collect();
        assert_eq!(seqs, [0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stops_at_terminal_phrase() {
        let input = "a\nCompilation finished with errors!\nafter\n";
        let reader = LogStreamReader::spawn(Cursor::new(input), Bus::new(16));
        wait_eos(&reader).await;

        let lines = reader.drain();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].text.contains(FINISHED_WITH_ERRORS));
        assert_eq!(reader.end(), Some(StreamEnd::Finished(CompileOutcome::Failure)));
    }

    #[tokio::test]
    async fn test_eof_without_phrase_is_unexpected() {
        let reader = LogStreamReader::spawn(Cursor::new("partial\n"), Bus::new(16));
        wait_eos(&reader).await;

        assert_eq!(reader.end(), Some(StreamEnd::UnexpectedEof));
        assert_eq!(reader.drain().len(), 1);
        assert!(reader.is_end_of_stream());
    }

    #[tokio::test]
    async fn test_zero_timeout_never_waits() {
        let (rd, _wr) = std::io::pipe().unwrap();
        let reader = LogStreamReader::spawn(std::io::BufReader::new(rd), Bus::new(16));

        let started = std::time::Instant::now();
        assert!(reader.read_line(Duration::ZERO).await.is_none());
        assert!(reader.read_line(Duration::from_millis(20)).await.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!reader.is_end_of_stream());
    }

    #[tokio::test]
    async fn test_lines_forwarded_to_bus() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let reader = LogStreamReader::spawn(
            Cursor::new("hello\nCompilation finished successfully!\n"),
            bus,
        );
        wait_eos(&reader).await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::CompileOutput);
        assert_eq!(first.line.as_deref(), Some("hello\n"));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, EventKind::CompileOutput);
        let third = rx.recv().await.unwrap();
        assert_eq!(third.kind, EventKind::CompileFinished);
        assert_eq!(third.reason.as_deref(), Some("success"));
    }

    #[tokio::test]
    async fn test_tail_after_phrase_reaches_bus_only() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let reader = LogStreamReader::spawn(
            Cursor::new("ok\nCompilation finished successfully!\ncleanup\n"),
            bus,
        );

        let tail = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let ev = rx.recv().await.unwrap();
                if ev.line.as_deref() == Some("cleanup\n") {
                    return ev;
                }
            }
        })
        .await
        .expect("tail line forwarded");
        assert_eq!(tail.kind, EventKind::CompileOutput);

        let texts: Vec<String> = reader.drain().into_iter().map(|l| l.text).collect();
        assert_eq!(texts, ["ok\n", "Compilation finished successfully!\n"]);
        assert_eq!(reader.end(), Some(StreamEnd::Finished(CompileOutcome::Success)));
    }

    #[tokio::test]
    async fn test_end_of_stream_is_monotonic() {
        let reader = LogStreamReader::spawn(
            Cursor::new("Compilation finished successfully!\n"),
            Bus::new(4),
        );
        wait_eos(&reader).await;
        for _ in 0..10 {
            assert!(reader.is_end_of_stream());
            let _ = reader.drain();
        }
    }
}
