//! # CompilationJob: one compiler run, from spawn to terminal phrase.
//!
//! Spawns the compiler subprocess with stdout and stderr merged into a single
//! pipe, wraps the read end in a [`LogStreamReader`], and accumulates its output
//! for the compiling page.
//!
//! ## Flow
//! ```text
//! spawn(program, args, file)
//!   ├─► pipe() → (reader, writer); writer cloned into stdout + stderr
//!   ├─► Command::spawn(); parent copies of the writer dropped
//!   ├─► LogStreamReader::spawn(reader)          (blocking task)
//!   ├─► reaper task: child.wait() → exit code   (async task)
//!   └─► publish CompileStarted
//!
//! poll_output()
//!   └─► drain reader queue → append to accumulated → return full text
//! ```
//!
//! ## Rules
//! - `poll_output` never blocks; the accumulated text only grows.
//! - A job is terminal once its reader reached end-of-stream.
//! - A superseded job is simply dropped by its owner: the reader task keeps
//!   draining the pipe to EOF and exits on its own.

use std::ffi::OsString;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, OnceLock};

use tokio::process::Command;

use super::reader::{CompileOutcome, LogStreamReader, StreamEnd};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};

/// Final outcome of a compilation, once known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileReport {
    /// How the output stream ended.
    pub end: StreamEnd,
    /// Compiler exit code; `None` while still running or when killed by a signal.
    pub exit_code: Option<i32>,
}

impl CompileReport {
    /// True when the success phrase was seen and the compiler did not report failure.
    pub fn succeeded(&self) -> bool {
        matches!(self.end, StreamEnd::Finished(CompileOutcome::Success))
            && self.exit_code.is_none_or(|c| c == 0)
    }
}

/// An in-flight (or finished) compilation.
pub struct CompilationJob {
    source: PathBuf,
    reader: LogStreamReader,
    accumulated: Mutex<String>,
    exit_code: Arc<OnceLock<Option<i32>>>,
}

impl CompilationJob {
    /// Spawns `program args... source` with merged stdout/stderr.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        program: &Path,
        args: &[OsString],
        working_dir: Option<&Path>,
        source: &Path,
        bus: Bus,
    ) -> Result<Self, RuntimeError> {
        let spawn_err = |source: std::io::Error| RuntimeError::Spawn {
            program: program.to_path_buf(),
            source,
        };

        let (pipe_rd, pipe_wr) = std::io::pipe().map_err(spawn_err)?;
        let stderr_wr = pipe_wr.try_clone().map_err(spawn_err)?;

        let mut child = {
            let mut cmd = Command::new(program);
            cmd.args(args)
                .arg(source)
                .stdin(Stdio::null())
                .stdout(pipe_wr)
                .stderr(stderr_wr);
            if let Some(dir) = working_dir {
                cmd.current_dir(dir);
            }
            // `cmd` owns the write ends; dropping it at the end of this block
            // leaves the child as the only writer, so EOF arrives when it exits.
            cmd.spawn().map_err(spawn_err)?
        };

        let pid = child.id();
        let reader = LogStreamReader::spawn(BufReader::new(pipe_rd), bus.clone());

        let exit_code = Arc::new(OnceLock::new());
        let slot = Arc::clone(&exit_code);
        let reaper_bus = bus.clone();
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to reap compiler");
                    None
                }
            };
            let _ = slot.set(code);
            reaper_bus.publish(Event::new(EventKind::CompilerExited).with_exit_code(code));
        });

        tracing::info!(?pid, source = %source.display(), "compiler spawned");
        bus.publish(
            Event::new(EventKind::CompileStarted)
                .with_reason(source.display().to_string())
                .with_pid(pid),
        );

        Ok(Self::from_parts(source.to_path_buf(), reader, exit_code))
    }

    fn from_parts(
        source: PathBuf,
        reader: LogStreamReader,
        exit_code: Arc<OnceLock<Option<i32>>>,
    ) -> Self {
        Self {
            source,
            reader,
            accumulated: Mutex::new(String::new()),
            exit_code,
        }
    }

    /// Wraps an already-running reader (no child process).
    pub fn from_reader(source: impl Into<PathBuf>, reader: LogStreamReader) -> Self {
        Self::from_parts(source.into(), reader, Arc::new(OnceLock::new()))
    }

    /// Source file being compiled.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Drains every buffered line and returns the full output so far.
    pub fn poll_output(&self) -> String {
        let mut acc = self.accumulated.lock().unwrap_or_else(|p| p.into_inner());
        // Drained under the accumulator lock so concurrent pollers append in order.
        for line in self.reader.drain() {
            acc.push_str(&line.text);
        }
        acc.clone()
    }

    /// True once the output stream ended (terminal phrase or EOF). Monotonic.
    pub fn is_terminal(&self) -> bool {
        self.reader.is_end_of_stream()
    }

    /// Outcome, once the stream ended.
    pub fn report(&self) -> Option<CompileReport> {
        self.reader.end().map(|end| CompileReport {
            end,
            exit_code: self.exit_code.get().copied().flatten(),
        })
    }

    /// Underlying reader, for consumers that want `read_line` with a timeout.
    pub fn reader(&self) -> &LogStreamReader {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use super::*;

    async fn settle(job: &CompilationJob) {
        for _ in 0..200 {
            if job.is_terminal() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job never became terminal");
    }

    #[tokio::test]
    async fn test_poll_output_accumulates_without_duplicates() {
        let reader = LogStreamReader::spawn(
            Cursor::new("one\ntwo\nCompilation finished successfully!\n"),
            Bus::new(16),
        );
        let job = CompilationJob::from_reader("prog.st", reader);
        settle(&job).await;

        let first = job.poll_output();
        let second = job.poll_output();
        assert_eq!(first, "one\ntwo\nCompilation finished successfully!\n");
        assert_eq!(first, second);
        assert_eq!(
            job.report().map(|r| r.end),
            Some(StreamEnd::Finished(CompileOutcome::Success))
        );
    }

    #[test]
    fn test_report_success_requires_clean_exit() {
        let ok = CompileReport {
            end: StreamEnd::Finished(CompileOutcome::Success),
            exit_code: Some(0),
        };
        let bad_exit = CompileReport {
            end: StreamEnd::Finished(CompileOutcome::Success),
            exit_code: Some(2),
        };
        let unknown_exit = CompileReport {
            end: StreamEnd::Finished(CompileOutcome::Success),
            exit_code: None,
        };
        let eof = CompileReport {
            end: StreamEnd::UnexpectedEof,
            exit_code: Some(0),
        };
        assert!(ok.succeeded());
        assert!(!bad_exit.succeeded());
        assert!(unknown_exit.succeeded());
        assert!(!eof.succeeded());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_merges_stdout_and_stderr() {
        let script = "echo out; echo err 1>&2; echo \"file=$1\"; echo 'Compilation finished successfully!'";
        let args = vec![OsString::from("-c"), OsString::from(script), OsString::from("compile")];
        let job = CompilationJob::spawn(
            Path::new("sh"),
            &args,
            None,
            Path::new("blink.st"),
            Bus::new(64),
        )
        .unwrap();
        settle(&job).await;

        let out = job.poll_output();
        assert!(out.starts_with("out\nerr\nfile=blink.st\n"), "{out:?}");
        assert!(out.ends_with("Compilation finished successfully!\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_compiler_finishes_work_after_terminal_phrase() {
        let marker = std::env::temp_dir().join(format!("plcvisor-tail-{}", std::process::id()));
        let _ = std::fs::remove_file(&marker);
        let script = "echo 'Compilation finished successfully!'; sleep 0.2; \
                      echo cleanup; echo cleanup; echo cleanup; touch \"$1\"";
        let args = vec![OsString::from("-c"), OsString::from(script), OsString::from("compile")];
        let job = CompilationJob::spawn(Path::new("sh"), &args, None, &marker, Bus::new(64)).unwrap();
        settle(&job).await;

        let mut exit_code = None;
        for _ in 0..400 {
            exit_code = job.report().and_then(|r| r.exit_code);
            if exit_code.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(exit_code, Some(0));
        assert!(marker.exists(), "compiler was cut short");
        assert!(job.report().unwrap().succeeded());
        assert_eq!(job.poll_output(), "Compilation finished successfully!\n");
        let _ = std::fs::remove_file(&marker);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let res = CompilationJob::spawn(
            Path::new("/definitely/not/a/compiler"),
            &[],
            None,
            Path::new("x.st"),
            Bus::new(4),
        );
        assert!(matches!(res, Err(RuntimeError::Spawn { .. })));
    }
}
