//! Test doubles: a fake engine speaking the control protocol and helpers to
//! build a supervisor around it.
#![allow(dead_code)]

use std::ffi::OsString;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use plcvisor::{
    CompileAdmission, Event, EventKind, RuntimeStatus, Supervisor, SupervisorConfig,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};

/// Reply produced for a request line; `None` keeps the connection open without answering.
pub type Responder = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Replies like a healthy engine: `exec_time()` answers `secs`, logs are fixed, the rest is `OK`.
pub fn healthy(secs: u64) -> Responder {
    Arc::new(move |cmd: &str| {
        Some(match cmd {
            "exec_time()" => format!("{secs}\n"),
            "runtime_logs()" => "engine booted\n".to_string(),
            _ => "OK\n".to_string(),
        })
    })
}

/// Loopback listener that records every request line.
pub struct FakeEngine {
    addr: SocketAddr,
    seen: Arc<Mutex<Vec<String>>>,
    task: Option<JoinHandle<()>>,
}

impl FakeEngine {
    pub async fn start(responder: Responder) -> Self {
        Self::bind("127.0.0.1:0".parse().unwrap(), responder).await
    }

    pub async fn bind(addr: SocketAddr, responder: Responder) -> Self {
        Self::bind_slow(addr, responder, None).await
    }

    /// Like [`start`](Self::start), but answers `command` only after `delay`.
    pub async fn start_slow(responder: Responder, command: &'static str, delay: Duration) -> Self {
        Self::bind_slow("127.0.0.1:0".parse().unwrap(), responder, Some((command, delay))).await
    }

    async fn bind_slow(
        addr: SocketAddr,
        responder: Responder,
        slow: Option<(&'static str, Duration)>,
    ) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let task = tokio::spawn(serve(listener, Arc::clone(&seen), responder, slow));
        Self {
            addr,
            seen,
            task: Some(task),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Request lines received so far, without the newline.
    pub fn commands(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    /// Simulates the engine dying: the port stops accepting connections.
    pub async fn kill(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

async fn serve(
    listener: TcpListener,
    seen: Arc<Mutex<Vec<String>>>,
    responder: Responder,
    slow: Option<(&'static str, Duration)>,
) {
    let mut conns = JoinSet::new();
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let seen = Arc::clone(&seen);
        let responder = Arc::clone(&responder);
        conns.spawn(async move {
            let (rd, mut wr) = stream.into_split();
            let mut line = String::new();
            if BufReader::new(rd).read_line(&mut line).await.is_err() {
                return;
            }
            let cmd = line.trim_end().to_string();
            seen.lock().unwrap().push(cmd.clone());
            if let Some((slow_cmd, delay)) = slow {
                if cmd == slow_cmd {
                    tokio::time::sleep(delay).await;
                }
            }
            match responder(&cmd) {
                Some(reply) => {
                    let _ = wr.write_all(reply.as_bytes()).await;
                }
                None => std::future::pending::<()>().await,
            }
        });
    }
}

/// Configuration pointing at `engine`, with `sh -c script` as the compiler and
/// `true` as the engine binary. Probes run immediately after `start()`.
pub fn config(engine: SocketAddr, compiler_script: &str) -> SupervisorConfig {
    SupervisorConfig {
        control_addr: engine,
        connect_timeout: Duration::from_millis(500),
        io_timeout: Duration::from_millis(500),
        engine_program: "true".into(),
        engine_args: Vec::new(),
        compiler_program: "sh".into(),
        compiler_args: vec![
            OsString::from("-c"),
            OsString::from(compiler_script),
            OsString::from("compile"),
        ],
        working_dir: None,
        startup_grace: Duration::ZERO,
        bus_capacity: 1024,
        admission: CompileAdmission::Reject,
    }
}

pub fn supervisor(cfg: SupervisorConfig) -> Arc<Supervisor> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Supervisor::builder(cfg).build()
}

/// Polls `status()` until it leaves `Compiling`.
pub async fn wait_compiled(sup: &Supervisor) -> RuntimeStatus {
    for _ in 0..400 {
        let status = sup.status().await;
        if status != RuntimeStatus::Compiling {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("compilation never finished");
}

/// Polls `poll_log_text()` until it contains `needle`.
pub async fn wait_log(sup: &Supervisor, needle: &str) -> String {
    for _ in 0..400 {
        let text = sup.poll_log_text();
        if text.contains(needle) {
            return text;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("log never contained {needle:?}: {:?}", sup.poll_log_text());
}

/// Events of `kind` currently buffered in `rx`.
pub fn drain_kind(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> usize {
    let mut n = 0;
    while let Ok(ev) = rx.try_recv() {
        if ev.kind == kind {
            n += 1;
        }
    }
    n
}
