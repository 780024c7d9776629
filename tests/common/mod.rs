//! In-process stand-in for a DPDK application's telemetry socket.
//!
//! Serves the v2 telemetry protocol on a `SOCK_SEQPACKET` socket inside a
//! temporary directory: handshake on accept, then one JSON answer per request
//! for `/ethdev/list`, `/ethdev/stats,<id>` and `/ethdev/info,<id>`.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::socket::{self, AddressFamily, Backlog, MsgFlags, SockFlag, SockType, UnixAddr};
use serde_json::{json, Value};
use tempfile::TempDir;

const POLL_SLEEP: Duration = Duration::from_millis(2);

/// Counters reported for one port.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortCounters {
    pub ipackets: u64,
    pub imissed: u64,
    pub opackets: u64,
    pub ibytes: u64,
    pub obytes: u64,
}

impl PortCounters {
    pub fn packets(ipackets: u64, imissed: u64, opackets: u64) -> Self {
        Self {
            ipackets,
            imissed,
            opackets,
            ibytes: ipackets * 64,
            obytes: opackets * 64,
        }
    }

    fn advance(&mut self, step: &PortCounters) {
        self.ipackets += step.ipackets;
        self.imissed += step.imissed;
        self.opackets += step.opackets;
        self.ibytes += step.ibytes;
        self.obytes += step.obytes;
    }
}

/// Behaviour of the mock, editable while it runs.
#[derive(Debug, Clone)]
pub struct Script {
    pub ports: BTreeMap<u16, PortCounters>,
    /// Added to a port's counters after each stats read of that port.
    pub step: PortCounters,
    /// Answer `null` for stats and info of this port.
    pub failing_port: Option<u16>,
    /// Close each connection after serving this many commands.
    pub drop_after: Option<usize>,
    pub max_output_len: usize,
    /// Raw handshake message replacing the default one.
    pub handshake: Option<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            ports: BTreeMap::new(),
            step: PortCounters::default(),
            failing_port: None,
            drop_after: None,
            max_output_len: 16384,
            handshake: None,
        }
    }
}

struct Shared {
    script: Mutex<Script>,
    stop: AtomicBool,
    generation: AtomicU64,
    accepted: AtomicUsize,
    active: AtomicUsize,
    commands: Mutex<Vec<String>>,
}

/// A running mock endpoint.
pub struct MockEndpoint {
    _dir: Option<TempDir>,
    path: PathBuf,
    shared: Arc<Shared>,
    listener: Option<JoinHandle<()>>,
}

impl MockEndpoint {
    /// Starts a mock with ports `0..port_count` and zeroed counters.
    pub fn start(port_count: u16) -> Self {
        let mut script = Script::default();
        for port in 0..port_count {
            script.ports.insert(port, PortCounters::default());
        }
        Self::with_script(script)
    }

    pub fn with_script(script: Script) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dpdk_telemetry.v2");
        Self::serve_at(Some(dir), path, script)
    }

    /// Starts a mock whose socket lives at `<root>/<app>/dpdk_telemetry.v2`.
    pub fn in_root(root: &Path, app: &str, port_count: u16) -> (PathBuf, Self) {
        let app_dir = root.join(app);
        std::fs::create_dir_all(&app_dir).expect("create app dir");
        let mut script = Script::default();
        for port in 0..port_count {
            script.ports.insert(port, PortCounters::default());
        }
        let path = app_dir.join("dpdk_telemetry.v2");
        (app_dir, Self::serve_at(None, path, script))
    }

    fn serve_at(dir: Option<TempDir>, path: PathBuf, script: Script) -> Self {
        let listener = socket::socket(
            AddressFamily::Unix,
            SockType::SeqPacket,
            SockFlag::SOCK_NONBLOCK | SockFlag::SOCK_CLOEXEC,
            None,
        )
        .expect("socket");
        let addr = UnixAddr::new(path.as_path()).expect("unix addr");
        socket::bind(listener.as_raw_fd(), &addr).expect("bind");
        socket::listen(&listener, Backlog::new(16).expect("backlog")).expect("listen");

        let shared = Arc::new(Shared {
            script: Mutex::new(script),
            stop: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            accepted: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
        });

        let thread_shared = shared.clone();
        let handle = std::thread::spawn(move || accept_loop(listener, thread_shared));

        Self {
            _dir: dir,
            path,
            shared,
            listener: Some(handle),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Application directory holding the socket.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }

    /// Edits the script of the running mock.
    pub fn script(&self, edit: impl FnOnce(&mut Script)) {
        edit(&mut self.shared.script.lock().unwrap());
    }

    pub fn set_counters(&self, port: u16, counters: PortCounters) {
        self.script(|s| {
            s.ports.insert(port, counters);
        });
    }

    pub fn counters(&self, port: u16) -> Option<PortCounters> {
        self.shared.script.lock().unwrap().ports.get(&port).copied()
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    /// Connections currently open.
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn commands(&self) -> Vec<String> {
        self.shared.commands.lock().unwrap().clone()
    }

    /// Closes every open connection; new connections are still accepted.
    pub fn kill_connections(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Stops serving and removes the socket file.
    pub fn shutdown(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.listener.take() {
            let _ = handle.join();
        }
        let _ = std::fs::remove_file(&self.path);
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(listener: OwnedFd, shared: Arc<Shared>) {
    let mut workers = Vec::new();
    while !shared.stop.load(Ordering::SeqCst) {
        match socket::accept4(
            listener.as_raw_fd(),
            SockFlag::SOCK_NONBLOCK | SockFlag::SOCK_CLOEXEC,
        ) {
            Ok(raw) => {
                // SAFETY: accept4 returned a fresh descriptor we now own.
                let conn = unsafe { OwnedFd::from_raw_fd(raw) };
                shared.accepted.fetch_add(1, Ordering::SeqCst);
                shared.active.fetch_add(1, Ordering::SeqCst);
                let worker_shared = shared.clone();
                workers.push(std::thread::spawn(move || {
                    serve_connection(&conn, &worker_shared);
                    drop(conn);
                    worker_shared.active.fetch_sub(1, Ordering::SeqCst);
                }));
            }
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => std::thread::sleep(POLL_SLEEP),
            Err(_) => break,
        }
    }
    for worker in workers {
        let _ = worker.join();
    }
}

fn serve_connection(conn: &OwnedFd, shared: &Shared) {
    let generation = shared.generation.load(Ordering::SeqCst);
    let handshake = {
        let script = shared.script.lock().unwrap();
        script.handshake.clone().unwrap_or_else(|| {
            json!({
                "version": "DPDK 23.11.0",
                "pid": std::process::id(),
                "max_output_len": script.max_output_len,
            })
            .to_string()
        })
    };
    if send_all(conn, handshake.as_bytes(), shared).is_err() {
        return;
    }

    let mut served = 0usize;
    let mut buf = vec![0u8; 4096];
    loop {
        if shared.stop.load(Ordering::SeqCst)
            || shared.generation.load(Ordering::SeqCst) != generation
        {
            return;
        }
        match socket::recv(conn.as_raw_fd(), &mut buf, MsgFlags::empty()) {
            Ok(0) => return,
            Ok(len) => {
                let request = String::from_utf8_lossy(&buf[..len]).to_string();
                shared.commands.lock().unwrap().push(request.clone());

                let drop_after = shared.script.lock().unwrap().drop_after;
                if drop_after.is_some_and(|limit| served >= limit) {
                    return;
                }
                served += 1;

                let answer = respond(&request, shared);
                if send_all(conn, answer.as_bytes(), shared).is_err() {
                    return;
                }
            }
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => std::thread::sleep(POLL_SLEEP),
            Err(_) => return,
        }
    }
}

fn send_all(conn: &OwnedFd, data: &[u8], shared: &Shared) -> Result<(), Errno> {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match socket::send(conn.as_raw_fd(), data, MsgFlags::MSG_NOSIGNAL) {
            Ok(_) => return Ok(()),
            Err(Errno::EAGAIN) if Instant::now() < deadline && !shared.stop.load(Ordering::SeqCst) => {
                std::thread::sleep(POLL_SLEEP)
            }
            Err(e) => return Err(e),
        }
    }
}

fn respond(request: &str, shared: &Shared) -> String {
    let (command, param) = match request.split_once(',') {
        Some((command, param)) => (command, Some(param)),
        None => (request, None),
    };
    let port = param.and_then(|p| p.parse::<u16>().ok());
    let mut script = shared.script.lock().unwrap();

    let value = match (command, port) {
        ("/ethdev/list", _) => json!(script.ports.keys().collect::<Vec<_>>()),
        ("/ethdev/stats", Some(port)) if script.failing_port != Some(port) => {
            let step = script.step;
            match script.ports.get_mut(&port) {
                Some(counters) => {
                    let value = stats_value(counters);
                    counters.advance(&step);
                    value
                }
                None => Value::Null,
            }
        }
        ("/ethdev/info", Some(port))
            if script.failing_port != Some(port) && script.ports.contains_key(&port) =>
        {
            json!({
                "name": format!("net_mock_{port}"),
                "port_id": port,
                "mtu": 1500,
                "nb_rx_queues": 1,
                "nb_tx_queues": 1,
            })
        }
        _ => Value::Null,
    };

    let mut answer = serde_json::Map::new();
    answer.insert(command.to_string(), value);
    Value::Object(answer).to_string()
}

fn stats_value(c: &PortCounters) -> Value {
    json!({
        "ipackets": c.ipackets,
        "opackets": c.opackets,
        "ibytes": c.ibytes,
        "obytes": c.obytes,
        "imissed": c.imissed,
        "ierrors": 0,
        "oerrors": 0,
        "rx_nombuf": 0,
        "q_ipackets": [c.ipackets],
    })
}

/// Polls `check` every 10ms until it holds or `timeout` passes.
pub async fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
