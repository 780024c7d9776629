//! Socket directory scan and live watch.
//!
//! Every DPDK application creates `<root>/<app-name>/` and its telemetry socket
//! inside it. Application directories map one-to-one to registry endpoints,
//! named after the directory.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::registry::EndpointRegistry;

/// Socket path of the application living in `dir`.
pub fn endpoint_socket_path(dir: &Path, socket_name: &str) -> PathBuf {
    dir.join(socket_name)
}

/// Endpoint name of an application directory.
pub fn endpoint_name(dir: &Path) -> Option<String> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

/// Registers every application directory already present under `root`.
pub async fn scan_existing(
    registry: &EndpointRegistry,
    root: &Path,
    socket_name: &str,
) -> io::Result<usize> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();

    let mut added = 0;
    for dir in dirs {
        let Some(name) = endpoint_name(&dir) else {
            warn!("Skipping directory with non UTF-8 name: {}", dir.display());
            continue;
        };
        registry
            .add_endpoint(&name, endpoint_socket_path(&dir, socket_name))
            .await;
        added += 1;
    }

    info!("Initial scan of {} found {} endpoint(s)", root.display(), added);
    Ok(added)
}

/// Directory change relevant to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEvent {
    Created(PathBuf),
    Removed(PathBuf),
}

/// Maps a raw filesystem event to registry actions. Renames count as a
/// removal of the old name and a creation of the new one.
pub fn classify_event(event: &Event) -> Vec<DirectoryEvent> {
    match &event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .cloned()
            .map(DirectoryEvent::Created)
            .collect(),
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .cloned()
            .map(DirectoryEvent::Removed)
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![
                DirectoryEvent::Removed(from.clone()),
                DirectoryEvent::Created(to.clone()),
            ],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Live watch of the socket root feeding an [`EndpointRegistry`].
pub struct DirectoryWatcher {
    // Dropping the watcher ends the notify thread and closes the channel.
    _watcher: RecommendedWatcher,
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl DirectoryWatcher {
    /// Starts watching `root` (non-recursively). Failing here is fatal to the
    /// caller: without the watch, endpoints would never be discovered.
    pub fn start(
        registry: Arc<EndpointRegistry>,
        root: impl Into<PathBuf>,
        socket_name: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Result<Self, notify::Error> {
        let root = root.into();
        let socket_name = socket_name.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver is gone only during shutdown.
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(&root, RecursiveMode::NonRecursive)?;
        info!("Watching {} for telemetry endpoints", root.display());

        let cancel = shutdown.child_token();
        let handle = tokio::spawn(apply_events(registry, rx, socket_name, cancel.clone()));

        Ok(Self {
            _watcher: watcher,
            handle,
            cancel,
        })
    }

    /// Stops applying events and waits for the event loop to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!("Directory watch task failed: {}", e);
        }
    }
}

async fn apply_events(
    registry: Arc<EndpointRegistry>,
    mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    socket_name: String,
    cancel: CancellationToken,
) {
    loop {
        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            res = rx.recv() => match res {
                Some(res) => res,
                None => break,
            },
        };

        let event = match res {
            Ok(event) => event,
            Err(e) => {
                error!("Directory watch error: {}", e);
                continue;
            }
        };

        for change in classify_event(&event) {
            apply_event(&registry, &socket_name, change).await;
        }
    }
    debug!("Directory watch loop finished");
}

async fn apply_event(registry: &EndpointRegistry, socket_name: &str, change: DirectoryEvent) {
    match change {
        DirectoryEvent::Created(path) => {
            // Plain files in the root are not applications.
            if !path.is_dir() {
                return;
            }
            if let Some(name) = endpoint_name(&path) {
                registry
                    .add_endpoint(&name, endpoint_socket_path(&path, socket_name))
                    .await;
            }
        }
        DirectoryEvent::Removed(path) => {
            if let Some(name) = endpoint_name(&path) {
                registry.remove_endpoint(&name).await;
            }
        }
    }
}
