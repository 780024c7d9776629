//! Endpoint registry: endpoint name to running poller.
//!
//! Reads go through a `DashMap` of shared states and never wait on a mutation
//! in progress. Mutations are serialized by an async mutex over the running
//! tasks, so replacing an endpoint always stops the old poller before the new
//! one starts.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap as HashMap;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::poller::{Poller, PollerSettings};
use super::state::{EndpointState, EndpointView};

struct PollerTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct EndpointRegistry {
    endpoints: DashMap<String, Arc<EndpointState>>,
    tasks: Mutex<HashMap<String, PollerTask>>,
    settings: PollerSettings,
    shutdown: CancellationToken,
    drain_timeout: Duration,
}

impl EndpointRegistry {
    pub fn new(settings: PollerSettings, drain_timeout: Duration) -> Self {
        Self::with_shutdown(settings, drain_timeout, CancellationToken::new())
    }

    /// Pollers get child tokens of `shutdown`, so cancelling it stops them all.
    pub fn with_shutdown(
        settings: PollerSettings,
        drain_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            endpoints: DashMap::new(),
            tasks: Mutex::new(HashMap::new()),
            settings,
            shutdown,
            drain_timeout,
        }
    }

    pub fn settings(&self) -> &PollerSettings {
        &self.settings
    }

    /// Starts polling `path` under `name`, replacing any poller registered
    /// under the same name.
    pub async fn add_endpoint(&self, name: &str, path: impl Into<PathBuf>) -> Arc<EndpointState> {
        let path = path.into();
        let mut tasks = self.tasks.lock().await;

        if let Some(previous) = tasks.remove(name) {
            info!(endpoint = %name, "Replacing endpoint poller");
            self.stop_task(name, previous, Instant::now() + self.drain_timeout)
                .await;
        }

        let state = Arc::new(EndpointState::new(name, &path));
        let cancel = self.shutdown.child_token();
        let poller = Poller::new(state.clone(), self.settings.clone());
        let handle = tokio::spawn(poller.run(cancel.clone()));

        tasks.insert(name.to_string(), PollerTask { cancel, handle });
        self.endpoints.insert(name.to_string(), state.clone());

        info!(endpoint = %name, path = %path.display(), "Endpoint added");
        state
    }

    /// Stops and forgets the named poller. Returns false if it was unknown.
    pub async fn remove_endpoint(&self, name: &str) -> bool {
        let mut tasks = self.tasks.lock().await;

        let Some(task) = tasks.remove(name) else {
            debug!(endpoint = %name, "Remove of unknown endpoint ignored");
            return false;
        };
        // Readers stop seeing the endpoint before the poller winds down.
        self.endpoints.remove(name);
        self.stop_task(name, task, Instant::now() + self.drain_timeout)
            .await;

        info!(endpoint = %name, "Endpoint removed");
        true
    }

    /// Latest published data and status for `name`.
    pub fn get_snapshot(&self, name: &str) -> Option<EndpointView> {
        self.endpoints.get(name).map(|state| state.view())
    }

    /// Registered endpoint names, sorted.
    pub fn list_endpoints(&self) -> Vec<String> {
        let mut names: Vec<String> = self.endpoints.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Views of every registered endpoint, sorted by name.
    pub fn views(&self) -> Vec<EndpointView> {
        let states: Vec<Arc<EndpointState>> =
            self.endpoints.iter().map(|e| e.value().clone()).collect();
        let mut views: Vec<EndpointView> = states.iter().map(|s| s.view()).collect();
        views.sort_by(|a, b| a.name.cmp(&b.name));
        views
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Cancels every poller and waits for them, all sharing one deadline.
    /// Pollers still running at the deadline are aborted.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        self.shutdown.cancel();

        let deadline = Instant::now() + self.drain_timeout;
        let count = tasks.len();
        for (name, task) in tasks.drain() {
            self.stop_task(&name, task, deadline).await;
        }
        self.endpoints.clear();

        info!("Registry shut down, {} poller(s) stopped", count);
    }

    async fn stop_task(&self, name: &str, task: PollerTask, deadline: Instant) {
        let PollerTask { cancel, mut handle } = task;
        cancel.cancel();

        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(())) => debug!(endpoint = %name, "Poller exited"),
            Ok(Err(e)) => warn!(endpoint = %name, "Poller task failed: {}", e),
            Err(_) => {
                warn!(endpoint = %name, "Poller did not stop in time, aborting");
                handle.abort();
                // Abort drops the poller future, which closes its socket.
                let _ = handle.await;
            }
        }
    }
}
