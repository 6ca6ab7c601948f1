//! Foreground context update listener
//!
//! Each open tab owns one listener. It registers the worker, follows any
//! worker it sees entering `installing`, surfaces an update once that worker
//! is waiting behind an active one, and reloads the tab a short while after
//! the active worker announces the update.

use crate::cache::BucketName;
use crate::config::{schema::UpdateConfig, UpdatePolicy};
use crate::error::{SwgateError, SwgateResult};
use crate::fetch::{FetchOutcome, Request};
use crate::lifecycle::coordinator::WorkerScript;
use crate::lifecycle::handle::WorkerHandle;
use crate::lifecycle::message::{ClientId, ClientMessage, WorkerMessage};
use crate::lifecycle::origin::Origin;
use crate::lifecycle::state::WorkerState;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Whether this tab has an update waiting, and which worker it is
#[derive(Debug, Clone, Default)]
pub struct UpdateAvailability {
    pub pending: bool,
    pub worker: Option<WorkerHandle>,
}

/// Something the tab should react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A newer version is installed and waiting
    UpdateAvailable { bucket: BucketName },
    /// The active worker announced an update; a reload is scheduled
    AppUpdated { message: String },
    /// The scheduled reload is due
    Reload,
}

/// Update handshake state of one foreground context
pub struct ClientUpdateListener {
    id: ClientId,
    origin: Origin,
    inbox: mpsc::UnboundedReceiver<WorkerMessage>,
    update_found: broadcast::Receiver<WorkerHandle>,
    tracked: Option<WorkerHandle>,
    availability: UpdateAvailability,
    policy: UpdatePolicy,
    reload_delay: Duration,
    reload_at: Option<Instant>,
    reloaded: bool,
    notices: usize,
}

impl ClientUpdateListener {
    /// Connect a new foreground context to the origin
    pub async fn connect(origin: Origin, update: &UpdateConfig) -> Self {
        let connection = origin.connect().await;
        Self {
            id: connection.id,
            origin,
            inbox: connection.inbox,
            update_found: connection.update_found,
            tracked: None,
            availability: UpdateAvailability::default(),
            policy: update.policy,
            reload_delay: update.reload_delay(),
            reload_at: None,
            reloaded: false,
            notices: 0,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn availability(&self) -> &UpdateAvailability {
        &self.availability
    }

    /// Whether a reload has been scheduled and not yet happened
    pub fn reload_scheduled(&self) -> bool {
        self.reload_at.is_some()
    }

    pub fn has_reloaded(&self) -> bool {
        self.reloaded
    }

    /// Update notices received, duplicates included
    pub fn notices_received(&self) -> usize {
        self.notices
    }

    /// Register a worker script and follow it through installation
    ///
    /// Registering again while an update is waiting offers it again.
    pub async fn register(&mut self, script: WorkerScript) -> SwgateResult<WorkerHandle> {
        let handle = self.origin.register(script).await?;
        if self.availability.worker.as_ref().map(WorkerHandle::id) == Some(handle.id()) {
            self.availability = UpdateAvailability::default();
        }
        self.track(handle.clone());
        Ok(handle)
    }

    /// Send the skip-waiting signal to the waiting worker
    ///
    /// If the worker cannot be reached the update stays pending.
    pub fn apply_update(&self) -> SwgateResult<()> {
        let worker = self
            .availability
            .worker
            .as_ref()
            .ok_or(SwgateError::NoPendingUpdate)?;
        info!("Client {} applying update {}", self.id, worker.bucket());
        worker.post_message(self.id, ClientMessage::SkipWaiting)
    }

    /// Leave the update waiting; returns whether one is pending
    pub fn defer_update(&self) -> bool {
        if let Some(worker) = &self.availability.worker {
            debug!("Client {} deferring update {}", self.id, worker.bucket());
        }
        self.availability.pending
    }

    /// Fetch through the controlling worker, or the network when uncontrolled
    pub async fn fetch(&self, request: &Request) -> SwgateResult<FetchOutcome> {
        self.origin.fetch(request).await
    }

    /// Wait for the next event the tab has to react to
    ///
    /// Returns `None` once the tab can no longer receive messages.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        loop {
            if let Some(event) = self.observe_tracked() {
                return Some(event);
            }

            tokio::select! {
                _ = reload_timer(self.reload_at) => {
                    self.reload_at = None;
                    self.reloaded = true;
                    info!("Client {} reloading", self.id);
                    return Some(ClientEvent::Reload);
                }
                message = self.inbox.recv() => match message {
                    Some(WorkerMessage::AppUpdated { message }) => {
                        self.notices += 1;
                        if self.reload_at.is_some() || self.reloaded {
                            debug!("Client {} ignoring repeated update notice", self.id);
                            continue;
                        }
                        self.availability = UpdateAvailability::default();
                        self.reload_at = Some(Instant::now() + self.reload_delay);
                        debug!("Client {} reload in {:?}", self.id, self.reload_delay);
                        return Some(ClientEvent::AppUpdated { message });
                    }
                    None => return None,
                },
                found = self.update_found.recv() => match found {
                    Ok(handle) => self.track(handle),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Client {} missed {} update notifications", self.id, skipped);
                        if let Some(handle) = self.origin.installing().await {
                            self.track(handle);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                alive = tracked_state_changed(&mut self.tracked) => {
                    if !alive {
                        self.tracked = None;
                    }
                }
            }
        }
    }

    /// Drive events until the reload happens, collecting them
    pub async fn run_until_reload(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            let done = event == ClientEvent::Reload;
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    fn track(&mut self, handle: WorkerHandle) {
        if self.tracked.as_ref().map(WorkerHandle::id) == Some(handle.id()) {
            return;
        }
        if self.availability.worker.as_ref().map(WorkerHandle::id) == Some(handle.id()) {
            return;
        }
        debug!("Client {} tracking {} ({})", self.id, handle.bucket(), handle.state());
        self.tracked = Some(handle);
    }

    /// React to the latest state of the tracked worker
    fn observe_tracked(&mut self) -> Option<ClientEvent> {
        let (state, id) = {
            let handle = self.tracked.as_mut()?;
            let state = *handle.state.borrow_and_update();
            (state, handle.id())
        };

        match state {
            WorkerState::Installing | WorkerState::Activating => None,
            WorkerState::Installed => {
                let controller = self.origin.controller_id();
                if controller.is_none() || controller == Some(id) {
                    // First install; it activates on its own
                    return None;
                }

                let handle = self.tracked.take()?;
                let bucket = handle.bucket().clone();
                info!("Client {}: update {} available", self.id, bucket);
                self.availability = UpdateAvailability {
                    pending: true,
                    worker: Some(handle),
                };

                if self.policy == UpdatePolicy::Immediate {
                    if let Err(e) = self.apply_update() {
                        warn!("Client {} could not apply update: {}", self.id, e);
                    }
                }
                Some(ClientEvent::UpdateAvailable { bucket })
            }
            WorkerState::Activated | WorkerState::Redundant => {
                self.tracked = None;
                None
            }
        }
    }
}

async fn reload_timer(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Resolves when the tracked worker's state changes; false once it has exited
async fn tracked_state_changed(tracked: &mut Option<WorkerHandle>) -> bool {
    match tracked {
        Some(handle) => handle.state.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}
