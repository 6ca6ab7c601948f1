//! Background worker context
//!
//! One coordinator runs per worker version. It installs the precache, waits
//! for the skip-waiting signal when another version is in control, then
//! takes control of every client, garbage-collects stale buckets and tells
//! the clients the app was updated.

use crate::cache::{BucketName, PrecacheManifest};
use crate::error::{SwgateError, SwgateResult};
use crate::fetch::{FetchInterceptor, FetchOutcome, Request};
use crate::lifecycle::handle::{WorkerEvent, WorkerHandle};
use crate::lifecycle::message::{ClientId, ClientMessage, WorkerMessage};
use crate::lifecycle::origin::{Origin, Placement};
use crate::lifecycle::state::{WorkerId, WorkerState};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// What a registration installs: a bucket version and its manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerScript {
    pub bucket: BucketName,
    pub manifest: PrecacheManifest,
}

impl WorkerScript {
    pub fn new(bucket: BucketName, manifest: PrecacheManifest) -> Self {
        Self { bucket, manifest }
    }
}

/// State machine of one worker instance
pub struct UpdateCoordinator {
    id: WorkerId,
    script: WorkerScript,
    origin: Origin,
    interceptor: FetchInterceptor,
    state: watch::Sender<WorkerState>,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl UpdateCoordinator {
    /// Start a worker context for `script` and return its handle
    pub(crate) fn spawn(origin: Origin, script: WorkerScript) -> WorkerHandle {
        let id = WorkerId::new();
        let (state, state_rx) = watch::channel(WorkerState::Installing);
        let (events_tx, events) = mpsc::unbounded_channel();
        let handle = WorkerHandle::new(id, script.bucket.clone(), state_rx, events_tx);

        let coordinator = Self {
            id,
            interceptor: origin.interceptor_for(&script.bucket),
            script,
            origin,
            state,
            events,
        };
        tokio::spawn(coordinator.run(handle.clone()));

        handle
    }

    fn current(&self) -> WorkerState {
        *self.state.borrow()
    }

    fn set_state(&self, next: WorkerState) -> SwgateResult<()> {
        let current = self.current();
        let next = current.transition(next)?;
        self.state.send_replace(next);
        debug!("Worker {} ({}): {} -> {}", self.id, self.script.bucket, current, next);
        Ok(())
    }

    async fn run(mut self, handle: WorkerHandle) {
        if let Err(e) = self.install().await {
            warn!("Install of {} failed, keeping current version: {}", self.script.bucket, e);
            self.origin
                .audit()
                .log(
                    "worker.install_failed",
                    &serde_json::json!({
                        "bucket": self.script.bucket.to_string(),
                        "reason": e.to_string(),
                    }),
                )
                .await;
            self.retire().await;
            return;
        }

        match self.origin.installed(&handle).await {
            Placement::Activate => {
                if let Err(e) = self.activate().await {
                    warn!("Activation of {} failed: {}", self.script.bucket, e);
                    self.retire().await;
                    return;
                }
            }
            Placement::Wait => {
                info!("{} installed and waiting", self.script.bucket);
            }
            Placement::Discarded => {
                debug!("{} was replaced while installing", self.script.bucket);
                self.retire().await;
                return;
            }
        }

        while let Some(event) = self.events.recv().await {
            match event {
                WorkerEvent::Message { from, message } => {
                    if let Err(e) = self.on_message(from, message).await {
                        warn!("Activation of {} failed: {}", self.script.bucket, e);
                        self.retire().await;
                        return;
                    }
                }
                WorkerEvent::Fetch { request, reply } => self.on_fetch(request, reply).await,
                WorkerEvent::Superseded => {
                    info!("{} superseded", self.script.bucket);
                    self.retire().await;
                    return;
                }
            }
        }
    }

    /// Precache the manifest; the worker reaches `installed` only if every entry succeeded
    async fn install(&self) -> SwgateResult<()> {
        let network = self.origin.network();
        let count = self
            .origin
            .store()
            .install(
                &self.script.bucket,
                &self.script.manifest,
                self.origin.url(),
                network.as_ref(),
            )
            .await?;
        self.set_state(WorkerState::Installed)?;

        self.origin
            .audit()
            .log(
                "worker.installed",
                &serde_json::json!({
                    "bucket": self.script.bucket.to_string(),
                    "resources": count,
                    "manifest_digest": self.script.manifest.digest(),
                }),
            )
            .await;
        Ok(())
    }

    async fn on_message(&mut self, from: ClientId, message: ClientMessage) -> SwgateResult<()> {
        match message {
            ClientMessage::SkipWaiting => {
                if !self.current().is_waiting() {
                    // Several tabs may ask; only the first request while waiting counts
                    debug!(
                        "Ignoring SKIP_WAITING from {} in state {}",
                        from,
                        self.current()
                    );
                    return Ok(());
                }
                info!("SKIP_WAITING from {}, activating {}", from, self.script.bucket);
                self.activate().await
            }
        }
    }

    /// `installed -> activating -> activated`, claiming clients before GC and notifying them
    async fn activate(&mut self) -> SwgateResult<()> {
        self.set_state(WorkerState::Activating)?;

        // Stale buckets go only once this worker is the controller
        let previous = self.origin.promote(self.id).await?;
        let clients = self.origin.claim(self.id).await;

        let deleted = self.origin.store().activate(&self.script.bucket).await?;
        if !deleted.is_empty() {
            self.origin
                .audit()
                .log(
                    "cache.gc",
                    &serde_json::json!({
                        "current": self.script.bucket.to_string(),
                        "deleted": deleted,
                    }),
                )
                .await;
        }

        self.set_state(WorkerState::Activated)?;
        info!("{} activated (worker {})", self.script.bucket, self.id);

        self.origin
            .audit()
            .log(
                "worker.activated",
                &serde_json::json!({
                    "bucket": self.script.bucket.to_string(),
                    "replaced": previous.as_ref().map(|p| p.bucket().to_string()),
                }),
            )
            .await;

        if previous.is_none() {
            // First install: the clients had no controller to be out of sync with
            debug!("Claimed {} clients on first activation", clients.len());
            return Ok(());
        }

        let notice = WorkerMessage::AppUpdated {
            message: self.origin.notice().to_string(),
        };
        let mut delivered = 0;
        for (client, inbox) in &clients {
            if inbox.send(notice.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!("Client {} went away before the update notice", client);
            }
        }
        info!("Update notice sent to {} of {} clients", delivered, clients.len());

        self.origin
            .audit()
            .log(
                "update.broadcast",
                &serde_json::json!({
                    "bucket": self.script.bucket.to_string(),
                    "clients": delivered,
                }),
            )
            .await;
        Ok(())
    }

    async fn on_fetch(
        &self,
        request: Request,
        reply: oneshot::Sender<SwgateResult<FetchOutcome>>,
    ) {
        if self.current() != WorkerState::Activated {
            let _ = reply.send(Err(SwgateError::WorkerUnreachable(format!(
                "worker {} is {}",
                self.id,
                self.current()
            ))));
            return;
        }

        match self.interceptor.intercept(&request).await {
            Ok((outcome, write)) => {
                // Respond first, then write the clone into the bucket
                let _ = reply.send(Ok(outcome));
                if let Some(write) = write {
                    write.commit().await;
                }
            }
            Err(e) => {
                let _ = reply.send(Err(e));
            }
        }
    }

    async fn retire(&self) {
        if let Err(e) = self.set_state(WorkerState::Redundant) {
            debug!("Worker {} already terminal: {}", self.id, e);
        }
        self.origin.retire(self.id).await;
    }
}
