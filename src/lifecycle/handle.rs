//! Channel endpoints for reaching a worker context

use crate::cache::BucketName;
use crate::error::{SwgateError, SwgateResult};
use crate::fetch::{FetchOutcome, Request};
use crate::lifecycle::message::{ClientId, ClientMessage};
use crate::lifecycle::state::{WorkerId, WorkerState};
use tokio::sync::{mpsc, oneshot, watch};

/// Events delivered to a worker context
pub(crate) enum WorkerEvent {
    /// A message posted by a client
    Message {
        from: ClientId,
        message: ClientMessage,
    },
    /// A request from a controlled client
    Fetch {
        request: Request,
        reply: oneshot::Sender<SwgateResult<FetchOutcome>>,
    },
    /// A newer worker replaced this one
    Superseded,
}

/// Reference to a worker instance held by clients and the origin
///
/// Carries no worker state besides a read-only view of its lifecycle; all
/// interaction goes through the worker's event channel.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    id: WorkerId,
    bucket: BucketName,
    pub(crate) state: watch::Receiver<WorkerState>,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerHandle {
    pub(crate) fn new(
        id: WorkerId,
        bucket: BucketName,
        state: watch::Receiver<WorkerState>,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            id,
            bucket,
            state,
            events,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Bucket this worker installs into and serves from
    pub fn bucket(&self) -> &BucketName {
        &self.bucket
    }

    /// Latest lifecycle state
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Fresh subscription to lifecycle changes
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.clone()
    }

    /// Wait until the worker reaches a state matching `pred`
    ///
    /// Returns the last known state if the worker exits first.
    pub async fn wait_for(&self, pred: impl Fn(WorkerState) -> bool) -> WorkerState {
        let mut rx = self.state.clone();
        if let Ok(state) = rx.wait_for(|s| pred(*s)).await {
            return *state;
        }
        let last = *rx.borrow();
        last
    }

    /// Post a message to the worker
    pub fn post_message(&self, from: ClientId, message: ClientMessage) -> SwgateResult<()> {
        self.send(WorkerEvent::Message { from, message })
    }

    /// Route a request through the worker's fetch handler
    pub async fn fetch(&self, request: Request) -> SwgateResult<FetchOutcome> {
        let (reply, response) = oneshot::channel();
        self.send(WorkerEvent::Fetch { request, reply })?;
        response
            .await
            .map_err(|_| SwgateError::WorkerUnreachable(self.id.to_string()))?
    }

    pub(crate) fn send(&self, event: WorkerEvent) -> SwgateResult<()> {
        self.events
            .send(event)
            .map_err(|_| SwgateError::WorkerUnreachable(self.id.to_string()))
    }
}
