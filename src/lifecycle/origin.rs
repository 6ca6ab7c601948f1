//! Per-origin worker registration
//!
//! The origin is the platform's record of which worker is installing, which
//! is waiting and which is active, plus the set of connected foreground
//! contexts. Contexts never touch each other's state; the origin only hands
//! out channel endpoints and relays lifecycle notifications.

use crate::audit::AuditLog;
use crate::cache::{BucketName, CacheStore};
use crate::config::Config;
use crate::error::{SwgateError, SwgateResult};
use crate::fetch::{FetchInterceptor, FetchOutcome, Network, Request, ResponseSource};
use crate::lifecycle::coordinator::{UpdateCoordinator, WorkerScript};
use crate::lifecycle::handle::{WorkerEvent, WorkerHandle};
use crate::lifecycle::message::{ClientId, WorkerMessage};
use crate::lifecycle::state::WorkerId;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tracing::{debug, info};
use url::Url;

/// Capacity of the "update found" notification channel
const UPDATE_FOUND_CAPACITY: usize = 16;

/// Settings shared by every worker registered on an origin
#[derive(Debug, Clone)]
pub struct OriginSettings {
    /// Text of the update notice broadcast after a controller change
    pub notice: String,
    /// Manifest entry served when a GET misses and the network is down
    pub offline_fallback: Option<String>,
    pub audit: AuditLog,
}

impl Default for OriginSettings {
    fn default() -> Self {
        Self {
            notice: crate::config::schema::UpdateConfig::default().notice,
            offline_fallback: None,
            audit: AuditLog::disabled(),
        }
    }
}

/// Endpoints handed to a newly connected foreground context
pub struct ClientConnection {
    pub id: ClientId,
    pub inbox: mpsc::UnboundedReceiver<WorkerMessage>,
    pub update_found: broadcast::Receiver<WorkerHandle>,
}

/// Where a freshly installed worker goes next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Nothing is active; activate right away
    Activate,
    /// Another worker is active; wait for skip-waiting
    Wait,
    /// A newer registration replaced this worker while it installed
    Discarded,
}

struct ClientEntry {
    sender: mpsc::UnboundedSender<WorkerMessage>,
    controller: Option<WorkerId>,
}

#[derive(Default)]
struct Registry {
    installing: Option<WorkerHandle>,
    waiting: Option<WorkerHandle>,
    active: Option<WorkerHandle>,
    clients: BTreeMap<ClientId, ClientEntry>,
}

impl Registry {
    fn find_version(&self, bucket: &BucketName) -> Option<&WorkerHandle> {
        [&self.active, &self.waiting, &self.installing]
            .into_iter()
            .flatten()
            .find(|h| h.bucket() == bucket)
    }

    fn prune_closed(&mut self) {
        self.clients.retain(|id, entry| {
            let open = !entry.sender.is_closed();
            if !open {
                debug!("Client {} disconnected", id);
            }
            open
        });
    }
}

struct OriginInner {
    url: Url,
    store: CacheStore,
    network: Arc<dyn Network>,
    settings: OriginSettings,
    registry: Mutex<Registry>,
    update_found: broadcast::Sender<WorkerHandle>,
    controller: watch::Sender<Option<WorkerId>>,
}

/// Shared handle to one origin's registration
#[derive(Clone)]
pub struct Origin {
    inner: Arc<OriginInner>,
}

impl Origin {
    /// Create an origin with default settings
    pub fn new(url: Url, store: CacheStore, network: Arc<dyn Network>) -> Self {
        Self::with_settings(url, store, network, OriginSettings::default())
    }

    pub fn with_settings(
        url: Url,
        store: CacheStore,
        network: Arc<dyn Network>,
        settings: OriginSettings,
    ) -> Self {
        let (update_found, _) = broadcast::channel(UPDATE_FOUND_CAPACITY);
        let (controller, _) = watch::channel(None);
        Self {
            inner: Arc::new(OriginInner {
                url,
                store,
                network,
                settings,
                registry: Mutex::new(Registry::default()),
                update_found,
                controller,
            }),
        }
    }

    /// Create an origin from the `[app]`, `[cache]` and `[update]` config sections
    pub fn from_config(
        config: &Config,
        store: CacheStore,
        network: Arc<dyn Network>,
        audit: AuditLog,
    ) -> SwgateResult<Self> {
        let url = Url::parse(&config.app.origin).map_err(|e| SwgateError::InvalidUrl {
            url: config.app.origin.clone(),
            reason: e.to_string(),
        })?;
        let settings = OriginSettings {
            notice: config.update.notice.clone(),
            offline_fallback: config.cache.offline_fallback.clone(),
            audit,
        };
        Ok(Self::with_settings(url, store, network, settings))
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    pub(crate) fn network(&self) -> Arc<dyn Network> {
        Arc::clone(&self.inner.network)
    }

    pub(crate) fn audit(&self) -> &AuditLog {
        &self.inner.settings.audit
    }

    pub(crate) fn notice(&self) -> &str {
        &self.inner.settings.notice
    }

    /// Fetch policy for a worker serving from `bucket`
    pub(crate) fn interceptor_for(&self, bucket: &BucketName) -> FetchInterceptor {
        FetchInterceptor::new(
            self.inner.store.clone(),
            bucket.clone(),
            &self.inner.url,
            self.network(),
        )
        .with_offline_fallback(self.inner.settings.offline_fallback.clone(), &self.inner.url)
    }

    /// Connect a foreground context
    ///
    /// A context connecting while a worker is active starts out controlled by it.
    pub async fn connect(&self) -> ClientConnection {
        let (sender, inbox) = mpsc::unbounded_channel();
        let id = ClientId::new();
        let update_found = self.inner.update_found.subscribe();

        let mut registry = self.inner.registry.lock().await;
        registry.prune_closed();
        let controller = registry.active.as_ref().map(WorkerHandle::id);
        registry
            .clients
            .insert(id, ClientEntry { sender, controller });
        debug!("Client {} connected (controller: {:?})", id, controller);

        ClientConnection {
            id,
            inbox,
            update_found,
        }
    }

    /// Register a worker script
    ///
    /// A version that is already installing, waiting or active is not
    /// reinstalled; its existing handle is returned instead.
    pub async fn register(&self, script: WorkerScript) -> SwgateResult<WorkerHandle> {
        let mut registry = self.inner.registry.lock().await;

        if let Some(existing) = registry.find_version(&script.bucket) {
            debug!(
                "{} already registered ({})",
                script.bucket,
                existing.state()
            );
            return Ok(existing.clone());
        }
        if let Some(active) = &registry.active {
            if !script.bucket.supersedes(active.bucket()) {
                return Err(SwgateError::StaleVersion {
                    requested: script.bucket.to_string(),
                    active: active.bucket().to_string(),
                });
            }
        }

        let handle = UpdateCoordinator::spawn(self.clone(), script);
        if let Some(previous) = registry.installing.replace(handle.clone()) {
            debug!("Installing worker {} replaced by {}", previous.id(), handle.id());
            let _ = previous.send(WorkerEvent::Superseded);
        }
        drop(registry);

        info!("Update found: {} (worker {})", handle.bucket(), handle.id());
        // No subscribers is fine; nobody is listening for updates yet
        let _ = self.inner.update_found.send(handle.clone());
        Ok(handle)
    }

    /// Active worker, if any
    pub async fn controller(&self) -> Option<WorkerHandle> {
        self.inner.registry.lock().await.active.clone()
    }

    /// Id of the active worker, without waiting on the registry
    pub fn controller_id(&self) -> Option<WorkerId> {
        *self.inner.controller.borrow()
    }

    /// Subscribe to controller changes
    pub fn watch_controller(&self) -> watch::Receiver<Option<WorkerId>> {
        self.inner.controller.subscribe()
    }

    /// Installed worker waiting for skip-waiting, if any
    pub async fn waiting(&self) -> Option<WorkerHandle> {
        self.inner.registry.lock().await.waiting.clone()
    }

    pub async fn installing(&self) -> Option<WorkerHandle> {
        self.inner.registry.lock().await.installing.clone()
    }

    /// Worker controlling a given client
    pub async fn client_controller(&self, client: ClientId) -> Option<WorkerId> {
        let registry = self.inner.registry.lock().await;
        registry.clients.get(&client).and_then(|c| c.controller)
    }

    /// Number of connected clients
    pub async fn client_count(&self) -> usize {
        let mut registry = self.inner.registry.lock().await;
        registry.prune_closed();
        registry.clients.len()
    }

    /// Fetch on behalf of a foreground context
    ///
    /// Controlled contexts go through the active worker; otherwise the request
    /// goes straight to the network.
    pub async fn fetch(&self, request: &Request) -> SwgateResult<FetchOutcome> {
        match self.controller().await {
            Some(worker) => worker.fetch(request.clone()).await,
            None => {
                let response = self.inner.network.fetch(request).await?;
                Ok(FetchOutcome {
                    response,
                    source: ResponseSource::Network,
                })
            }
        }
    }

    /// Record a finished install and decide what the worker does next
    pub(crate) async fn installed(&self, handle: &WorkerHandle) -> Placement {
        let mut registry = self.inner.registry.lock().await;
        if registry.installing.as_ref().map(WorkerHandle::id) != Some(handle.id()) {
            return Placement::Discarded;
        }
        registry.installing = None;

        if let Some(previous) = registry.waiting.replace(handle.clone()) {
            debug!("Waiting worker {} replaced by {}", previous.id(), handle.id());
            let _ = previous.send(WorkerEvent::Superseded);
        }

        if registry.active.is_some() {
            Placement::Wait
        } else {
            Placement::Activate
        }
    }

    /// Make the waiting worker `id` the active one
    ///
    /// Returns the worker it replaced. The replaced worker is told it has been
    /// superseded and the controller reference changes.
    pub(crate) async fn promote(&self, id: WorkerId) -> SwgateResult<Option<WorkerHandle>> {
        let mut registry = self.inner.registry.lock().await;
        let handle = match registry.waiting.take() {
            Some(h) if h.id() == id => h,
            other => {
                registry.waiting = other;
                return Err(SwgateError::Internal(format!(
                    "worker {} is not the waiting worker",
                    id
                )));
            }
        };

        let previous = registry.active.replace(handle);
        if let Some(previous) = &previous {
            let _ = previous.send(WorkerEvent::Superseded);
        }
        self.inner.controller.send_replace(Some(id));
        Ok(previous)
    }

    /// Take control of every connected client
    ///
    /// Returns the clients' inboxes so the worker can message each one.
    pub(crate) async fn claim(
        &self,
        id: WorkerId,
    ) -> Vec<(ClientId, mpsc::UnboundedSender<WorkerMessage>)> {
        let mut registry = self.inner.registry.lock().await;
        if registry.active.as_ref().map(WorkerHandle::id) != Some(id) {
            return Vec::new();
        }
        registry.prune_closed();
        registry
            .clients
            .iter_mut()
            .map(|(client, entry)| {
                entry.controller = Some(id);
                (*client, entry.sender.clone())
            })
            .collect()
    }

    /// Forget a worker that became redundant
    pub(crate) async fn retire(&self, id: WorkerId) {
        let mut guard = self.inner.registry.lock().await;
        let registry = &mut *guard;
        for slot in [
            &mut registry.installing,
            &mut registry.waiting,
            &mut registry.active,
        ] {
            if slot.as_ref().map(WorkerHandle::id) == Some(id) {
                *slot = None;
            }
        }
        self.inner.controller.send_if_modified(|current| {
            if *current == Some(id) {
                *current = None;
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PrecacheManifest;
    use crate::fetch::MemoryNetwork;
    use crate::lifecycle::message::ClientMessage;
    use crate::lifecycle::state::WorkerState;

    fn base() -> Url {
        Url::parse("http://localhost:3000").unwrap()
    }

    fn serve_version(network: &MemoryNetwork, version: u32) {
        for entry in PrecacheManifest::default().entries() {
            let url = base().join(entry).unwrap();
            network.serve(url.as_str(), 200, format!("{} (v{})", entry, version));
        }
    }

    fn script(version: u32) -> WorkerScript {
        WorkerScript::new(
            BucketName::new("jobboard", version),
            PrecacheManifest::default(),
        )
    }

    #[tokio::test]
    async fn controller_bucket_survives_until_promotion() {
        let network = MemoryNetwork::new();
        serve_version(&network, 1);
        let origin = Origin::new(base(), CacheStore::new(), Arc::new(network.clone()));
        let v1 = origin.register(script(1)).await.unwrap();
        v1.wait_for(|s| s == WorkerState::Activated).await;

        serve_version(&network, 2);
        let v2 = origin.register(script(2)).await.unwrap();
        v2.wait_for(|s| s == WorkerState::Installed).await;
        while origin.waiting().await.map(|h| h.id()) != Some(v2.id()) {
            tokio::task::yield_now().await;
        }

        // Hold the registry so v2 cannot take control yet
        let registry = origin.inner.registry.lock().await;
        v2.post_message(ClientId::new(), ClientMessage::SkipWaiting)
            .unwrap();
        v2.wait_for(|s| s == WorkerState::Activating).await;
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }

        assert_eq!(origin.controller_id(), Some(v1.id()));
        assert_eq!(v1.state(), WorkerState::Activated);
        assert_eq!(
            origin.store().bucket_names().await,
            vec!["jobboard-v1", "jobboard-v2"]
        );

        drop(registry);
        v2.wait_for(|s| s == WorkerState::Activated).await;
        assert_eq!(origin.controller_id(), Some(v2.id()));
        assert_eq!(origin.store().bucket_names().await, vec!["jobboard-v2"]);
    }

    #[tokio::test]
    async fn retiring_controller_clears_it() {
        let network = MemoryNetwork::new();
        serve_version(&network, 1);
        let origin = Origin::new(base(), CacheStore::new(), Arc::new(network.clone()));
        let v1 = origin.register(script(1)).await.unwrap();
        v1.wait_for(|s| s == WorkerState::Activated).await;

        origin.retire(v1.id()).await;

        assert_eq!(origin.controller_id(), None);
        assert!(origin.controller().await.is_none());
    }
}
