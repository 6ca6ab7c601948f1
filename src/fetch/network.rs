//! Network boundary
//!
//! Provides a trait for request/response exchange that can be implemented
//! by different backends (real HTTP via ureq, or an in-memory site used by
//! the simulator and tests).

use crate::error::{SwgateError, SwgateResult};
use crate::fetch::request::{Method, Request, Response};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;
use ureq::ResponseExt;
use url::Url;

/// Abstract request/response interface
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform a request. Transport failures are errors; HTTP error statuses are not.
    async fn fetch(&self, request: &Request) -> SwgateResult<Response>;
}

/// Redirects followed before a request fails
const MAX_REDIRECTS: usize = 10;

/// Blocking HTTP client run on the blocking thread pool
#[derive(Clone)]
pub struct HttpNetwork {
    agent: ureq::Agent,
}

impl HttpNetwork {
    /// Create a client with a global request timeout
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .max_redirects(MAX_REDIRECTS as u32)
            .build();
        Self {
            agent: config.into(),
        }
    }

    fn fetch_blocking(agent: &ureq::Agent, request: &Request) -> SwgateResult<Response> {
        let url = request.url.as_str();
        let result = match request.method {
            Method::Get => agent.get(url).call(),
            Method::Head => agent.head(url).call(),
            Method::Delete => agent.delete(url).call(),
            Method::Post => agent.post(url).send_empty(),
            Method::Put => agent.put(url).send_empty(),
        };
        let mut resp = result.map_err(|e| SwgateError::network(url, e.to_string()))?;

        // Redirects are followed, so the response may come from another origin
        let served_from = resp.get_uri().to_string();
        let final_url = Url::parse(&served_from)
            .map_err(|e| SwgateError::network(served_from.as_str(), e.to_string()))?;

        let status = resp.status().as_u16();
        let mut response = Response::new(final_url, status, Vec::new());
        for (name, value) in resp.headers() {
            if let Ok(value) = value.to_str() {
                response = response.with_header(name.as_str(), value);
            }
        }
        response.body = resp
            .body_mut()
            .read_to_vec()
            .map_err(|e| SwgateError::network(url, e.to_string()))?;

        Ok(response)
    }
}

impl Default for HttpNetwork {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> SwgateResult<Response> {
        debug!("{} {}", request.method, request.url);
        let agent = self.agent.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || Self::fetch_blocking(&agent, &request))
            .await
            .map_err(|e| SwgateError::Internal(format!("fetch task failed: {}", e)))?
    }
}

#[derive(Debug, Clone)]
struct Route {
    status: u16,
    body: Vec<u8>,
    headers: Vec<(String, String)>,
    reachable: bool,
    /// Location a 3xx route forwards to
    redirect: Option<String>,
}

#[derive(Debug, Default)]
struct MemorySite {
    routes: HashMap<String, Route>,
    offline: bool,
    hits: HashMap<String, usize>,
}

/// In-memory site keyed by absolute URL
///
/// Unknown URLs answer 404. Routes can be made unreachable one by one, or the
/// whole site taken offline, to exercise failure paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    site: Arc<Mutex<MemorySite>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve every entry in `paths` from `origin` with a 200 and a body naming the version
    pub fn serving(origin: &Url, paths: &[String], version: u32) -> SwgateResult<Self> {
        let network = Self::new();
        for path in paths {
            let url = origin.join(path).map_err(|e| SwgateError::InvalidUrl {
                url: path.clone(),
                reason: e.to_string(),
            })?;
            network.serve(url.as_str(), 200, format!("{} (v{})", path, version));
        }
        Ok(network)
    }

    fn site(&self) -> MutexGuard<'_, MemorySite> {
        self.site.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serve a fixed response at a URL
    pub fn serve(&self, url: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.site().routes.insert(
            url.to_string(),
            Route {
                status,
                body: body.into(),
                headers: Vec::new(),
                reachable: true,
                redirect: None,
            },
        );
    }

    /// Serve a fixed response with one header
    pub fn serve_with_header(
        &self,
        url: &str,
        status: u16,
        body: impl Into<Vec<u8>>,
        header: (&str, &str),
    ) {
        self.serve(url, status, body);
        if let Some(route) = self.site().routes.get_mut(url) {
            route
                .headers
                .push((header.0.to_string(), header.1.to_string()));
        }
    }

    /// Answer `url` with a 302 to `location`, which the client follows
    pub fn serve_redirect(&self, url: &str, location: &str) {
        self.serve(url, 302, Vec::new());
        if let Some(route) = self.site().routes.get_mut(url) {
            route.redirect = Some(location.to_string());
        }
    }

    /// Make a single URL fail at the transport level
    pub fn set_reachable(&self, url: &str, reachable: bool) {
        let mut site = self.site();
        let route = site.routes.entry(url.to_string()).or_insert(Route {
            status: 404,
            body: Vec::new(),
            headers: Vec::new(),
            reachable,
            redirect: None,
        });
        route.reachable = reachable;
    }

    /// Take the whole site offline or back online
    pub fn set_offline(&self, offline: bool) {
        self.site().offline = offline;
    }

    /// Number of requests that reached a URL
    pub fn hits(&self, url: &str) -> usize {
        self.site().hits.get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Network for MemoryNetwork {
    async fn fetch(&self, request: &Request) -> SwgateResult<Response> {
        let mut url = request.url.clone();
        url.set_fragment(None);
        let mut site = self.site();

        for _ in 0..=MAX_REDIRECTS {
            let key = url.to_string();
            *site.hits.entry(key.clone()).or_insert(0) += 1;

            if site.offline {
                return Err(SwgateError::network(key, "network is offline"));
            }

            let route = match site.routes.get(&key) {
                Some(route) if !route.reachable => {
                    return Err(SwgateError::network(key, "connection refused"))
                }
                Some(route) => route.clone(),
                None => return Ok(Response::new(url, 404, "not found")),
            };

            if let Some(location) = &route.redirect {
                // Location may be relative to the current URL
                url = url
                    .join(location)
                    .map_err(|e| SwgateError::network(key.as_str(), e.to_string()))?;
                continue;
            }

            let mut response = Response::new(url, route.status, route.body);
            for (name, value) in &route.headers {
                response = response.with_header(name.as_str(), value.as_str());
            }
            return Ok(response);
        }

        Err(SwgateError::network(
            request.cache_key(),
            "too many redirects",
        ))
    }
}
