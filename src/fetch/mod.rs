//! Fetch interception and the network boundary

pub mod interceptor;
pub mod network;
pub mod request;

pub use interceptor::{CacheWrite, FetchInterceptor, FetchOutcome, ResponseSource};
pub use network::{HttpNetwork, MemoryNetwork, Network};
pub use request::{Method, Request, Response};
