//! swgate - offline cache lifecycle and update coordination
//!
//! Models the background worker of an installable web app together with the
//! foreground tabs it serves: versioned precache buckets, cache-first fetch
//! interception, the waiting/skip-waiting update handshake, and the
//! approval-gated route resolver consulted on every navigation.

pub mod access;
pub mod audit;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod ui;

pub use error::{SwgateError, SwgateResult};
