//! CLI command implementations

pub mod cache;
pub mod config;
pub mod resolve;
pub mod routes;
pub mod simulate;

pub use cache::execute as cache;
pub use config::execute as config;
pub use resolve::execute as resolve;
pub use routes::execute as routes;
pub use simulate::execute as simulate;
