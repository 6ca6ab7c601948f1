//! Worker lifecycle and cross-tab update handshake
//!
//! The background worker ([`UpdateCoordinator`]) and every foreground tab
//! ([`ClientUpdateListener`]) are separate tasks joined only by channels:
//!
//! 1. a tab registers a worker script; the worker installs its precache
//! 2. with another worker active, the new one waits in `installed`
//! 3. tabs following it mark the update pending
//! 4. a tab sends `SKIP_WAITING`; the worker activates and claims every tab
//! 5. the worker collects old buckets and sends each tab `APP_UPDATED`
//! 6. each tab reloads once, after a short delay

pub mod coordinator;
pub mod handle;
pub mod listener;
pub mod message;
pub mod origin;
pub mod state;

pub use coordinator::{UpdateCoordinator, WorkerScript};
pub use handle::WorkerHandle;
pub use listener::{ClientEvent, ClientUpdateListener, UpdateAvailability};
pub use message::{ClientId, ClientMessage, WorkerMessage};
pub use origin::{ClientConnection, Origin, OriginSettings};
pub use state::{WorkerId, WorkerState};
