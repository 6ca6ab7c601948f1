//! Worker lifecycle state machine

use crate::error::{SwgateError, SwgateResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one worker instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub Uuid);

impl WorkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell workers apart in logs
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// Lifecycle state of a worker instance
///
/// `installing -> installed -> activating -> activated`, with `redundant`
/// reachable from every state before activation. An activated worker only
/// becomes redundant when a newer worker takes its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    /// Installed and waiting for the skip-waiting signal
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Installing, Installed)
                | (Installed, Activating)
                | (Activating, Activated)
                | (Installing, Redundant)
                | (Installed, Redundant)
                | (Activating, Redundant)
                | (Activated, Redundant)
        )
    }

    /// Validate and return the next state
    pub fn transition(self, next: WorkerState) -> SwgateResult<WorkerState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SwgateError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Installed and not yet told to activate
    pub fn is_waiting(self) -> bool {
        self == Self::Installed
    }

    /// No further transitions will happen
    pub fn is_terminal(self) -> bool {
        self == Self::Redundant
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        write!(f, "{}", name)
    }
}
