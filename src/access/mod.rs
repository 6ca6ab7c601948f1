//! Approval-gated route resolution
//!
//! Every navigation is run through a priority-ordered route table:
//!
//! | Match                         | Approved        | Not approved / absent |
//! |-------------------------------|-----------------|-----------------------|
//! | always-allowed route          | its view        | its view              |
//! | approval-gated route          | its view        | `profile` (denied)    |
//! | no route                      | `dashboard`     | `profile` (denied)    |
//!
//! The role is logged with each decision; no rule depends on it.

pub mod context;
pub mod gate;

pub use context::{ApprovalStatus, Role, UserAccessContext};
pub use gate::{
    decide, match_route, normalize_path, resolve, Access, RouteDecision, RouteRule, ViewId,
    ROUTE_TABLE,
};
