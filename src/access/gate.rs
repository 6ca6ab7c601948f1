//! Route table and access decision

use crate::access::context::{ApprovalStatus, Role, UserAccessContext};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// View a navigation ends up on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewId {
    Profile,
    SellerChat,
    Notices,
    Dashboard,
    Jobs,
    JobDetail,
    MyJobs,
    Chat,
    Points,
    Notifications,
    AdminChat,
    Suggestions,
}

impl ViewId {
    /// View used for denied navigations
    pub const FALLBACK: ViewId = ViewId::Profile;

    /// View used for unmatched paths once approved
    pub const DEFAULT: ViewId = ViewId::Dashboard;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::SellerChat => "seller-chat",
            Self::Notices => "notices",
            Self::Dashboard => "dashboard",
            Self::Jobs => "jobs",
            Self::JobDetail => "job-detail",
            Self::MyJobs => "my-jobs",
            Self::Chat => "chat",
            Self::Points => "points",
            Self::Notifications => "notifications",
            Self::AdminChat => "admin-chat",
            Self::Suggestions => "suggestions",
        }
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Policy attached to a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Access {
    /// Reachable regardless of approval status
    Always,
    /// Reachable only with `approved` status
    RequiresApproval,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::RequiresApproval => write!(f, "approved"),
        }
    }
}

/// One entry of the route table
///
/// Patterns are matched segment by segment; a `:name` segment matches any
/// single non-empty segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteRule {
    pub pattern: &'static str,
    pub access: Access,
    pub view: ViewId,
}

const fn rule(pattern: &'static str, access: Access, view: ViewId) -> RouteRule {
    RouteRule {
        pattern,
        access,
        view,
    }
}

/// Route table in priority order; the first matching rule wins
pub const ROUTE_TABLE: &[RouteRule] = &[
    rule("profile", Access::Always, ViewId::Profile),
    rule("seller-chat", Access::Always, ViewId::SellerChat),
    rule("notices", Access::Always, ViewId::Notices),
    rule("dashboard", Access::RequiresApproval, ViewId::Dashboard),
    rule("jobs", Access::RequiresApproval, ViewId::Jobs),
    rule("jobs/:id", Access::RequiresApproval, ViewId::JobDetail),
    rule("job-detail", Access::RequiresApproval, ViewId::JobDetail),
    rule("job-detail/:id", Access::RequiresApproval, ViewId::JobDetail),
    rule("my-jobs", Access::RequiresApproval, ViewId::MyJobs),
    rule("chat", Access::RequiresApproval, ViewId::Chat),
    rule("chat/:id", Access::RequiresApproval, ViewId::Chat),
    rule("points", Access::RequiresApproval, ViewId::Points),
    rule("notifications", Access::RequiresApproval, ViewId::Notifications),
    rule("admin-chat", Access::RequiresApproval, ViewId::AdminChat),
    rule("suggestions", Access::RequiresApproval, ViewId::Suggestions),
];

impl RouteRule {
    pub fn matches(&self, path: &str) -> bool {
        let mut pattern = self.pattern.split('/');
        let mut segments = path.split('/');
        loop {
            match (pattern.next(), segments.next()) {
                (None, None) => return true,
                (Some(p), Some(s)) if p.starts_with(':') && !s.is_empty() => {}
                (Some(p), Some(s)) if p == s => {}
                _ => return false,
            }
        }
    }
}

/// Outcome of one navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDecision {
    pub requested_path: String,
    pub resolved_view: ViewId,
    pub was_denied: bool,
}

/// Strip query and fragment, then surrounding slashes
pub fn normalize_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    path[..end].trim().trim_matches('/')
}

/// First rule matching `path`, if any
pub fn match_route(path: &str) -> Option<&'static RouteRule> {
    let path = normalize_path(path);
    ROUTE_TABLE.iter().find(|rule| rule.matches(path))
}

/// Decide which view a navigation lands on
///
/// Total: every input maps to a view, denial included.
pub fn decide(path: &str, ctx: &UserAccessContext) -> RouteDecision {
    let approved = ctx.is_approved();
    let (view, denied) = match match_route(path) {
        Some(rule) if rule.access == Access::Always => (rule.view, false),
        Some(rule) if approved => (rule.view, false),
        Some(_) => (ViewId::FALLBACK, true),
        None if approved => (ViewId::DEFAULT, false),
        None => (ViewId::FALLBACK, true),
    };

    debug!(
        "Route {:?} for {} ({:?}) -> {}{}",
        path,
        ctx.role,
        ctx.approval_status,
        view,
        if denied { " (denied)" } else { "" }
    );

    RouteDecision {
        requested_path: path.to_string(),
        resolved_view: view,
        was_denied: denied,
    }
}

/// Resolve a navigation to the view it lands on
pub fn resolve(path: &str, role: Role, approval_status: Option<ApprovalStatus>) -> ViewId {
    decide(path, &UserAccessContext::new(role, approval_status)).resolved_view
}
