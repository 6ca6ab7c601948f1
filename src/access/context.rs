//! User access context supplied by the auth collaborator

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Account role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Contractor,
    Seller,
    Admin,
    /// Missing or unrecognized role
    #[default]
    #[serde(other)]
    Unknown,
}

impl FromStr for Role {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "contractor" => Self::Contractor,
            "seller" => Self::Seller,
            "admin" => Self::Admin,
            _ => Self::Unknown,
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Contractor => "contractor",
            Self::Seller => "seller",
            Self::Admin => "admin",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Account approval status, independent of role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl ApprovalStatus {
    pub const ALL: [ApprovalStatus; 4] = [
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::Unknown,
    ];
}

impl FromStr for ApprovalStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Unknown,
        })
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Read-only view of the signed-in user
///
/// JSON shape: `{"role": "contractor", "approvalStatus": "pending"}`.
/// Both fields may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccessContext {
    #[serde(default)]
    pub role: Role,

    #[serde(
        default,
        rename = "approvalStatus",
        skip_serializing_if = "Option::is_none"
    )]
    pub approval_status: Option<ApprovalStatus>,
}

impl UserAccessContext {
    pub fn new(role: Role, approval_status: Option<ApprovalStatus>) -> Self {
        Self {
            role,
            approval_status,
        }
    }

    /// Only an explicit `approved` unlocks gated views; an absent status is
    /// treated the same as `rejected`
    pub fn is_approved(&self) -> bool {
        self.approval_status == Some(ApprovalStatus::Approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_deserializes_wire_shape() {
        let ctx: UserAccessContext =
            serde_json::from_str(r#"{"role":"seller","approvalStatus":"approved"}"#).unwrap();
        assert_eq!(ctx.role, Role::Seller);
        assert_eq!(ctx.approval_status, Some(ApprovalStatus::Approved));
        assert!(ctx.is_approved());
    }

    #[test]
    fn context_tolerates_unknown_values() {
        let ctx: UserAccessContext =
            serde_json::from_str(r#"{"role":"superuser","approvalStatus":"suspended"}"#).unwrap();
        assert_eq!(ctx.role, Role::Unknown);
        assert_eq!(ctx.approval_status, Some(ApprovalStatus::Unknown));
        assert!(!ctx.is_approved());
    }

    #[test]
    fn context_fields_optional() {
        let ctx: UserAccessContext = serde_json::from_str("{}").unwrap();
        assert_eq!(ctx, UserAccessContext::default());
        assert!(!ctx.is_approved());
    }

    #[test]
    fn parse_is_infallible() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("".parse::<Role>().unwrap(), Role::Unknown);
        assert_eq!(
            " APPROVED ".parse::<ApprovalStatus>().unwrap(),
            ApprovalStatus::Approved
        );
        assert_eq!(
            "banned".parse::<ApprovalStatus>().unwrap(),
            ApprovalStatus::Unknown
        );
    }
}
