//! Role-based capability policy.
//!
//! Handlers never compare role strings. They ask the [`Policy`] whether the
//! caller's [`Role`] carries the [`Capability`] the route needs. Ownership
//! checks (is this *your* transaction?) stay in the core functions, since they
//! depend on stored data rather than on the role alone.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Kind of account behind a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// An institution that allocates funds
    Institution,
    /// A department that receives and spends funds
    Department,
    /// A member of the public
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Institution => "Institution",
            Self::Department => "Department",
            Self::User => "User",
        };
        f.write_str(name)
    }
}

/// Something a route lets the caller do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Claim a department by its shared code
    LinkDepartment,
    /// List departments linked to the caller
    ListDepartments,
    /// Upload allocation reports
    UploadAllocations,
    /// List the reports filed under the caller
    ViewReports,
    /// List, acknowledge and resolve anomalies
    ReviewAnomalies,
    /// See allocations awaiting verification
    ViewPendingTransactions,
    /// Mark allocations completed or disputed
    VerifyTransactions,
    /// Upload spending reports
    UploadSpending,
    /// Open and use assistant sessions
    UseChatbot,
    /// Take part in user/department conversations
    Converse,
}

/// Maps each role to the capabilities it holds.
#[derive(Debug, Clone)]
pub struct Policy {
    grants: HashMap<Role, HashSet<Capability>>,
}

impl Policy {
    /// Builds a policy from explicit grants.
    #[must_use]
    pub fn new(grants: HashMap<Role, HashSet<Capability>>) -> Self {
        Self { grants }
    }

    /// The grants the service runs with.
    #[must_use]
    pub fn standard() -> Self {
        let grants = HashMap::from([
            (
                Role::Institution,
                HashSet::from([
                    Capability::LinkDepartment,
                    Capability::ListDepartments,
                    Capability::UploadAllocations,
                    Capability::ViewReports,
                    Capability::ReviewAnomalies,
                ]),
            ),
            (
                Role::Department,
                HashSet::from([
                    Capability::ViewPendingTransactions,
                    Capability::VerifyTransactions,
                    Capability::UploadSpending,
                    Capability::Converse,
                ]),
            ),
            (
                Role::User,
                HashSet::from([Capability::UseChatbot, Capability::Converse]),
            ),
        ]);
        Self::new(grants)
    }

    /// Whether `role` holds `capability`.
    #[must_use]
    pub fn allows(&self, role: Role, capability: Capability) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|caps| caps.contains(&capability))
    }

    /// Fails with [`Error::Unauthorized`] unless `role` holds `capability`.
    pub fn require(&self, role: Role, capability: Capability) -> Result<()> {
        if self.allows(role, capability) {
            Ok(())
        } else {
            tracing::debug!("Denied {capability:?} for role {role}");
            Err(Error::unauthorized(format!(
                "{role} accounts cannot perform this action"
            )))
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_institution_capabilities() {
        let policy = Policy::standard();
        assert!(policy.allows(Role::Institution, Capability::LinkDepartment));
        assert!(policy.allows(Role::Institution, Capability::UploadAllocations));
        assert!(policy.allows(Role::Institution, Capability::ReviewAnomalies));
        assert!(policy.allows(Role::Institution, Capability::ViewReports));
        assert!(!policy.allows(Role::Institution, Capability::VerifyTransactions));
        assert!(!policy.allows(Role::Institution, Capability::UploadSpending));
        assert!(!policy.allows(Role::Institution, Capability::UseChatbot));
    }

    #[test]
    fn test_department_capabilities() {
        let policy = Policy::standard();
        assert!(policy.allows(Role::Department, Capability::VerifyTransactions));
        assert!(policy.allows(Role::Department, Capability::UploadSpending));
        assert!(policy.allows(Role::Department, Capability::Converse));
        assert!(!policy.allows(Role::Department, Capability::UploadAllocations));
        assert!(!policy.allows(Role::Department, Capability::UseChatbot));
        assert!(!policy.allows(Role::Department, Capability::ViewReports));
    }

    #[test]
    fn test_user_capabilities() {
        let policy = Policy::standard();
        assert!(policy.allows(Role::User, Capability::UseChatbot));
        assert!(policy.allows(Role::User, Capability::Converse));
        assert!(!policy.allows(Role::User, Capability::VerifyTransactions));
        assert!(!policy.allows(Role::User, Capability::LinkDepartment));
    }

    #[test]
    fn test_require_returns_unauthorized() {
        let policy = Policy::standard();
        assert!(policy.require(Role::User, Capability::UseChatbot).is_ok());
        assert!(matches!(
            policy.require(Role::User, Capability::UploadSpending),
            Err(Error::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_empty_policy_denies_everything() {
        let policy = Policy::new(HashMap::new());
        assert!(!policy.allows(Role::Institution, Capability::LinkDepartment));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Department.to_string(), "Department");
    }
}
