use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identity and authorization snapshot for the signed-in user.
///
/// Replaced wholesale on login or token refresh. Fields added after the
/// first release carry `#[serde(default)]` so records persisted by older
/// versions still deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub tenant_id: Option<i64>,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub is_superadmin: bool,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub permissions: HashSet<String>,
    #[serde(default)]
    pub security_level: Option<SecurityLevel>,
}

/// Security level assigned to tenant users; lists the module keys the
/// user may access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityLevel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub modules: HashSet<String>,
}

impl User {
    /// Check whether the user holds a permission key. Superadmins hold
    /// every permission.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_superadmin || self.permissions.contains(permission)
    }

    /// Check whether the user's security level grants a module key.
    /// Superadmins have access to every module.
    pub fn has_module(&self, module: &str) -> bool {
        self.is_superadmin
            || self
                .security_level
                .as_ref()
                .is_some_and(|level| level.modules.contains(module))
    }
}
