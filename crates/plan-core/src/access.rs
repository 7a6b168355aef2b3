//! Role-based tab permissions.
//!
//! The projection never consults these; callers gate their views with them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Application role of the signed-in user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppRole {
    Admin,
    Manager,
    Member,
    Viewer,
}

/// Access level for a tab, ordered from least to most access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabPermission {
    Hidden,
    Read,
    Write,
}

impl TabPermission {
    pub fn can_read(self) -> bool {
        self >= TabPermission::Read
    }

    pub fn can_write(self) -> bool {
        self == TabPermission::Write
    }
}

/// Tabs holding financial planning data.
pub const FINANCE_TABS: &[&str] = &[
    "dashboard",
    "products",
    "payroll",
    "opex",
    "treasury",
    "funding",
    "valuation",
];

/// Tabs used in day-to-day operations.
pub const OPERATIONS_TABS: &[&str] = &["crm", "production", "time"];

/// Administration tab.
pub const SETTINGS_TAB: &str = "settings";

/// Supplies the current role and tab access.
pub trait PermissionProvider {
    fn role(&self) -> AppRole;
    fn tab_permission(&self, tab: &str) -> TabPermission;
}

/// Role defaults plus per-role tab overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionMatrix {
    pub overrides: BTreeMap<AppRole, BTreeMap<String, TabPermission>>,
}

impl PermissionMatrix {
    /// Permission granted to `role` when no override exists.
    pub fn default_permission(role: AppRole, tab: &str) -> TabPermission {
        let finance = FINANCE_TABS.contains(&tab);
        let operations = OPERATIONS_TABS.contains(&tab);
        match role {
            AppRole::Admin => TabPermission::Write,
            AppRole::Manager if tab == SETTINGS_TAB => TabPermission::Read,
            AppRole::Manager => TabPermission::Write,
            AppRole::Member if operations => TabPermission::Write,
            AppRole::Member if finance => TabPermission::Read,
            AppRole::Viewer if finance || operations => TabPermission::Read,
            AppRole::Member | AppRole::Viewer => TabPermission::Hidden,
        }
    }

    pub fn set(&mut self, role: AppRole, tab: impl Into<String>, permission: TabPermission) {
        self.overrides
            .entry(role)
            .or_default()
            .insert(tab.into(), permission);
    }

    pub fn permission(&self, role: AppRole, tab: &str) -> TabPermission {
        self.overrides
            .get(&role)
            .and_then(|tabs| tabs.get(tab))
            .copied()
            .unwrap_or_else(|| Self::default_permission(role, tab))
    }

    /// Bind the matrix to a role.
    pub fn for_role(&self, role: AppRole) -> RolePermissions<'_> {
        RolePermissions { matrix: self, role }
    }
}

/// A [`PermissionMatrix`] viewed through one role.
#[derive(Clone, Copy, Debug)]
pub struct RolePermissions<'a> {
    matrix: &'a PermissionMatrix,
    role: AppRole,
}

impl PermissionProvider for RolePermissions<'_> {
    fn role(&self) -> AppRole {
        self.role
    }

    fn tab_permission(&self, tab: &str) -> TabPermission {
        self.matrix.permission(self.role, tab)
    }
}
