//! Role → permission table.
//!
//! Built once at startup, immutable afterwards. Construction fails unless
//! every [`Role`] has an entry, so lookups are total.

use std::collections::{HashMap, HashSet};

use crate::config::ConfigError;
use crate::models::auth::Role;

const STUDENT: &[&str] = &[
    "read:courses",
    "read:levels",
    "read:sections",
    "read:modules",
    "read:lessons",
    "read:exercises",
    "read:profile",
    "update:profile",
    "read:progress",
    "create:progress",
    "update:progress",
];

const CONTENT_CREATOR_EXTRA: &[&str] = &[
    "create:courses",
    "update:courses",
    "delete:courses",
    "create:levels",
    "update:levels",
    "delete:levels",
    "create:sections",
    "update:sections",
    "delete:sections",
    "create:modules",
    "update:modules",
    "delete:modules",
    "create:lessons",
    "update:lessons",
    "delete:lessons",
    "create:exercises",
    "update:exercises",
    "delete:exercises",
];

const ADMIN_EXTRA: &[&str] = &[
    "read:users",
    "manage:users",
    "delete:progress",
    "manage:system",
];

/// Static mapping from role to granted permission strings.
#[derive(Debug, Clone)]
pub struct PermissionTable {
    grants: HashMap<Role, HashSet<String>>,
}

impl PermissionTable {
    /// Build a table from explicit `(role, permissions)` entries.
    ///
    /// Fails if any role is missing. Repeated roles merge their permissions.
    pub fn from_entries<I, P, S>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (Role, P)>,
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut grants: HashMap<Role, HashSet<String>> = HashMap::new();
        for (role, permissions) in entries {
            grants
                .entry(role)
                .or_default()
                .extend(permissions.into_iter().map(Into::into));
        }

        let missing: Vec<&str> = Role::ALL
            .iter()
            .filter(|role| !grants.contains_key(role))
            .map(|role| role.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "permission table",
                reason: format!("no entry for role(s): {}", missing.join(", ")),
            });
        }

        Ok(Self { grants })
    }

    /// The WayrApp role table: admin ⊇ content_creator ⊇ student.
    pub fn builtin() -> Self {
        let student: Vec<&str> = STUDENT.to_vec();
        let creator: Vec<&str> = student
            .iter()
            .chain(CONTENT_CREATOR_EXTRA)
            .copied()
            .collect();
        let admin: Vec<&str> = creator.iter().chain(ADMIN_EXTRA).copied().collect();

        let grants = [
            (Role::Student, student),
            (Role::ContentCreator, creator),
            (Role::Admin, admin),
        ]
        .into_iter()
        .map(|(role, perms)| {
            let perms: HashSet<String> = perms.into_iter().map(String::from).collect();
            (role, perms)
        })
        .collect();

        Self { grants }
    }

    /// Permissions granted to `role`.
    pub fn permissions(&self, role: Role) -> &HashSet<String> {
        // `from_entries` and `builtin` guarantee an entry per role.
        &self.grants[&role]
    }

    pub fn allows(&self, role: Role, permission: &str) -> bool {
        self.permissions(role).contains(permission)
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::builtin()
    }
}
