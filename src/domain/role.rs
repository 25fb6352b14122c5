use crate::domain::permission::PermissionTree;
use crate::domain::permission_catalog::{blank_tree, canonical_tree};
use chrono::{DateTime, Utc};

/// Role entity: a named, brand-scoped bundle of granted capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub brand_id: String,
    /// Full permission tree as persisted; may lag behind the canonical catalog.
    pub permissions: PermissionTree,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Creates a role seeded from the canonical catalog with nothing granted.
    pub fn new(name: &str, brand_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            brand_id: brand_id.to_string(),
            permissions: blank_tree(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a role granting every node of the catalog.
    pub fn with_full_access(name: &str, brand_id: &str) -> Self {
        Self {
            permissions: canonical_tree().with_all(true),
            ..Self::new(name, brand_id)
        }
    }

    /// Persisted grants reconciled against the current catalog.
    pub fn reconciled_permissions(&self) -> PermissionTree {
        PermissionTree::merge(canonical_tree(), &self.permissions)
    }

    /// Evaluates a capability against the persisted list.
    pub fn has_capability(&self, capability_id: &str) -> bool {
        self.permissions.has_capability(capability_id)
    }

    /// Replaces the whole permission tree.
    pub fn replace_permissions(&mut self, permissions: PermissionTree) {
        self.permissions = permissions;
        self.updated_at = Utc::now();
    }

    pub fn belongs_to(&self, brand_id: &str) -> bool {
        self.brand_id == brand_id
    }

    /// Case-insensitive name match, folded the same way as `LOWER(name)` in SQL.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}
