use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

/// Permission node: a single addressable capability in a permission tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(no_recursion)]
    pub children: Option<Vec<PermissionNode>>,
    /// Section headers group capabilities but are never toggled directly.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_title: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl PermissionNode {
    /// Creates an unchecked leaf capability.
    pub fn leaf(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            checked: false,
            children: None,
            is_title: false,
        }
    }

    /// Creates an unchecked capability with nested sub-capabilities.
    pub fn branch(id: &str, label: &str, children: Vec<PermissionNode>) -> Self {
        Self {
            children: Some(children),
            ..Self::leaf(id, label)
        }
    }

    /// Creates a section header. Title nodes are transparent to ancestor checks.
    pub fn title(id: &str, label: &str, children: Vec<PermissionNode>) -> Self {
        Self {
            is_title: true,
            ..Self::branch(id, label, children)
        }
    }

    /// Returns the children of this node, or an empty slice for leaves.
    pub fn child_nodes(&self) -> &[PermissionNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    fn set_all(&mut self, checked: bool) {
        self.checked = checked;
        if let Some(children) = self.children.as_mut() {
            for child in children {
                child.set_all(checked);
            }
        }
    }

    fn is_fully_selected(&self) -> bool {
        (self.is_title || self.checked)
            && self
                .child_nodes()
                .iter()
                .all(PermissionNode::is_fully_selected)
    }

    fn grants(&self, id: &str) -> bool {
        (self.id == id && self.checked) || self.child_nodes().iter().any(|c| c.grants(id))
    }

    fn find(&self, id: &str) -> Option<&PermissionNode> {
        if self.id == id {
            return Some(self);
        }
        self.child_nodes().iter().find_map(|c| c.find(id))
    }

    fn same_shape(&self, other: &PermissionNode) -> bool {
        self.id == other.id
            && self.label == other.label
            && self.is_title == other.is_title
            && self.children.is_some() == other.children.is_some()
            && same_shape_level(self.child_nodes(), other.child_nodes())
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a PermissionNode)) {
        f(self);
        for child in self.child_nodes() {
            child.visit(f);
        }
    }
}

fn same_shape_level(left: &[PermissionNode], right: &[PermissionNode]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(l, r)| l.same_shape(r))
}

/// Why a single-node toggle was refused. The tree is left unchanged in every case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToggleRejection {
    #[error("toggle path is empty")]
    EmptyPath,
    #[error("no permission node at path {}", .path.join(" > "))]
    UnknownPath { path: Vec<String> },
    #[error("'{id}' is a section title and cannot be toggled")]
    TitleNode { id: String },
    #[error("'{id}' cannot be granted while '{ancestor_id}' is not granted")]
    AncestorNotGranted { id: String, ancestor_id: String },
}

/// An ordered forest of permission nodes.
///
/// Used both for the canonical catalog and for a role's persisted grants.
/// Every operation returns a new tree; the receiver is never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PermissionTree(pub Vec<PermissionNode>);

impl From<Vec<PermissionNode>> for PermissionTree {
    fn from(nodes: Vec<PermissionNode>) -> Self {
        Self(nodes)
    }
}

impl PermissionTree {
    pub fn roots(&self) -> &[PermissionNode] {
        &self.0
    }

    /// Reconciles a saved tree against the canonical tree.
    ///
    /// The result has exactly the canonical shape. `checked` is copied from
    /// the saved node with the same id at the same level, or defaults to
    /// `false`. Saved nodes unknown to the canonical tree are dropped.
    pub fn merge(canonical: &PermissionTree, saved: &PermissionTree) -> PermissionTree {
        PermissionTree(merge_level(&canonical.0, &saved.0))
    }

    /// Applies one user toggle to the node addressed by `path` (ids from root to target).
    ///
    /// Granting requires every non-title ancestor to be granted already.
    /// On success the target flips and all of its descendants take the new value.
    pub fn toggled<S: AsRef<str>>(&self, path: &[S]) -> Result<PermissionTree, ToggleRejection> {
        let (target_id, ancestor_ids) = path.split_last().ok_or(ToggleRejection::EmptyPath)?;
        let unknown = || ToggleRejection::UnknownPath {
            path: path.iter().map(|s| s.as_ref().to_string()).collect(),
        };

        let mut level = self.roots();
        let mut ancestors = Vec::with_capacity(ancestor_ids.len());
        for ancestor_id in ancestor_ids {
            let node = level
                .iter()
                .find(|n| n.id == ancestor_id.as_ref())
                .ok_or_else(unknown)?;
            ancestors.push(node);
            level = node.child_nodes();
        }
        let target = level
            .iter()
            .find(|n| n.id == target_id.as_ref())
            .ok_or_else(unknown)?;

        if target.is_title {
            return Err(ToggleRejection::TitleNode {
                id: target.id.clone(),
            });
        }

        let checked = !target.checked;
        if checked {
            if let Some(blocker) = ancestors.iter().find(|a| !a.is_title && !a.checked) {
                return Err(ToggleRejection::AncestorNotGranted {
                    id: target.id.clone(),
                    ancestor_id: blocker.id.clone(),
                });
            }
        }

        let mut next = self.clone();
        let node = node_at_path_mut(&mut next.0, path).ok_or_else(unknown)?;
        node.set_all(checked);
        Ok(next)
    }

    /// True iff every non-title node, at every depth, is checked.
    pub fn is_fully_selected(&self) -> bool {
        self.0.iter().all(PermissionNode::is_fully_selected)
    }

    /// Returns a copy with every node, titles included, set to `checked`.
    pub fn with_all(&self, checked: bool) -> PermissionTree {
        let mut next = self.clone();
        for node in &mut next.0 {
            node.set_all(checked);
        }
        next
    }

    /// Select-all convenience: clears everything when fully selected, otherwise grants everything.
    /// Bypasses the ancestor rule that governs single toggles.
    pub fn select_all_toggled(&self) -> PermissionTree {
        self.with_all(!self.is_fully_selected())
    }

    /// Evaluation query: does this tree grant capability `id`?
    ///
    /// Unknown and ungranted capabilities both evaluate to `false`.
    pub fn has_capability(&self, id: &str) -> bool {
        self.0.iter().any(|n| n.grants(id))
    }

    pub fn find(&self, id: &str) -> Option<&PermissionNode> {
        self.0.iter().find_map(|n| n.find(id))
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.visit(|_| count += 1);
        count
    }

    /// Structural equality ignoring `checked`.
    pub fn same_shape(&self, other: &PermissionTree) -> bool {
        same_shape_level(&self.0, &other.0)
    }

    /// Ids of all granted non-title nodes in depth-first order.
    pub fn granted_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.visit(|n| {
            if n.checked && !n.is_title {
                ids.push(n.id.as_str());
            }
        });
        ids
    }

    /// Ids that occur more than once anywhere in the tree.
    pub fn duplicate_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        self.visit(|n| {
            if !seen.insert(n.id.as_str()) && !duplicates.contains(&n.id.as_str()) {
                duplicates.push(n.id.as_str());
            }
        });
        duplicates
    }

    fn visit<'a>(&'a self, mut f: impl FnMut(&'a PermissionNode)) {
        for node in &self.0 {
            node.visit(&mut f);
        }
    }
}

fn merge_level(canonical: &[PermissionNode], saved: &[PermissionNode]) -> Vec<PermissionNode> {
    canonical
        .iter()
        .map(|node| {
            let matched = saved.iter().find(|s| s.id == node.id);
            PermissionNode {
                id: node.id.clone(),
                label: node.label.clone(),
                checked: matched.is_some_and(|s| s.checked),
                children: node.children.as_ref().map(|children| {
                    merge_level(
                        children,
                        matched.map(PermissionNode::child_nodes).unwrap_or(&[]),
                    )
                }),
                is_title: node.is_title,
            }
        })
        .collect()
}

fn node_at_path_mut<'a, S: AsRef<str>>(
    nodes: &'a mut [PermissionNode],
    path: &[S],
) -> Option<&'a mut PermissionNode> {
    let (first, rest) = path.split_first()?;
    let node = nodes.iter_mut().find(|n| n.id == first.as_ref())?;
    if rest.is_empty() {
        Some(node)
    } else {
        node_at_path_mut(node.children.as_deref_mut()?, rest)
    }
}
