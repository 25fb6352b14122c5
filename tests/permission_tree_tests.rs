use fitout_access_service::domain::permission::{PermissionNode, PermissionTree, ToggleRejection};
use fitout_access_service::domain::permission_catalog::{blank_tree, canonical_tree, capability};
use serde_json::json;

fn saved_tree(value: serde_json::Value) -> PermissionTree {
    serde_json::from_value(value).unwrap()
}

/// Every checked flag in DFS order, keyed by id
fn checked_flags(tree: &PermissionTree) -> Vec<(String, bool)> {
    fn walk(nodes: &[PermissionNode], out: &mut Vec<(String, bool)>) {
        for node in nodes {
            out.push((node.id.clone(), node.checked));
            walk(node.child_nodes(), out);
        }
    }
    let mut out = Vec::new();
    walk(tree.roots(), &mut out);
    out
}

fn assert_subtree(tree: &PermissionTree, id: &str, expected: bool) {
    fn walk(node: &PermissionNode, expected: bool) {
        assert_eq!(node.checked, expected, "{} should be {expected}", node.id);
        for child in node.child_nodes() {
            walk(child, expected);
        }
    }
    walk(tree.find(id).unwrap(), expected);
}

// ============================================================================
// MERGE
// ============================================================================

#[test]
fn test_merge_always_has_canonical_shape() {
    let saved_trees = vec![
        PermissionTree::default(),
        canonical_tree().with_all(true),
        saved_tree(json!([
            { "id": "finance", "label": "Old finance label", "checked": true },
            { "id": "retired-module", "label": "Retired", "checked": true,
              "children": [{ "id": "retired-child", "label": "Child", "checked": true }] }
        ])),
        saved_tree(json!([
            { "id": "settings", "label": "Settings", "checked": true, "children": [
                { "id": "settings-roles", "label": "Roles", "checked": true, "children": [
                    { "id": "settings-roles-edit", "label": "Edit", "checked": true },
                    { "id": "settings-roles-archive", "label": "Archive", "checked": true }
                ]}
            ]}
        ])),
    ];

    for saved in &saved_trees {
        let merged = PermissionTree::merge(canonical_tree(), saved);
        assert!(merged.same_shape(canonical_tree()));
        assert_eq!(merged.node_count(), canonical_tree().node_count());
        assert!(merged.find("retired-module").is_none());
        assert!(merged.find("settings-roles-archive").is_none());
    }
}

#[test]
fn test_merge_copies_checked_by_id_or_defaults_to_false() {
    let saved = saved_tree(json!([
        { "id": "settings", "label": "Settings", "checked": true, "children": [
            { "id": "settings-roles", "label": "Roles", "checked": true, "children": [
                { "id": "settings-roles-edit", "label": "Edit", "checked": true },
                { "id": "settings-roles-add", "label": "Add", "checked": false }
            ]}
        ]}
    ]));

    let merged = PermissionTree::merge(canonical_tree(), &saved);
    for (id, checked) in checked_flags(&merged) {
        let expected = matches!(
            id.as_str(),
            "settings" | "settings-roles" | "settings-roles-edit"
        );
        assert_eq!(checked, expected, "{id}");
    }
}

#[test]
fn test_merge_finance_scenario() {
    let saved = saved_tree(json!([
        { "id": "finance", "label": "Finance", "checked": true, "children": [
            { "id": "finance-Export", "label": "Export", "checked": true }
        ]}
    ]));

    let merged = PermissionTree::merge(canonical_tree(), &saved);
    assert!(merged.find(capability::FINANCE).unwrap().checked);
    assert!(merged.find(capability::FINANCE_EXPORT).unwrap().checked);
    assert!(!merged.find(capability::FINANCE_POLICY).unwrap().checked);
}

#[test]
fn test_merge_looks_up_ids_among_siblings_only() {
    // A granted id saved under the wrong parent is not carried over.
    let saved = saved_tree(json!([
        { "id": "reports", "label": "Reports", "checked": false, "children": [
            { "id": "finance-Export", "label": "Export", "checked": true }
        ]}
    ]));

    let merged = PermissionTree::merge(canonical_tree(), &saved);
    assert!(!merged.has_capability(capability::FINANCE_EXPORT));
}

#[test]
fn test_merge_takes_labels_and_titles_from_canonical() {
    let saved = saved_tree(json!([
        { "id": "projects", "label": "Jobs", "checked": true, "children": [
            { "id": "projects-detail", "label": "Detail", "checked": true, "isTitle": false }
        ]}
    ]));

    let merged = PermissionTree::merge(canonical_tree(), &saved);
    assert_eq!(merged.find("projects").unwrap().label, "Projects");
    assert!(merged.find("projects-detail").unwrap().is_title);
}

// ============================================================================
// TOGGLE
// ============================================================================

#[test]
fn test_toggle_child_of_unchecked_parent_is_rejected() {
    let tree = blank_tree();
    let result = tree.toggled(&[capability::FINANCE, capability::FINANCE_EXPORT]);

    assert_eq!(
        result,
        Err(ToggleRejection::AncestorNotGranted {
            id: capability::FINANCE_EXPORT.to_string(),
            ancestor_id: capability::FINANCE.to_string(),
        })
    );
    assert!(!tree.has_capability(capability::FINANCE_EXPORT));
}

#[test]
fn test_toggle_parent_on_grants_every_descendant() {
    let tree = blank_tree().toggled(&[capability::DASHBOARD]).unwrap();

    assert_subtree(&tree, capability::DASHBOARD, true);
    assert!(tree.has_capability(capability::DASHBOARD_BRAND_ADD));
    assert!(tree.has_capability(capability::DASHBOARD_BRAND_VIEW_ADD_USER));
    assert!(!tree.has_capability(capability::PROJECTS));
}

#[test]
fn test_toggle_parent_off_revokes_every_descendant() {
    let granted = blank_tree().toggled(&[capability::DASHBOARD]).unwrap();
    let revoked = granted.toggled(&[capability::DASHBOARD]).unwrap();

    assert_subtree(&revoked, capability::DASHBOARD, false);
    assert_eq!(revoked, blank_tree());
}

#[test]
fn test_toggle_off_is_never_gated() {
    // A stale tree can hold a granted child under an ungranted parent.
    let stale = saved_tree(json!([
        { "id": "finance", "label": "Finance", "checked": false, "children": [
            { "id": "finance-Export", "label": "Export", "checked": true }
        ]}
    ]));
    let merged = PermissionTree::merge(canonical_tree(), &stale);

    let cleared = merged
        .toggled(&[capability::FINANCE, capability::FINANCE_EXPORT])
        .unwrap();
    assert!(!cleared.has_capability(capability::FINANCE_EXPORT));
}

#[test]
fn test_title_nodes_are_transparent_to_ancestor_check() {
    let tree = blank_tree()
        .toggled(&[capability::PROJECTS])
        .unwrap()
        .toggled(&["projects", "projects-detail", "projects-budget"])
        .unwrap();
    assert!(!tree.has_capability("projects-budget"));

    let regranted = tree
        .toggled(&["projects", "projects-detail", "projects-budget"])
        .unwrap();
    assert!(regranted.has_capability(capability::PROJECTS_BUDGET_EXPORT));
}

#[test]
fn test_title_nodes_cannot_be_toggled() {
    let tree = blank_tree().toggled(&[capability::PROJECTS]).unwrap();
    assert_eq!(
        tree.toggled(&["projects", "projects-detail"]),
        Err(ToggleRejection::TitleNode {
            id: "projects-detail".to_string()
        })
    );
}

#[test]
fn test_toggle_unknown_or_empty_path() {
    let tree = blank_tree();
    let empty: [&str; 0] = [];
    assert_eq!(tree.toggled(&empty), Err(ToggleRejection::EmptyPath));
    assert!(matches!(
        tree.toggled(&["finance", "finance-forecast"]),
        Err(ToggleRejection::UnknownPath { .. })
    ));
    // Paths are walked from a root; a bare nested id is not found.
    assert!(matches!(
        tree.toggled(&[capability::FINANCE_EXPORT]),
        Err(ToggleRejection::UnknownPath { .. })
    ));
}

#[test]
fn test_toggle_never_mutates_the_input() {
    let tree = blank_tree();
    let _ = tree.toggled(&[capability::REPORTS]).unwrap();
    assert_eq!(tree, blank_tree());
}

// ============================================================================
// SELECT-ALL AND EVALUATION
// ============================================================================

#[test]
fn test_fully_selected_requires_every_non_title_node() {
    let all = canonical_tree().with_all(true);
    assert!(all.is_fully_selected());

    let one_missing = all
        .toggled(&["documents", "documents-delete"])
        .unwrap();
    assert!(!one_missing.is_fully_selected());

    // Title flags do not count towards selection.
    let mut titles_unchecked = all.clone();
    for node in &mut titles_unchecked.0 {
        if let Some(children) = node.children.as_mut() {
            for child in children.iter_mut().filter(|c| c.is_title) {
                child.checked = false;
            }
        }
    }
    assert!(titles_unchecked.is_fully_selected());
}

#[test]
fn test_select_all_round_trip() {
    let partial = blank_tree().toggled(&[capability::FINANCE]).unwrap();

    let all = partial.select_all_toggled();
    assert!(all.is_fully_selected());
    assert_eq!(all, canonical_tree().with_all(true));

    let none = all.select_all_toggled();
    assert!(none.granted_ids().is_empty());
    assert_eq!(none, blank_tree());
}

#[test]
fn test_select_all_from_unselected_then_repeat() {
    let once = blank_tree().select_all_toggled();
    let twice = once.select_all_toggled().select_all_toggled();
    assert_eq!(once, twice);
}

#[test]
fn test_evaluation_query() {
    let tree = blank_tree()
        .toggled(&[capability::SETTINGS])
        .unwrap()
        .toggled(&["settings", "settings-users"])
        .unwrap();

    assert!(tree.has_capability(capability::SETTINGS_ROLES_EDIT));
    assert!(!tree.has_capability(capability::SETTINGS_USERS_ASSIGN_ROLE));
    assert!(!tree.has_capability("no-such-capability"));
}

#[test]
fn test_json_shape_matches_dashboard_records() {
    let tree = blank_tree();
    let value = serde_json::to_value(&tree).unwrap();

    let dashboard = &value[0];
    assert_eq!(dashboard["id"], "dashboard");
    assert_eq!(dashboard["checked"], false);
    assert!(dashboard.get("isTitle").is_none());
    assert_eq!(dashboard["children"][0]["isTitle"], true);

    let leaf = &value[0]["children"][1];
    assert_eq!(leaf["id"], "dashboard-summary");
    assert!(leaf.get("children").is_none());
}
