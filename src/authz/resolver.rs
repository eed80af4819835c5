use super::route_map::{is_admin_only_path, resolve_required_permission};
use super::snapshot::PermissionSnapshot;

/// Whether the snapshot satisfies a required permission code.
///
/// Resolution order:
/// 1. missing snapshot -> deny
/// 2. system admin -> allow
/// 3. verbatim code match -> allow
/// 4. hierarchical fallback: a `.view` leaf code (>= 3 segments) is satisfied
///    by the module-level `<first_segment>.view` grant
/// 5. deny
///
/// The fallback never fires for non-`.view` codes: a coarse module grant can
/// open every sub-page for reading but must not satisfy create/edit/delete
/// checks.
pub fn has_permission(snapshot: Option<&PermissionSnapshot>, required_code: &str) -> bool {
    let Some(snapshot) = snapshot else {
        return false;
    };

    if snapshot.is_system_admin {
        return true;
    }

    if snapshot.has_code(required_code) {
        return true;
    }

    let segments: Vec<&str> = required_code
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() >= 3 {
        if let [first, .., last] = segments.as_slice() {
            if *last == "view" {
                let module_fallback = format!("{first}.view");
                return snapshot.has_code(&module_fallback);
            }
        }
    }

    false
}

/// Whether the snapshot may open a URL path.
///
/// Admin-only sections are checked before the permission table and accept
/// only the literal system-admin flag. A path absent from both lists carries
/// no requirement and is open to any authenticated caller.
pub fn can_access_path(snapshot: Option<&PermissionSnapshot>, pathname: &str) -> bool {
    let Some(snapshot) = snapshot else {
        return false;
    };

    if is_admin_only_path(pathname) {
        return snapshot.is_system_admin;
    }

    match resolve_required_permission(pathname) {
        None => true,
        Some(required_code) => has_permission(Some(snapshot), required_code),
    }
}

/// A code is an actionable leaf iff it has at least three non-empty dot
/// segments, with `dashboard.view` as the single top-level exception. Only
/// leaf codes are assignable to groups.
pub fn is_leaf_permission_code(code: &str) -> bool {
    if code == super::codes::DASHBOARD_VIEW {
        return true;
    }

    code.split('.').filter(|segment| !segment.is_empty()).count() >= 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn snapshot_with(codes: &[&str]) -> PermissionSnapshot {
        PermissionSnapshot::new(Uuid::new_v4())
            .with_codes(codes.iter().map(|code| code.to_string()))
    }

    fn admin_snapshot() -> PermissionSnapshot {
        PermissionSnapshot::new(Uuid::new_v4()).with_system_admin(true)
    }

    #[test]
    fn missing_snapshot_denies_everything() {
        assert!(!has_permission(None, "sales.orders.view"));
        assert!(!can_access_path(None, "/sales/orders"));
        assert!(!can_access_path(None, "/some/unlisted/path"));
    }

    #[test]
    fn system_admin_short_circuits() {
        let admin = admin_snapshot();
        assert!(has_permission(Some(&admin), "sales.orders.delete"));
        assert!(has_permission(Some(&admin), "anything.at.all"));
        assert!(can_access_path(Some(&admin), "/sales/orders"));
        assert!(can_access_path(Some(&admin), "/access-control/permission-definitions"));
    }

    #[test]
    fn verbatim_code_match_allows() {
        use crate::authz::codes;

        let snapshot = snapshot_with(&[codes::ORDERS_VIEW]);
        assert!(has_permission(Some(&snapshot), codes::ORDERS_VIEW));
        assert!(!has_permission(Some(&snapshot), codes::ORDERS_CREATE));
        assert!(!has_permission(Some(&snapshot), codes::QUOTATIONS_VIEW));
    }

    #[test]
    fn module_view_fallback_covers_view_leaves_only() {
        use crate::authz::codes;

        let snapshot = snapshot_with(&[codes::SALES_VIEW]);
        assert!(has_permission(Some(&snapshot), codes::ORDERS_VIEW));
        assert!(has_permission(Some(&snapshot), codes::QUOTATIONS_VIEW));
        assert!(!has_permission(Some(&snapshot), codes::QUOTATIONS_CREATE));
        assert!(!has_permission(Some(&snapshot), "sales.orders.create"));
        assert!(!has_permission(Some(&snapshot), "sales.orders.delete"));
        // A grant in another module does not leak across.
        assert!(!has_permission(Some(&snapshot), "catalog.products.view"));
    }

    #[test]
    fn fallback_needs_three_segments() {
        // "sales.view" as the *required* code has two segments; the fallback
        // rule does not apply, only a verbatim grant satisfies it.
        let snapshot = snapshot_with(&["sales.orders.view"]);
        assert!(!has_permission(Some(&snapshot), "sales.view"));
    }

    #[test]
    fn malformed_codes_fail_closed() {
        let snapshot = snapshot_with(&["sales.view"]);
        assert!(!has_permission(Some(&snapshot), "sales"));
        assert!(!has_permission(Some(&snapshot), "..."));
        // Empty segments are discarded before counting.
        assert!(has_permission(Some(&snapshot), "sales..orders.view"));
    }

    #[test]
    fn admin_only_path_ignores_granted_codes() {
        let snapshot = snapshot_with(&["access-control.permission-definitions.view"]);
        assert!(!can_access_path(Some(&snapshot), "/access-control/permission-definitions"));
        assert!(!can_access_path(Some(&snapshot), "/user-management"));
        assert!(can_access_path(Some(&admin_snapshot()), "/user-management"));
    }

    #[test]
    fn unmapped_route_is_open() {
        let snapshot = snapshot_with(&[]);
        assert!(can_access_path(Some(&snapshot), "/some/unlisted/path"));
        assert!(!can_access_path(Some(&snapshot), "/sales/orders"));
    }

    #[test]
    fn guarded_route_delegates_to_permission_check() {
        let snapshot = snapshot_with(&["sales.orders.view"]);
        assert!(can_access_path(Some(&snapshot), "/sales/orders"));
        assert!(can_access_path(Some(&snapshot), "/sales/orders/42"));
        assert!(!can_access_path(Some(&snapshot), "/sales/orders/new"));
        assert!(!can_access_path(Some(&snapshot), "/sales/orders/42/edit"));
    }

    #[test]
    fn leaf_classification() {
        assert!(is_leaf_permission_code("dashboard.view"));
        assert!(is_leaf_permission_code("sales.orders.view"));
        assert!(is_leaf_permission_code("sales.orders.line-items.edit"));
        assert!(!is_leaf_permission_code("sales"));
        assert!(!is_leaf_permission_code("sales.view"));
        assert!(!is_leaf_permission_code(""));
        assert!(!is_leaf_permission_code("a..b"));
    }

    #[test]
    fn repeated_calls_are_consistent() {
        let snapshot = snapshot_with(&["sales.view"]);
        let first = can_access_path(Some(&snapshot), "/sales/quotations/9");
        let second = can_access_path(Some(&snapshot), "/sales/quotations/9");
        assert_eq!(first, second);
        assert!(first);
    }
}
