use std::sync::OnceLock;

use regex::Regex;

use super::resolver::is_leaf_permission_code;

/// Ordered route-to-permission table.
///
/// Matching is first-match-wins, so entries are listed most-specific-first
/// within each section (`/x/new` and `/x/:id/edit` before `/x/:id` before
/// `/x`). The ordering is load-bearing; `table_orders_specific_before_general`
/// below pins it.
const ROUTE_PERMISSION_PATTERNS: &[(&str, &str)] = &[
    (r"^/dashboard$", "dashboard.view"),
    // Quotations
    (r"^/sales/quotations/new$", "sales.quotations.create"),
    (r"^/sales/quotations/[^/]+/edit$", "sales.quotations.edit"),
    (r"^/sales/quotations/[^/]+/revisions$", "sales.quotations.view"),
    (r"^/sales/quotations/[^/]+$", "sales.quotations.view"),
    (r"^/sales/quotations$", "sales.quotations.view"),
    // Orders
    (r"^/sales/orders/new$", "sales.orders.create"),
    (r"^/sales/orders/[^/]+/edit$", "sales.orders.edit"),
    (r"^/sales/orders/[^/]+$", "sales.orders.view"),
    (r"^/sales/orders$", "sales.orders.view"),
    // Customers
    (r"^/sales/customers/new$", "sales.customers.create"),
    (r"^/sales/customers/[^/]+/edit$", "sales.customers.edit"),
    (r"^/sales/customers/[^/]+$", "sales.customers.view"),
    (r"^/sales/customers$", "sales.customers.view"),
    // Product catalog
    (r"^/catalog/products/new$", "catalog.products.create"),
    (r"^/catalog/products/[^/]+/edit$", "catalog.products.edit"),
    (r"^/catalog/products/[^/]+$", "catalog.products.view"),
    (r"^/catalog/products$", "catalog.products.view"),
    // Reports
    (r"^/reports/sales$", "reports.sales.view"),
    (r"^/reports/quotations$", "reports.quotations.view"),
    (r"^/reports$", "reports.overview.view"),
];

/// Paths gated on the literal system-admin flag. Checked strictly before the
/// permission table: no granted code opens these sections.
const ADMIN_ONLY_PATTERNS: &[&str] = &[
    r"^/access-control(/|$)",
    r"^/user-management(/|$)",
    r"^/users/mail-settings(/|$)",
];

fn route_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        ROUTE_PERMISSION_PATTERNS
            .iter()
            .map(|(pattern, code)| {
                let re = Regex::new(pattern).expect("static route pattern must compile");
                (re, *code)
            })
            .collect()
    })
}

fn admin_only_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        ADMIN_ONLY_PATTERNS
            .iter()
            .map(|pattern| Regex::new(pattern).expect("static admin pattern must compile"))
            .collect()
    })
}

/// Required permission code for a path, or `None` when the path carries no
/// permission requirement at all (open to any authenticated user).
pub fn resolve_required_permission(pathname: &str) -> Option<&'static str> {
    route_patterns()
        .iter()
        .find(|(re, _)| re.is_match(pathname))
        .map(|(_, code)| *code)
}

pub fn is_admin_only_path(pathname: &str) -> bool {
    admin_only_patterns().iter().any(|re| re.is_match(pathname))
}

/// Unique, sorted leaf codes referenced by the route table. Drives the
/// permission-picker UI and the sync-from-routes upsert.
pub fn derive_permission_catalog() -> Vec<&'static str> {
    let mut catalog: Vec<&'static str> = ROUTE_PERMISSION_PATTERNS
        .iter()
        .map(|(_, code)| *code)
        .filter(|code| is_leaf_permission_code(code))
        .collect();
    catalog.sort_unstable();
    catalog.dedup();
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_static_patterns_compile() {
        assert!(!route_patterns().is_empty());
        assert!(!admin_only_patterns().is_empty());
    }

    #[test]
    fn table_orders_specific_before_general() {
        // First match must be the specific action, not the broader detail or
        // list entry that would also match.
        assert_eq!(
            resolve_required_permission("/sales/quotations/42/edit"),
            Some("sales.quotations.edit")
        );
        assert_eq!(
            resolve_required_permission("/sales/quotations/new"),
            Some("sales.quotations.create")
        );
        assert_eq!(
            resolve_required_permission("/sales/quotations/42"),
            Some("sales.quotations.view")
        );
        assert_eq!(
            resolve_required_permission("/sales/quotations"),
            Some("sales.quotations.view")
        );
        assert_eq!(
            resolve_required_permission("/sales/orders/7/edit"),
            Some("sales.orders.edit")
        );
    }

    #[test]
    fn unmatched_path_requires_nothing() {
        assert_eq!(resolve_required_permission("/some/unlisted/path"), None);
        assert_eq!(resolve_required_permission("/"), None);
    }

    #[test]
    fn admin_only_sections_match_whole_subtree() {
        assert!(is_admin_only_path("/access-control"));
        assert!(is_admin_only_path("/access-control/permission-definitions"));
        assert!(is_admin_only_path("/user-management/users/123"));
        assert!(is_admin_only_path("/users/mail-settings"));
        assert!(!is_admin_only_path("/access-controls"));
        assert!(!is_admin_only_path("/users"));
        assert!(!is_admin_only_path("/sales/orders"));
    }

    #[test]
    fn catalog_is_sorted_unique_leaf_only() {
        let catalog = derive_permission_catalog();
        let again = derive_permission_catalog();
        assert_eq!(catalog, again);

        let mut sorted = catalog.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(catalog, sorted);

        for code in &catalog {
            assert!(is_leaf_permission_code(code), "non-leaf code in catalog: {code}");
            assert_ne!(*code, "admin-only");
        }
        assert!(catalog.contains(&"sales.quotations.view"));
        assert!(catalog.contains(&"dashboard.view"));
    }
}
