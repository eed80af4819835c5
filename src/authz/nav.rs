use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::resolver::can_access_path;
use super::snapshot::PermissionSnapshot;

/// One entry of the navigation menu. A leaf carries an `href`; a branch
/// carries children and is only shown while at least one child survives
/// filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NavItem {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavItem>,
}

impl NavItem {
    pub fn leaf(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: Some(href.into()),
            children: Vec::new(),
        }
    }

    pub fn branch(label: impl Into<String>, children: Vec<NavItem>) -> Self {
        Self {
            label: label.into(),
            href: None,
            children,
        }
    }
}

/// Filter a navigation tree down to the entries the snapshot may open.
///
/// Leaves are kept iff their `href` passes [`can_access_path`]. Branches are
/// kept iff any child survives; emptied branches are dropped outright rather
/// than rendered hollow. Items with neither `href` nor children are dropped.
/// A missing snapshot yields an empty menu.
pub fn filter_nav_items(
    items: &[NavItem],
    snapshot: Option<&PermissionSnapshot>,
) -> Vec<NavItem> {
    let Some(snapshot) = snapshot else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            if !item.children.is_empty() {
                let kept = filter_nav_items(&item.children, Some(snapshot));
                if kept.is_empty() {
                    return None;
                }
                return Some(NavItem {
                    children: kept,
                    ..item.clone()
                });
            }

            match &item.href {
                Some(href) if can_access_path(Some(snapshot), href) => Some(item.clone()),
                _ => None,
            }
        })
        .collect()
}

/// The application menu, in display order. Admin sections route through the
/// admin-only tier and disappear for everyone but system administrators.
pub fn default_nav() -> Vec<NavItem> {
    vec![
        NavItem::leaf("Dashboard", "/dashboard"),
        NavItem::branch(
            "Sales",
            vec![
                NavItem::leaf("Quotations", "/sales/quotations"),
                NavItem::leaf("Orders", "/sales/orders"),
                NavItem::leaf("Customers", "/sales/customers"),
            ],
        ),
        NavItem::branch(
            "Catalog",
            vec![NavItem::leaf("Products", "/catalog/products")],
        ),
        NavItem::branch(
            "Reports",
            vec![
                NavItem::leaf("Overview", "/reports"),
                NavItem::leaf("Sales report", "/reports/sales"),
                NavItem::leaf("Quotation report", "/reports/quotations"),
            ],
        ),
        NavItem::branch(
            "Administration",
            vec![
                NavItem::leaf("Permission definitions", "/access-control/permission-definitions"),
                NavItem::leaf("Permission groups", "/access-control/permission-groups"),
                NavItem::leaf("User management", "/user-management"),
                NavItem::leaf("Mail settings", "/users/mail-settings"),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn snapshot_with(codes: &[&str]) -> PermissionSnapshot {
        PermissionSnapshot::new(Uuid::new_v4())
            .with_codes(codes.iter().map(|code| code.to_string()))
    }

    #[test]
    fn missing_snapshot_yields_empty_menu() {
        assert!(filter_nav_items(&default_nav(), None).is_empty());
    }

    #[test]
    fn denied_branch_is_dropped_not_emptied() {
        let snapshot = snapshot_with(&["dashboard.view"]);
        let filtered = filter_nav_items(&default_nav(), Some(&snapshot));

        let labels: Vec<&str> = filtered.iter().map(|item| item.label.as_str()).collect();
        assert!(labels.contains(&"Dashboard"));
        assert!(!labels.contains(&"Sales"));
        assert!(!labels.contains(&"Administration"));
        for item in &filtered {
            assert!(item.href.is_some() || !item.children.is_empty());
        }
    }

    #[test]
    fn branch_keeps_only_allowed_children() {
        let snapshot = snapshot_with(&["sales.orders.view"]);
        let filtered = filter_nav_items(&default_nav(), Some(&snapshot));

        let sales = filtered
            .iter()
            .find(|item| item.label == "Sales")
            .expect("sales branch should survive");
        let children: Vec<&str> = sales.children.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(children, vec!["Orders"]);
    }

    #[test]
    fn module_view_grant_opens_whole_section() {
        let snapshot = snapshot_with(&["sales.view"]);
        let filtered = filter_nav_items(&default_nav(), Some(&snapshot));

        let sales = filtered
            .iter()
            .find(|item| item.label == "Sales")
            .expect("sales branch should survive");
        assert_eq!(sales.children.len(), 3);
    }

    #[test]
    fn admin_sections_require_the_flag() {
        let grant_everything = snapshot_with(&[
            "access-control.permission-definitions.view",
            "access-control.permission-groups.view",
        ]);
        let filtered = filter_nav_items(&default_nav(), Some(&grant_everything));
        assert!(!filtered.iter().any(|item| item.label == "Administration"));

        let admin = PermissionSnapshot::new(Uuid::new_v4()).with_system_admin(true);
        let filtered = filter_nav_items(&default_nav(), Some(&admin));
        let administration = filtered
            .iter()
            .find(|item| item.label == "Administration")
            .expect("admin sees administration");
        assert_eq!(administration.children.len(), 4);
    }

    #[test]
    fn item_without_href_or_children_is_dropped() {
        let items = vec![NavItem {
            label: "Spacer".to_string(),
            href: None,
            children: Vec::new(),
        }];
        let snapshot = snapshot_with(&[]);
        assert!(filter_nav_items(&items, Some(&snapshot)).is_empty());
    }
}
