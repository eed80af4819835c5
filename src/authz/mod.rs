//! Access-control resolution engine
//!
//! Pure decision functions over a user's [`PermissionSnapshot`]:
//! - permission checks with a hierarchical `.view` fallback
//! - URL path gating against the static route-to-permission table
//! - an admin-only path tier satisfied solely by the system-admin flag
//! - navigation tree filtering and the route-derived permission catalog
//!
//! Everything here is synchronous and side-effect free except
//! [`load_snapshot`], which assembles a snapshot from the database. Callers
//! are expected to cache the snapshot per session, not per check.

mod nav;
mod resolver;
mod route_map;
mod snapshot;

pub use nav::{default_nav, filter_nav_items, NavItem};
pub use resolver::{can_access_path, has_permission, is_leaf_permission_code};
pub use route_map::{
    derive_permission_catalog, is_admin_only_path, resolve_required_permission,
};
pub use snapshot::{load_snapshot, PermissionSnapshot};

/// Well-known permission codes
pub mod codes {
    /// The one top-level code that counts as a leaf despite having only two
    /// segments.
    pub const DASHBOARD_VIEW: &str = "dashboard.view";

    pub const QUOTATIONS_VIEW: &str = "sales.quotations.view";
    pub const QUOTATIONS_CREATE: &str = "sales.quotations.create";
    pub const ORDERS_VIEW: &str = "sales.orders.view";
    pub const ORDERS_CREATE: &str = "sales.orders.create";

    /// Coarse module-level view grant; satisfies every `sales.*.view` check
    /// through the hierarchical fallback.
    pub const SALES_VIEW: &str = "sales.view";
}
