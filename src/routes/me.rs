//! Session-scoped permission surface.
//!
//! The front end fetches the flattened snapshot once per session and caches
//! it; these endpoints also expose the filtered navigation tree and a
//! single-path access probe so screens never re-implement the resolution
//! rules.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::{
    can_access_path, default_nav, filter_nav_items, load_snapshot, resolve_required_permission,
    NavItem, PermissionSnapshot,
};
use crate::errors::AppResult;
use crate::jwt::AuthUser;

#[utoipa::path(
    get,
    path = "/me/permissions",
    tag = "Me",
    responses((status = 200, description = "Flattened permission snapshot", body = PermissionSnapshot)),
    security(("bearerAuth" = []))
)]
pub async fn my_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<PermissionSnapshot>> {
    let snapshot = load_snapshot(&state.pool, auth.user_id).await?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    get,
    path = "/me/permissions/nav",
    tag = "Me",
    responses((status = 200, description = "Navigation filtered to reachable entries", body = Vec<NavItem>)),
    security(("bearerAuth" = []))
)]
pub async fn my_nav(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<NavItem>>> {
    let snapshot = load_snapshot(&state.pool, auth.user_id).await?;
    Ok(Json(filter_nav_items(&default_nav(), Some(&snapshot))))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckPathQuery {
    /// URL path to probe, e.g. `/sales/orders/42/edit`
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckPathResponse {
    pub path: String,
    pub allowed: bool,
    /// The code the path requires; absent for unguarded and admin-only paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_permission: Option<&'static str>,
}

#[utoipa::path(
    get,
    path = "/me/permissions/check",
    tag = "Me",
    params(("path" = String, Query, description = "URL path to check")),
    responses((status = 200, description = "Access decision for one path", body = CheckPathResponse)),
    security(("bearerAuth" = []))
)]
pub async fn check_path(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CheckPathQuery>,
) -> AppResult<Json<CheckPathResponse>> {
    let snapshot = load_snapshot(&state.pool, auth.user_id).await?;
    let allowed = can_access_path(Some(&snapshot), &query.path);
    let required_permission = resolve_required_permission(&query.path);

    Ok(Json(CheckPathResponse {
        path: query.path,
        allowed,
        required_permission,
    }))
}
