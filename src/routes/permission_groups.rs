//! Permission group admin API.
//!
//! Groups bundle leaf permission definitions; users get the union of member
//! codes across their active groups. All endpoints require the system-admin
//! flag and log mutations at Critical severity.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AdminUser;
use crate::models::group::*;
use crate::models::permission::{DbPermissionDefinition, PermissionDefinition};
use crate::routes::permission_definitions::{ensure_assignable, fetch_definition};
use crate::utils::utc_now;

const SELECT_GROUP: &str =
    "SELECT id, name, is_system_admin, is_active, created_at, updated_at FROM permission_groups";

// =============================================================================
// GROUP ENDPOINTS
// =============================================================================

/// List all permission groups
#[utoipa::path(
    get,
    path = "/access-control/permission-groups",
    tag = "Access control",
    responses(
        (status = 200, description = "List of permission groups", body = Vec<PermissionGroup>),
        (status = 403, description = "Caller is not a system administrator"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_groups(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<PermissionGroup>>> {
    let rows = sqlx::query_as::<_, DbPermissionGroup>(&format!("{SELECT_GROUP} ORDER BY name"))
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(rows.into_iter().map(PermissionGroup::from).collect()))
}

/// Create a permission group
#[utoipa::path(
    post,
    path = "/access-control/permission-groups",
    tag = "Access control",
    request_body = PermissionGroupCreateRequest,
    responses(
        (status = 201, description = "Group created", body = PermissionGroup),
        (status = 409, description = "Group name already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_group(
    State(state): State<AppState>,
    admin: AdminUser,
    headers: HeaderMap,
    Json(req): Json<PermissionGroupCreateRequest>,
) -> AppResult<(StatusCode, Json<PermissionGroup>)> {
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("group name must not be empty"));
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM permission_groups WHERE name = ?")
        .bind(&req.name)
        .fetch_one(&state.pool)
        .await?;
    if count > 0 {
        return Err(AppError::conflict("group name already exists"));
    }

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO permission_groups (id, name, is_system_admin, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&req.name)
    .bind(req.is_system_admin)
    .bind(req.is_active)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let group = PermissionGroup {
        id,
        name: req.name,
        is_system_admin: req.is_system_admin,
        is_active: req.is_active,
        created_at: now,
        updated_at: now,
    };

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(admin.user_id),
        &group,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(group)))
}

/// Get a permission group by ID
#[utoipa::path(
    get,
    path = "/access-control/permission-groups/{group_id}",
    tag = "Access control",
    params(("group_id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group detail", body = PermissionGroup),
        (status = 404, description = "Group not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_group(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(group_id): Path<Uuid>,
) -> AppResult<Json<PermissionGroup>> {
    let group = fetch_group(&state, group_id).await?;
    Ok(Json(group.into()))
}

/// Update a permission group
#[utoipa::path(
    put,
    path = "/access-control/permission-groups/{group_id}",
    tag = "Access control",
    params(("group_id" = Uuid, Path, description = "Group ID")),
    request_body = PermissionGroupUpdateRequest,
    responses(
        (status = 200, description = "Group updated", body = PermissionGroup),
        (status = 404, description = "Group not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_group(
    State(state): State<AppState>,
    admin: AdminUser,
    headers: HeaderMap,
    Path(group_id): Path<Uuid>,
    Json(req): Json<PermissionGroupUpdateRequest>,
) -> AppResult<Json<PermissionGroup>> {
    let existing = fetch_group(&state, group_id).await?;
    let previous = PermissionGroup::from(existing.clone());

    let name = req.name.unwrap_or(existing.name);
    let is_system_admin = req.is_system_admin.unwrap_or(existing.is_system_admin);
    let is_active = req.is_active.unwrap_or(existing.is_active);
    let now = utc_now();

    sqlx::query(
        "UPDATE permission_groups SET name = ?, is_system_admin = ?, is_active = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(is_system_admin)
    .bind(is_active)
    .bind(now)
    .bind(group_id)
    .execute(&state.pool)
    .await?;

    let group = PermissionGroup {
        id: existing.id,
        name,
        is_system_admin,
        is_active,
        created_at: existing.created_at,
        updated_at: now,
    };

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(admin.user_id),
        &group,
        Some(&previous),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(group))
}

/// Delete a permission group and its assignments
#[utoipa::path(
    delete,
    path = "/access-control/permission-groups/{group_id}",
    tag = "Access control",
    params(("group_id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 204, description = "Group deleted"),
        (status = 404, description = "Group not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_group(
    State(state): State<AppState>,
    admin: AdminUser,
    headers: HeaderMap,
    Path(group_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let existing = fetch_group(&state, group_id).await?;

    sqlx::query("DELETE FROM permission_groups WHERE id = ?")
        .bind(group_id)
        .execute(&state.pool)
        .await?;

    let group = PermissionGroup::from(existing);
    log_activity_with_context(
        &state.event_bus,
        "deleted",
        Some(admin.user_id),
        &group,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// GROUP MEMBERSHIP
// =============================================================================

/// List permission definitions assigned to a group
#[utoipa::path(
    get,
    path = "/access-control/permission-groups/{group_id}/permissions",
    tag = "Access control",
    params(("group_id" = Uuid, Path, description = "Group ID")),
    responses((status = 200, description = "Assigned definitions", body = Vec<PermissionDefinition>)),
    security(("bearerAuth" = []))
)]
pub async fn get_group_permissions(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(group_id): Path<Uuid>,
) -> AppResult<Json<Vec<PermissionDefinition>>> {
    let rows = sqlx::query_as::<_, DbPermissionDefinition>(
        r#"
        SELECT pd.id, pd.code, pd.name, pd.description, pd.is_active, pd.created_at, pd.updated_at, pd.deleted_at
        FROM permission_definitions pd
        INNER JOIN group_permissions gp ON pd.id = gp.permission_definition_id
        WHERE gp.group_id = ?
        ORDER BY pd.code
        "#,
    )
    .bind(group_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.into_iter().map(PermissionDefinition::from).collect()))
}

/// Assign a permission definition to a group. Only active leaf codes qualify.
#[utoipa::path(
    post,
    path = "/access-control/permission-groups/{group_id}/permissions",
    tag = "Access control",
    params(("group_id" = Uuid, Path, description = "Group ID")),
    request_body = AssignPermissionToGroupRequest,
    responses(
        (status = 201, description = "Permission assigned"),
        (status = 400, description = "Code is not an assignable leaf"),
        (status = 404, description = "Group or definition not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_permission_to_group(
    State(state): State<AppState>,
    admin: AdminUser,
    headers: HeaderMap,
    Path(group_id): Path<Uuid>,
    Json(req): Json<AssignPermissionToGroupRequest>,
) -> AppResult<StatusCode> {
    fetch_group(&state, group_id).await?;
    let definition = fetch_definition(&state, req.permission_definition_id).await?;

    if definition.deleted_at.is_some() {
        return Err(AppError::bad_request(
            "cannot assign a soft-deleted permission definition",
        ));
    }
    ensure_assignable(&definition.code)?;

    let now = utc_now();
    sqlx::query(
        "INSERT OR IGNORE INTO group_permissions (group_id, permission_definition_id, created_at) VALUES (?, ?, ?)",
    )
    .bind(group_id)
    .bind(req.permission_definition_id)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let assignment = GroupPermission {
        group_id,
        permission_definition_id: req.permission_definition_id,
        created_at: now,
    };

    log_activity_with_context(
        &state.event_bus,
        "assigned",
        Some(admin.user_id),
        &assignment,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::CREATED)
}

/// Remove a permission definition from a group
#[utoipa::path(
    delete,
    path = "/access-control/permission-groups/{group_id}/permissions/{definition_id}",
    tag = "Access control",
    params(
        ("group_id" = Uuid, Path, description = "Group ID"),
        ("definition_id" = Uuid, Path, description = "Permission definition ID"),
    ),
    responses((status = 204, description = "Permission removed from group")),
    security(("bearerAuth" = []))
)]
pub async fn remove_permission_from_group(
    State(state): State<AppState>,
    admin: AdminUser,
    headers: HeaderMap,
    Path((group_id, definition_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    sqlx::query(
        "DELETE FROM group_permissions WHERE group_id = ? AND permission_definition_id = ?",
    )
    .bind(group_id)
    .bind(definition_id)
    .execute(&state.pool)
    .await?;

    let assignment = GroupPermission {
        group_id,
        permission_definition_id: definition_id,
        created_at: utc_now(),
    };

    log_activity_with_context(
        &state.event_bus,
        "revoked",
        Some(admin.user_id),
        &assignment,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// USER-GROUP ASSIGNMENT
// =============================================================================

/// List groups assigned to a user
#[utoipa::path(
    get,
    path = "/access-control/users/{user_id}/groups",
    tag = "Access control",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses((status = 200, description = "Assigned groups", body = Vec<PermissionGroup>)),
    security(("bearerAuth" = []))
)]
pub async fn get_user_groups(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<PermissionGroup>>> {
    let rows = sqlx::query_as::<_, DbPermissionGroup>(
        r#"
        SELECT g.id, g.name, g.is_system_admin, g.is_active, g.created_at, g.updated_at
        FROM permission_groups g
        INNER JOIN user_groups ug ON g.id = ug.group_id
        WHERE ug.user_id = ?
        ORDER BY g.name
        "#,
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.into_iter().map(PermissionGroup::from).collect()))
}

/// Assign a group to a user
#[utoipa::path(
    post,
    path = "/access-control/users/{user_id}/groups",
    tag = "Access control",
    params(("user_id" = Uuid, Path, description = "User ID")),
    request_body = AssignGroupRequest,
    responses(
        (status = 201, description = "Group assigned"),
        (status = 404, description = "Group not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_group_to_user(
    State(state): State<AppState>,
    admin: AdminUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AssignGroupRequest>,
) -> AppResult<StatusCode> {
    fetch_group(&state, req.group_id).await?;

    let now = utc_now();
    sqlx::query("INSERT OR IGNORE INTO user_groups (user_id, group_id, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(req.group_id)
        .bind(now)
        .execute(&state.pool)
        .await?;

    let assignment = UserGroup {
        user_id,
        group_id: req.group_id,
        created_at: now,
    };

    log_activity_with_context(
        &state.event_bus,
        "assigned",
        Some(admin.user_id),
        &assignment,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::CREATED)
}

/// Remove a user from a group
#[utoipa::path(
    delete,
    path = "/access-control/users/{user_id}/groups/{group_id}",
    tag = "Access control",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
        ("group_id" = Uuid, Path, description = "Group ID"),
    ),
    responses((status = 204, description = "Group revoked")),
    security(("bearerAuth" = []))
)]
pub async fn revoke_group_from_user(
    State(state): State<AppState>,
    admin: AdminUser,
    headers: HeaderMap,
    Path((user_id, group_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    sqlx::query("DELETE FROM user_groups WHERE user_id = ? AND group_id = ?")
        .bind(user_id)
        .bind(group_id)
        .execute(&state.pool)
        .await?;

    let assignment = UserGroup {
        user_id,
        group_id,
        created_at: utc_now(),
    };

    log_activity_with_context(
        &state.event_bus,
        "revoked",
        Some(admin.user_id),
        &assignment,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_group(state: &AppState, group_id: Uuid) -> AppResult<DbPermissionGroup> {
    sqlx::query_as::<_, DbPermissionGroup>(&format!("{SELECT_GROUP} WHERE id = ?"))
        .bind(group_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("permission group not found"))
}
