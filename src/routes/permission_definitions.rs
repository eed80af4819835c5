//! Permission definition admin API.
//!
//! The catalog of assignable permission codes: CRUD plus the declarative
//! "sync from routes" upsert that reconciles the static route table against
//! stored definitions. Every endpoint requires the system-admin flag; all
//! mutations land in the activity log with Critical severity.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{derive_permission_catalog, is_leaf_permission_code};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AdminUser;
use crate::models::permission::*;
use crate::utils::utc_now;

const SELECT_DEFINITION: &str =
    "SELECT id, code, name, description, is_active, created_at, updated_at, deleted_at FROM permission_definitions";

/// List all permission definitions, soft-deleted ones included
#[utoipa::path(
    get,
    path = "/access-control/permission-definitions",
    tag = "Access control",
    responses(
        (status = 200, description = "List of permission definitions", body = Vec<PermissionDefinition>),
        (status = 403, description = "Caller is not a system administrator"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_definitions(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<PermissionDefinition>>> {
    let rows = sqlx::query_as::<_, DbPermissionDefinition>(&format!(
        "{SELECT_DEFINITION} ORDER BY code"
    ))
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.into_iter().map(PermissionDefinition::from).collect()))
}

/// Create a permission definition
#[utoipa::path(
    post,
    path = "/access-control/permission-definitions",
    tag = "Access control",
    request_body = PermissionDefinitionCreateRequest,
    responses(
        (status = 201, description = "Definition created", body = PermissionDefinition),
        (status = 409, description = "Code already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_definition(
    State(state): State<AppState>,
    admin: AdminUser,
    headers: HeaderMap,
    Json(req): Json<PermissionDefinitionCreateRequest>,
) -> AppResult<(StatusCode, Json<PermissionDefinition>)> {
    if req.code.trim().is_empty() {
        return Err(AppError::bad_request("permission code must not be empty"));
    }

    ensure_code_available(&state, &req.code).await?;

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO permission_definitions (id, code, name, description, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&req.code)
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.is_active)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let definition = PermissionDefinition {
        id,
        code: req.code,
        name: req.name,
        description: req.description,
        is_active: req.is_active,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(admin.user_id),
        &definition,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(definition)))
}

/// Get a permission definition by ID
#[utoipa::path(
    get,
    path = "/access-control/permission-definitions/{definition_id}",
    tag = "Access control",
    params(("definition_id" = Uuid, Path, description = "Permission definition ID")),
    responses(
        (status = 200, description = "Definition detail", body = PermissionDefinition),
        (status = 404, description = "Definition not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_definition(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(definition_id): Path<Uuid>,
) -> AppResult<Json<PermissionDefinition>> {
    let definition = fetch_definition(&state, definition_id).await?;
    Ok(Json(definition.into()))
}

/// Update display fields of a permission definition. The code is immutable.
#[utoipa::path(
    put,
    path = "/access-control/permission-definitions/{definition_id}",
    tag = "Access control",
    params(("definition_id" = Uuid, Path, description = "Permission definition ID")),
    request_body = PermissionDefinitionUpdateRequest,
    responses(
        (status = 200, description = "Definition updated", body = PermissionDefinition),
        (status = 404, description = "Definition not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_definition(
    State(state): State<AppState>,
    admin: AdminUser,
    headers: HeaderMap,
    Path(definition_id): Path<Uuid>,
    Json(req): Json<PermissionDefinitionUpdateRequest>,
) -> AppResult<Json<PermissionDefinition>> {
    let existing = fetch_definition(&state, definition_id).await?;
    let previous = PermissionDefinition::from(existing.clone());

    let name = req.name.unwrap_or(existing.name);
    let description = req.description.or(existing.description);
    let is_active = req.is_active.unwrap_or(existing.is_active);
    let now = utc_now();

    sqlx::query(
        "UPDATE permission_definitions SET name = ?, description = ?, is_active = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(&description)
    .bind(is_active)
    .bind(now)
    .bind(definition_id)
    .execute(&state.pool)
    .await?;

    let definition = PermissionDefinition {
        id: existing.id,
        code: existing.code,
        name,
        description,
        is_active,
        created_at: existing.created_at,
        updated_at: now,
        deleted_at: existing.deleted_at,
    };

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(admin.user_id),
        &definition,
        Some(&previous),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(definition))
}

/// Soft-delete a permission definition
#[utoipa::path(
    delete,
    path = "/access-control/permission-definitions/{definition_id}",
    tag = "Access control",
    params(("definition_id" = Uuid, Path, description = "Permission definition ID")),
    responses(
        (status = 204, description = "Definition soft-deleted"),
        (status = 404, description = "Definition not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_definition(
    State(state): State<AppState>,
    admin: AdminUser,
    headers: HeaderMap,
    Path(definition_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let existing = fetch_definition(&state, definition_id).await?;
    let now = utc_now();

    sqlx::query("UPDATE permission_definitions SET deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(definition_id)
        .execute(&state.pool)
        .await?;

    let mut definition = PermissionDefinition::from(existing);
    definition.deleted_at = Some(now);

    log_activity_with_context(
        &state.event_bus,
        "deleted",
        Some(admin.user_id),
        &definition,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Leaf permission codes derived from the static route table. This is the
/// payload an admin feeds back into the sync endpoint.
#[utoipa::path(
    get,
    path = "/access-control/route-catalog",
    tag = "Access control",
    responses((status = 200, description = "Sorted unique leaf codes", body = Vec<String>)),
    security(("bearerAuth" = []))
)]
pub async fn route_catalog(_admin: AdminUser) -> AppResult<Json<Vec<&'static str>>> {
    Ok(Json(derive_permission_catalog()))
}

/// Reconcile a catalog of codes against stored definitions
#[utoipa::path(
    post,
    path = "/access-control/permission-definitions/sync",
    tag = "Access control",
    request_body = SyncPermissionsRequest,
    responses((status = 200, description = "Sync counts", body = SyncPermissionsResponse)),
    security(("bearerAuth" = []))
)]
pub async fn sync_definitions(
    State(state): State<AppState>,
    admin: AdminUser,
    headers: HeaderMap,
    Json(req): Json<SyncPermissionsRequest>,
) -> AppResult<Json<SyncPermissionsResponse>> {
    let mut response = SyncPermissionsResponse::default();
    let context = RequestContext::from_headers(&headers);

    for item in &req.items {
        if item.code.trim().is_empty() {
            return Err(AppError::bad_request("sync item with empty code"));
        }

        response.total_processed += 1;

        let existing = sqlx::query_as::<_, DbPermissionDefinition>(&format!(
            "{SELECT_DEFINITION} WHERE code = ?"
        ))
        .bind(&item.code)
        .fetch_optional(&state.pool)
        .await?;

        let now = utc_now();

        let Some(existing) = existing else {
            let id = Uuid::new_v4();
            let name = item.name.clone().unwrap_or_else(|| item.code.clone());

            sqlx::query(
                "INSERT INTO permission_definitions (id, code, name, description, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(&item.code)
            .bind(&name)
            .bind(&item.description)
            .bind(item.is_active)
            .bind(now)
            .bind(now)
            .execute(&state.pool)
            .await?;

            response.created += 1;

            let definition = PermissionDefinition {
                id,
                code: item.code.clone(),
                name,
                description: item.description.clone(),
                is_active: item.is_active,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            log_activity_with_context(
                &state.event_bus,
                "created",
                Some(admin.user_id),
                &definition,
                None,
                Some(context.clone()),
            );
            continue;
        };

        let mut reactivate = false;
        if existing.deleted_at.is_some() && req.reactivate_soft_deleted {
            reactivate = true;
        }

        let mut name = None;
        if req.update_existing_names {
            if let Some(new_name) = &item.name {
                if *new_name != existing.name {
                    name = Some(new_name.clone());
                }
            }
        }

        let set_description =
            req.update_existing_descriptions && item.description != existing.description;

        let mut is_active = None;
        if req.update_existing_is_active && item.is_active != existing.is_active {
            is_active = Some(item.is_active);
        }

        let field_change = name.is_some() || set_description || is_active.is_some();
        if !reactivate && !field_change {
            continue;
        }

        sqlx::query(
            r#"
            UPDATE permission_definitions
            SET name = COALESCE(?, name),
                description = CASE WHEN ? THEN ? ELSE description END,
                is_active = COALESCE(?, is_active),
                deleted_at = CASE WHEN ? THEN NULL ELSE deleted_at END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&name)
        .bind(set_description)
        .bind(&item.description)
        .bind(is_active)
        .bind(reactivate)
        .bind(now)
        .bind(existing.id)
        .execute(&state.pool)
        .await?;

        if reactivate {
            response.reactivated += 1;
        }
        if field_change {
            response.updated += 1;
        }
    }

    tracing::info!(
        created = response.created,
        updated = response.updated,
        reactivated = response.reactivated,
        total = response.total_processed,
        "permission sync from routes completed"
    );

    Ok(Json(response))
}

async fn ensure_code_available(state: &AppState, code: &str) -> AppResult<()> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM permission_definitions WHERE code = ?")
            .bind(code)
            .fetch_one(&state.pool)
            .await?;

    if count > 0 {
        return Err(AppError::conflict("permission code already exists"));
    }

    Ok(())
}

pub(crate) async fn fetch_definition(
    state: &AppState,
    definition_id: Uuid,
) -> AppResult<DbPermissionDefinition> {
    sqlx::query_as::<_, DbPermissionDefinition>(&format!("{SELECT_DEFINITION} WHERE id = ?"))
        .bind(definition_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("permission definition not found"))
}

// Exposed for the group-membership handler: only leaf codes may be assigned.
pub(crate) fn ensure_assignable(code: &str) -> AppResult<()> {
    if !is_leaf_permission_code(code) {
        return Err(AppError::bad_request(
            "only leaf permission codes are assignable to groups",
        ));
    }
    Ok(())
}
