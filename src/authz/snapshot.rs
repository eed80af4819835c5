use std::collections::HashSet;

use serde::Serialize;
use sqlx::{Row, SqlitePool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppResult;

/// Flattened permission state for one authenticated user.
///
/// Computed server-side as the union of member codes across the user's active
/// groups; `is_system_admin` is true iff any active assigned group carries the
/// flag. The resolver functions take this by reference and never read ambient
/// state, so a snapshot fetched once per session can be checked any number of
/// times with consistent results.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PermissionSnapshot {
    pub user_id: Uuid,
    pub is_system_admin: bool,
    pub permission_codes: HashSet<String>,
    /// Names of the user's active groups. Informational only; the resolver
    /// never consults them.
    pub permission_groups: Vec<String>,
}

impl PermissionSnapshot {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_system_admin: false,
            permission_codes: HashSet::new(),
            permission_groups: Vec::new(),
        }
    }

    pub fn with_system_admin(mut self, is_system_admin: bool) -> Self {
        self.is_system_admin = is_system_admin;
        self
    }

    pub fn with_codes(mut self, codes: impl IntoIterator<Item = String>) -> Self {
        self.permission_codes = codes.into_iter().collect();
        self
    }

    pub fn with_groups(mut self, groups: impl IntoIterator<Item = String>) -> Self {
        self.permission_groups = groups.into_iter().collect();
        self
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.permission_codes.contains(code)
    }
}

/// Assemble the caller's snapshot from group membership.
///
/// Inactive groups contribute nothing. Soft-deleted or inactive permission
/// definitions are excluded from the union even when still linked to a group.
pub async fn load_snapshot(pool: &SqlitePool, user_id: Uuid) -> AppResult<PermissionSnapshot> {
    let group_rows = sqlx::query(
        r#"
        SELECT g.name, g.is_system_admin
        FROM permission_groups g
        INNER JOIN user_groups ug ON g.id = ug.group_id
        WHERE ug.user_id = ? AND g.is_active = 1
        ORDER BY g.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let is_system_admin = group_rows
        .iter()
        .any(|row| row.get::<bool, _>("is_system_admin"));
    let permission_groups: Vec<String> = group_rows.iter().map(|row| row.get("name")).collect();

    let code_rows = sqlx::query(
        r#"
        SELECT DISTINCT pd.code
        FROM permission_definitions pd
        INNER JOIN group_permissions gp ON pd.id = gp.permission_definition_id
        INNER JOIN permission_groups g ON g.id = gp.group_id
        INNER JOIN user_groups ug ON ug.group_id = g.id
        WHERE ug.user_id = ?
          AND g.is_active = 1
          AND pd.is_active = 1
          AND pd.deleted_at IS NULL
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let permission_codes: HashSet<String> =
        code_rows.iter().map(|row| row.get("code")).collect();

    Ok(PermissionSnapshot {
        user_id,
        is_system_admin,
        permission_codes,
        permission_groups,
    })
}
