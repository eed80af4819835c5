use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

// =============================================================================
// PERMISSION GROUP
// =============================================================================

/// A named bundle of permission definitions assignable to users. A group with
/// `is_system_admin` grants blanket access independent of its member codes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionGroup {
    pub id: Uuid,
    pub name: String,
    pub is_system_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for PermissionGroup {
    fn entity_type() -> &'static str { "permission_group" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPermissionGroup {
    pub id: Uuid,
    pub name: String,
    pub is_system_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbPermissionGroup> for PermissionGroup {
    fn from(db: DbPermissionGroup) -> Self {
        PermissionGroup {
            id: db.id,
            name: db.name,
            is_system_admin: db.is_system_admin,
            is_active: db.is_active,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionGroupCreateRequest {
    #[schema(example = "Sales staff")]
    pub name: String,
    #[serde(default)]
    pub is_system_admin: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionGroupUpdateRequest {
    pub name: Option<String>,
    pub is_system_admin: Option<bool>,
    pub is_active: Option<bool>,
}

fn default_true() -> bool {
    true
}

// =============================================================================
// GROUP MEMBERSHIP
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupPermission {
    pub group_id: Uuid,
    pub permission_definition_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Loggable for GroupPermission {
    fn entity_type() -> &'static str { "group_permission" }
    fn subject_id(&self) -> Uuid { self.group_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPermissionToGroupRequest {
    pub permission_definition_id: Uuid,
}

// =============================================================================
// USER-GROUP ASSIGNMENT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserGroup {
    pub user_id: Uuid,
    pub group_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Loggable for UserGroup {
    fn entity_type() -> &'static str { "user_group" }
    fn subject_id(&self) -> Uuid { self.user_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignGroupRequest {
    pub group_id: Uuid,
}
