use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

// =============================================================================
// PERMISSION DEFINITION
// =============================================================================

/// Admin-managed catalog entry behind one permission code. The code is stable
/// and immutable after creation; only the display fields and the active flag
/// may change.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionDefinition {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Loggable for PermissionDefinition {
    fn entity_type() -> &'static str { "permission_definition" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPermissionDefinition {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<DbPermissionDefinition> for PermissionDefinition {
    fn from(db: DbPermissionDefinition) -> Self {
        PermissionDefinition {
            id: db.id,
            code: db.code,
            name: db.name,
            description: db.description,
            is_active: db.is_active,
            created_at: db.created_at,
            updated_at: db.updated_at,
            deleted_at: db.deleted_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionDefinitionCreateRequest {
    #[schema(example = "sales.orders.view")]
    pub code: String,
    #[schema(example = "View sales orders")]
    pub name: String,
    #[schema(example = "Open the order list and order detail pages")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionDefinitionUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

fn default_true() -> bool {
    true
}

// =============================================================================
// SYNC FROM ROUTES
// =============================================================================

/// One catalog entry in a sync request. Missing `name` defaults to the code.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SyncPermissionItem {
    #[schema(example = "sales.orders.view")]
    pub code: String,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Declarative upsert of the route-derived catalog. Each flag independently
/// opts one kind of change in; with all flags off the sync only creates
/// missing definitions.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SyncPermissionsRequest {
    pub items: Vec<SyncPermissionItem>,
    #[serde(default)]
    pub reactivate_soft_deleted: bool,
    #[serde(default)]
    pub update_existing_names: bool,
    #[serde(default)]
    pub update_existing_descriptions: bool,
    #[serde(default)]
    pub update_existing_is_active: bool,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct SyncPermissionsResponse {
    pub created: u32,
    pub updated: u32,
    pub reactivated: u32,
    pub total_processed: u32,
}
