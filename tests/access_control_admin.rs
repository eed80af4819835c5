use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;
use uuid::Uuid;

use quotedesk::create_app;

async fn setup_app() -> Result<(Router, SqlitePool, TempDir)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test_access_control.db");

    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok((app, pool, dir))
}

async fn register(app: &Router, name: &str, email: &str) -> Result<(Uuid, String)> {
    let payload = json!({
        "name": name,
        "email": email,
        "password": "password123"
    });
    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))?;
    let resp: Response = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let v: Value = serde_json::from_slice(&bytes)?;
    let token = v["token"].as_str().context("token missing")?.to_string();
    let user_id = Uuid::parse_str(v["user"]["id"].as_str().context("user id missing")?)?;

    Ok((user_id, token))
}

/// Bootstrap a system-admin group directly; the first admin cannot be created
/// through the (admin-gated) API.
async fn promote_to_admin(pool: &SqlitePool, user_id: Uuid) -> Result<Uuid> {
    let group_id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO permission_groups (id, name, is_system_admin, is_active, created_at, updated_at) VALUES (?, ?, 1, 1, ?, ?)",
    )
    .bind(group_id)
    .bind(format!("admins-{group_id}"))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query("INSERT INTO user_groups (user_id, group_id, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(group_id)
        .bind(now)
        .execute(pool)
        .await?;

    Ok(group_id)
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    payload: Option<Value>,
) -> Result<Response> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"));
    let body = match payload {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    Ok(app.clone().oneshot(builder.body(body)?).await?)
}

#[tokio::test]
async fn non_admin_is_rejected_everywhere() -> Result<()> {
    let (app, pool, _dir) = setup_app().await?;
    let (user_id, token) = register(&app, "Plain User", "plain@example.com").await?;

    // Grant the user every access-control permission code through a normal
    // group; the admin tier must ignore granted codes.
    let now = Utc::now();
    let group_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO permission_groups (id, name, is_system_admin, is_active, created_at, updated_at) VALUES (?, 'ac-codes', 0, 1, ?, ?)",
    )
    .bind(group_id)
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await?;
    for code in [
        "access-control.permission-definitions.view",
        "access-control.permission-groups.view",
    ] {
        let def_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO permission_definitions (id, code, name, is_active, created_at, updated_at) VALUES (?, ?, ?, 1, ?, ?)",
        )
        .bind(def_id)
        .bind(code)
        .bind(code)
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await?;
        sqlx::query(
            "INSERT INTO group_permissions (group_id, permission_definition_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(group_id)
        .bind(def_id)
        .bind(now)
        .execute(&pool)
        .await?;
    }
    sqlx::query("INSERT INTO user_groups (user_id, group_id, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(group_id)
        .bind(now)
        .execute(&pool)
        .await?;

    for uri in [
        "/access-control/permission-definitions",
        "/access-control/permission-groups",
        "/access-control/route-catalog",
    ] {
        let resp = send_json(&app, "GET", uri, &token, None).await?;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{uri} should be admin-only");
    }

    let resp = send_json(
        &app,
        "POST",
        "/access-control/permission-definitions",
        &token,
        Some(json!({"code": "sales.orders.view", "name": "View orders"})),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn admin_can_manage_definitions() -> Result<()> {
    let (app, pool, _dir) = setup_app().await?;
    let (admin_id, token) = register(&app, "Admin", "admin@example.com").await?;
    promote_to_admin(&pool, admin_id).await?;

    // create
    let resp = send_json(
        &app,
        "POST",
        "/access-control/permission-definitions",
        &token,
        Some(json!({
            "code": "sales.orders.view",
            "name": "View orders",
            "description": "Order list and detail"
        })),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let created: Value = serde_json::from_slice(&bytes)?;
    let def_id = created["id"].as_str().context("id missing")?.to_string();

    // duplicate code conflicts
    let resp = send_json(
        &app,
        "POST",
        "/access-control/permission-definitions",
        &token,
        Some(json!({"code": "sales.orders.view", "name": "Again"})),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // update display fields; code stays
    let resp = send_json(
        &app,
        "PUT",
        &format!("/access-control/permission-definitions/{def_id}"),
        &token,
        Some(json!({"name": "View sales orders", "is_active": false})),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let updated: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(updated["code"], "sales.orders.view");
    assert_eq!(updated["name"], "View sales orders");
    assert_eq!(updated["is_active"], false);

    // soft delete keeps the row
    let resp = send_json(
        &app,
        "DELETE",
        &format!("/access-control/permission-definitions/{def_id}"),
        &token,
        None,
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send_json(&app, "GET", "/access-control/permission-definitions", &token, None).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let listed: Value = serde_json::from_slice(&bytes)?;
    let rows = listed.as_array().context("expected array")?;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].get("deleted_at").is_some(), "soft-deleted row should carry deleted_at");

    Ok(())
}

#[tokio::test]
async fn group_membership_accepts_only_leaf_codes() -> Result<()> {
    let (app, pool, _dir) = setup_app().await?;
    let (admin_id, token) = register(&app, "Admin", "admin2@example.com").await?;
    promote_to_admin(&pool, admin_id).await?;

    let resp = send_json(
        &app,
        "POST",
        "/access-control/permission-groups",
        &token,
        Some(json!({"name": "Sales staff"})),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let group: Value = serde_json::from_slice(&bytes)?;
    let group_id = group["id"].as_str().context("group id")?.to_string();
    assert_eq!(group["is_system_admin"], false);

    // a leaf definition and a module-level (non-leaf) one
    let mut def_ids = Vec::new();
    for code in ["sales.orders.view", "sales.view"] {
        let resp = send_json(
            &app,
            "POST",
            "/access-control/permission-definitions",
            &token,
            Some(json!({"code": code, "name": code})),
        )
        .await?;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let def: Value = serde_json::from_slice(&bytes)?;
        def_ids.push(def["id"].as_str().context("def id")?.to_string());
    }

    let resp = send_json(
        &app,
        "POST",
        &format!("/access-control/permission-groups/{group_id}/permissions"),
        &token,
        Some(json!({"permission_definition_id": def_ids[0]})),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send_json(
        &app,
        "POST",
        &format!("/access-control/permission-groups/{group_id}/permissions"),
        &token,
        Some(json!({"permission_definition_id": def_ids[1]})),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "non-leaf code must not be assignable");

    let resp = send_json(
        &app,
        "GET",
        &format!("/access-control/permission-groups/{group_id}/permissions"),
        &token,
        None,
    )
    .await?;
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let members: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(members.as_array().context("array")?.len(), 1);
    assert_eq!(members[0]["code"], "sales.orders.view");

    Ok(())
}

#[tokio::test]
async fn user_group_assignment_roundtrip() -> Result<()> {
    let (app, pool, _dir) = setup_app().await?;
    let (admin_id, token) = register(&app, "Admin", "admin3@example.com").await?;
    promote_to_admin(&pool, admin_id).await?;
    let (user_id, _) = register(&app, "Member", "member@example.com").await?;

    let resp = send_json(
        &app,
        "POST",
        "/access-control/permission-groups",
        &token,
        Some(json!({"name": "Back office"})),
    )
    .await?;
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let group: Value = serde_json::from_slice(&bytes)?;
    let group_id = group["id"].as_str().context("group id")?.to_string();

    let resp = send_json(
        &app,
        "POST",
        &format!("/access-control/users/{user_id}/groups"),
        &token,
        Some(json!({"group_id": group_id})),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send_json(
        &app,
        "GET",
        &format!("/access-control/users/{user_id}/groups"),
        &token,
        None,
    )
    .await?;
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let groups: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(groups.as_array().context("array")?.len(), 1);
    assert_eq!(groups[0]["name"], "Back office");

    let resp = send_json(
        &app,
        "DELETE",
        &format!("/access-control/users/{user_id}/groups/{group_id}"),
        &token,
        None,
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send_json(
        &app,
        "GET",
        &format!("/access-control/users/{user_id}/groups"),
        &token,
        None,
    )
    .await?;
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let groups: Value = serde_json::from_slice(&bytes)?;
    assert!(groups.as_array().context("array")?.is_empty());

    Ok(())
}
