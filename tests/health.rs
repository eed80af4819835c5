use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;

use quotedesk::create_app;

async fn setup_app() -> Result<(Router, TempDir)> {
    let dir = tempdir()?;
    let db_path = dir.path().join("test_health.db");

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
    let app = create_app(pool).await?;

    Ok((app, dir))
}

#[tokio::test]
async fn health_reports_db_ok_and_version() -> Result<()> {
    let (app, _dir) = setup_app().await?;

    let req = Request::builder()
        .method("GET")
        .uri("/api/health")
        .body(Body::empty())?;
    let resp = app.oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let v: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(v["status"], "ok");
    assert_eq!(v["db_ok"], true);
    assert!(v["version"].as_str().is_some_and(|s| !s.is_empty()));

    Ok(())
}

#[tokio::test]
async fn protected_routes_reject_anonymous_callers() -> Result<()> {
    let (app, _dir) = setup_app().await?;

    for uri in ["/me/permissions", "/auth/me", "/access-control/permission-groups"] {
        let req = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())?;
        let resp = app.clone().oneshot(req).await?;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri} should need a token");
    }

    Ok(())
}
