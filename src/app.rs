use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{auth, health, me, permission_definitions, permission_groups};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let (event_bus, event_rx) = init_event_bus();
    tokio::spawn(start_activity_listener(event_rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let me_routes = Router::new()
        .route("/permissions", get(me::my_permissions))
        .route("/permissions/nav", get(me::my_nav))
        .route("/permissions/check", get(me::check_path));

    // Everything under /access-control requires the system-admin flag; the
    // handlers take the AdminUser extractor.
    let definition_routes = Router::new()
        .route(
            "/",
            get(permission_definitions::list_definitions)
                .post(permission_definitions::create_definition),
        )
        .route("/sync", post(permission_definitions::sync_definitions))
        .route(
            "/:definition_id",
            get(permission_definitions::get_definition)
                .put(permission_definitions::update_definition)
                .delete(permission_definitions::delete_definition),
        );

    let group_routes = Router::new()
        .route(
            "/",
            get(permission_groups::list_groups).post(permission_groups::create_group),
        )
        .route(
            "/:group_id",
            get(permission_groups::get_group)
                .put(permission_groups::update_group)
                .delete(permission_groups::delete_group),
        )
        .route(
            "/:group_id/permissions",
            get(permission_groups::get_group_permissions)
                .post(permission_groups::assign_permission_to_group),
        )
        .route(
            "/:group_id/permissions/:definition_id",
            delete(permission_groups::remove_permission_from_group),
        );

    let user_group_routes = Router::new()
        .route(
            "/:user_id/groups",
            get(permission_groups::get_user_groups).post(permission_groups::assign_group_to_user),
        )
        .route(
            "/:user_id/groups/:group_id",
            delete(permission_groups::revoke_group_from_user),
        );

    let access_control_routes = Router::new()
        .nest("/permission-definitions", definition_routes)
        .nest("/permission-groups", group_routes)
        .nest("/users", user_group_routes)
        .route("/route-catalog", get(permission_definitions::route_catalog));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/me", me_routes)
        .nest("/access-control", access_control_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
