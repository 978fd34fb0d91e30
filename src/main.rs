// src/main.rs

use std::env;

use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::{Pool, Postgres};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

mod db;
mod layout;
mod models;
mod routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
}

fn app(state: AppState) -> Router {
    // Very permissive CORS for local dev (tighten for prod)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // health
        .route("/health", get(routes::health::health))
        // eois
        .route(
            "/api/v1/eois",
            post(routes::eois::create_eoi).get(routes::eois::list_eois),
        )
        .route(
            "/api/v1/eois/:id",
            get(routes::eois::get_eoi)
                .put(routes::eois::update_eoi)
                .delete(routes::eois::delete_eoi),
        )
        // clients
        .route(
            "/api/v1/clients",
            post(routes::clients::create_client).get(routes::clients::list_clients),
        )
        .route(
            "/api/v1/clients/:id",
            get(routes::clients::get_client)
                .put(routes::clients::update_client)
                .delete(routes::clients::delete_client),
        )
        // bookings (+ cancellation workflow)
        .route(
            "/api/v1/bookings",
            post(routes::bookings::create_booking).get(routes::bookings::list_bookings),
        )
        .route(
            "/api/v1/bookings/:id",
            get(routes::bookings::get_booking)
                .put(routes::bookings::update_booking)
                .delete(routes::bookings::delete_booking),
        )
        .route(
            "/api/v1/bookings/:id/cancel",
            post(routes::bookings::cancel_booking),
        )
        // client partners (+ their employees)
        .route(
            "/api/v1/client-partners",
            post(routes::client_partners::create_partner)
                .get(routes::client_partners::list_partners),
        )
        .route(
            "/api/v1/client-partners/:id",
            get(routes::client_partners::get_partner)
                .put(routes::client_partners::update_partner)
                .delete(routes::client_partners::delete_partner),
        )
        .route(
            "/api/v1/client-partners/:id/employees",
            post(routes::client_partners::add_employee)
                .get(routes::client_partners::list_employees),
        )
        .route(
            "/api/v1/partner-employees/:id",
            put(routes::client_partners::update_employee)
                .delete(routes::client_partners::delete_employee),
        )
        // auth logs
        .route(
            "/api/v1/auth-logs",
            post(routes::auth_logs::create_auth_log).get(routes::auth_logs::list_auth_logs),
        )
        .route(
            "/api/v1/auth-logs/:id",
            get(routes::auth_logs::get_auth_log)
                .put(routes::auth_logs::update_auth_log)
                .delete(routes::auth_logs::delete_auth_log),
        )
        // categories (+ batch precedence)
        .route(
            "/api/v1/categories",
            post(routes::categories::create_category).get(routes::categories::list_categories),
        )
        .route(
            "/api/v1/categories/precedence",
            put(routes::categories::reorder_categories),
        )
        .route(
            "/api/v1/categories/:id",
            put(routes::categories::update_category)
                .delete(routes::categories::delete_category),
        )
        // inventory
        .route(
            "/api/v1/projects",
            post(routes::projects::create_project).get(routes::projects::list_projects),
        )
        .route(
            "/api/v1/projects/:id",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route(
            "/api/v1/projects/:id/layout",
            get(routes::projects::project_layout),
        )
        .route(
            "/api/v1/units/:id/status",
            put(routes::projects::set_unit_status),
        )
        // state & middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Initialize DB pool
    let pool = db::connect().await?;
    let state = AppState { pool };

    let api = app(state);

    // Port (axum 0.7 style)
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080); // default 8080

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    let api_base = format!("http://127.0.0.1:{port}");
    println!("✅ PORT={}, using {}", port, addr);
    println!("🚀 API listening on {api_base}");

    axum::serve(listener, api.into_make_service()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> Router {
        // lazy pool: nothing connects until a handler actually hits the DB
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        app(AppState { pool })
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let res = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = res.into_body().collect().await.unwrap().to_bytes();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let res = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/nothing-here")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_rejecting_eoi_no_happens_before_db_access() {
        // the lazy pool would fail any query, so a 400 here proves the guard
        // runs first
        let res = test_app()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/eois/1")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"eoiNo": 2002}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body = res.into_body().collect().await.unwrap().to_bytes();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["error"], "eoiNo cannot be changed");
    }

    #[tokio::test]
    async fn malformed_json_body_gets_error_envelope() {
        let res = test_app()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/eois/1")
                    .header("content-type", "application/json")
                    .body(Body::from("{"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body = res.into_body().collect().await.unwrap().to_bytes();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(v["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_query_param_gets_error_envelope() {
        let res = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/eois?page=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body = res.into_body().collect().await.unwrap().to_bytes();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(v["error"].is_string());
    }
}
