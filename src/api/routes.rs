//! API Routes
//!
//! Configures the Axum router with all debug API endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    beacon_handler, beacons_handler, events_handler, evict_handler, export_handler,
    get_settings_handler, health_handler, import_handler, location_handler,
    put_settings_handler, reported_handler, sighting_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /sightings` - Ingest a raw sighting
/// - `PUT /location` - Update the current location fix
/// - `GET /beacons` - Snapshot of every cached beacon
/// - `GET /beacons/reported` - Beacons already reported
/// - `GET /beacons/export` - Identity to beacon mapping for persistence
/// - `POST /beacons/import` - Restore an exported mapping
/// - `GET /beacons/:identity` - One cached beacon
/// - `DELETE /beacons/:identity` - Evict without a lost notification
/// - `GET /events` - Recent found/lost notifications
/// - `GET /settings`, `PUT /settings` - Scan settings
/// - `GET /stats` - Pipeline and cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/sightings", post(sighting_handler))
        .route("/location", put(location_handler))
        .route("/beacons", get(beacons_handler))
        .route("/beacons/reported", get(reported_handler))
        .route("/beacons/export", get(export_handler))
        .route("/beacons/import", post(import_handler))
        .route(
            "/beacons/:identity",
            get(beacon_handler).delete(evict_handler),
        )
        .route("/events", get(events_handler))
        .route(
            "/settings",
            get(get_settings_handler).put(put_settings_handler),
        )
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let state = AppState::from_config(&Config::default()).unwrap();
        create_router(state)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sightings_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sightings")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"advertisement":{"format":"ibeacon","proximity_uuid":"U1","major":1,"minor":1},"rssi":-60}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_beacon_not_found() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/beacons/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reported_route_is_not_an_identity() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/beacons/reported")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
