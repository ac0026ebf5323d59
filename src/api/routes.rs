use crate::api::ApiDoc;
use crate::AppState;
use axum::{
    routing::{get, post},
    Json, Router,
};
use utoipa::OpenApi;

pub fn create_router() -> Router<AppState> {
    let api_routes = Router::new()
        .route(
            "/research",
            post(crate::api::handlers::research::research),
        )
        .route("/openapi.json", get(openapi));

    Router::new()
        .route("/health", get(crate::api::handlers::health::health))
        .nest("/api", api_routes)
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
