//! HTTP API Handlers and Routes
//!
//! The REST surface of Delve, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! - `POST /api/research` - Run one research session and return the cited answer
//! - `GET /health` - Liveness check with the configured backends
//! - `GET /api/openapi.json` - OpenAPI document for the endpoints above
//!
//! Failures come back as `{"error": "...", "stage": "web_research"}` with
//! 400 for bad input, 502 when the LLM or search backend failed and 500
//! otherwise. `stage` is `null` when the run never started.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

use crate::research::state::{Role, SourceRecord, Turn};
use crate::types::{NodeKind, ResearchRequest, ResearchResponse};
use utoipa::OpenApi;

/// OpenAPI document served at `/api/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(title = "Delve", description = "Iterative web research with cited answers"),
    paths(handlers::research::research, handlers::health::health),
    components(schemas(
        ResearchRequest,
        ResearchResponse,
        Turn,
        Role,
        SourceRecord,
        NodeKind,
        handlers::health::HealthResponse
    )),
    tags(
        (name = "research", description = "Research runs"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;
