//! REST API for the weigher/sorter service.
//!
//! Exposes tray generation and box solving as JSON endpoints.
//! The service is stateless: `/generate` hands the trays to the caller and
//! `/solve` expects them back in the request body.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, SolverConfig};
use crate::generator::{fresh_seed, generate};
use crate::model::{PackedBox, Tray, TrayList, ValidationError};
use crate::optimizer::{SolveCriteria, SolveReport, SolveStatus, solve};
use crate::settings::{RawNumber, RawSettings, Settings, WeightRange};

#[derive(Clone)]
struct ApiState {
    solver_config: SolverConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// Integrity hashes belong to swagger-ui-dist 5.17.14; update them with the version.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>weigher-sorter API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request structure for the generate endpoint.
///
/// Omitting `seed` draws a fresh one from the clock; passing the seed of an
/// earlier response reproduces its trays.
#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "seed": 42,
        "settings": { "weight_min_g": 600, "weight_max_g": 700 }
    })
)]
pub struct GenerateRequest {
    #[serde(default)]
    #[schema(nullable = true)]
    pub seed: Option<u32>,
    #[serde(default)]
    pub settings: RawSettings,
}

/// Response of the generate endpoint.
#[derive(Serialize, ToSchema)]
pub struct GenerateResponse {
    pub seed: u32,
    pub weight_range: WeightRange,
    pub trays: Vec<Tray>,
}

/// Request structure for the solve endpoint.
#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "weights": [650, 680, 700, 660],
        "settings": { "target_kg": 1.33, "tolerance_g": 10 }
    })
)]
pub struct SolveRequest {
    /// Tray weights in grams, in index order.
    pub weights: Vec<u32>,
    #[serde(default)]
    pub settings: RawSettings,
}

/// Response of the solve endpoint.
///
/// # Fields
/// * `status` - `matched`, `no_match` or `no_trays`
/// * `message` - Human-readable summary of the status
/// * `criteria` - The resolved settings the solve ran with
/// * `candidate_count` - Subsets within tolerance before selection
/// * `boxes` - Selected boxes, best first
#[derive(Serialize, ToSchema)]
pub struct SolveResponse {
    pub status: SolveStatus,
    pub message: String,
    pub criteria: SolveCriteria,
    pub candidate_count: usize,
    pub boxes: Vec<SolvedBox>,
}

/// Single box in the solve response.
///
/// # Fields
/// * `rank` - Box number (1-based)
/// * `tray_indices` - 0-based indices of the trays in this box
/// * `total_weight_g` - Combined tray weight
/// * `deviation_g` - Distance from the target weight
/// * `item_count` - Number of trays in the box
#[derive(Serialize, ToSchema)]
pub struct SolvedBox {
    pub rank: usize,
    #[schema(example = json!([0, 1]))]
    pub tray_indices: Vec<usize>,
    pub total_weight_g: u64,
    pub deviation_g: u64,
    pub item_count: usize,
}

impl From<PackedBox> for SolvedBox {
    fn from(packed: PackedBox) -> Self {
        Self {
            rank: packed.rank,
            total_weight_g: packed.total_weight(),
            deviation_g: packed.deviation(),
            item_count: packed.member_count(),
            tray_indices: packed.indices().to_vec(),
        }
    }
}

impl SolveResponse {
    /// Creates a SolveResponse from a SolveReport.
    pub fn from_report(report: SolveReport) -> Self {
        let message = match report.status {
            SolveStatus::NoMatch => format!("{} ({})", report.status, report.criteria),
            _ => report.status.to_string(),
        };

        Self {
            status: report.status,
            message,
            criteria: report.criteria,
            candidate_count: report.candidate_count,
            boxes: report.boxes.into_iter().map(SolvedBox::from).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("Invalid JSON data")]
    Json(#[from] JsonRejection),
    #[error("Invalid input data")]
    Validation(#[from] ValidationError),
    #[error("Solver task failed")]
    Solver(#[from] tokio::task::JoinError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Json(_) | ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Solver(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> String {
        match self {
            ApiError::Json(err) => err.body_text(),
            ApiError::Validation(err) => err.to_string(),
            ApiError::Solver(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Solver(err) = &self {
            error!("Solver task failed: {err}");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            details: self.details(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_generate, handle_solve),
    components(
        schemas(
            GenerateRequest,
            GenerateResponse,
            SolveRequest,
            SolveResponse,
            SolvedBox,
            ErrorResponse,
            RawSettings,
            RawNumber,
            Tray,
            WeightRange,
            SolveCriteria,
            SolveStatus
        )
    ),
    tags((name = "weighing", description = "Endpoints for tray generation and box matching"))
)]
struct ApiDoc;

fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/generate", post(handle_generate))
        .route("/solve", post(handle_solve))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server on the configured address.
///
/// Blocks until the server terminates.
pub async fn start_api_server(
    config: ApiConfig,
    solver_config: SolverConfig,
) -> std::io::Result<()> {
    let app = router(ApiState { solver_config });

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        "🚀 Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        info!("💡 Local access: http://localhost:{}", config.port());
    }
    info!(
        trays = solver_config.tray_count(),
        box_limit = solver_config.box_limit(),
        "📦 Endpoints: POST /generate, POST /solve, GET /docs"
    );

    axum::serve(listener, app).await
}

/// Handler for POST /generate.
///
/// Draws a fresh tray list within the requested weight range.
#[utoipa::path(
    post,
    path = "/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Generated trays", body = GenerateResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "weighing"
)]
async fn handle_generate(
    State(state): State<ApiState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = payload?;
    let tray_count = state.solver_config.tray_count();
    let settings = Settings::resolve(
        &request.settings,
        tray_count,
        state.solver_config.box_limit(),
    );
    let seed = request.seed.unwrap_or_else(fresh_seed);

    let batch = generate(&settings, tray_count, seed)?;
    info!(
        "🎲 Generated {} trays ({}g to {}g, seed {})",
        batch.trays.len(),
        batch.weight_range.min(),
        batch.weight_range.max(),
        batch.seed
    );

    Ok(Json(GenerateResponse {
        seed: batch.seed,
        weight_range: batch.weight_range,
        trays: batch.trays.iter().copied().collect(),
    }))
}

/// Handler for POST /solve.
///
/// Groups the given trays into up to `box_limit` disjoint boxes near the target.
/// An empty `boxes` list is a regular result, not an error.
#[utoipa::path(
    post,
    path = "/solve",
    request_body = SolveRequest,
    responses(
        (status = 200, description = "Solve finished", body = SolveResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or too many trays",
            body = ErrorResponse
        )
    ),
    tag = "weighing"
)]
async fn handle_solve(
    State(state): State<ApiState>,
    payload: Result<Json<SolveRequest>, JsonRejection>,
) -> Result<Json<SolveResponse>, ApiError> {
    let Json(request) = payload?;
    let trays = TrayList::from_weights(request.weights)?;
    let settings = Settings::resolve(
        &request.settings,
        trays.len(),
        state.solver_config.box_limit(),
    );

    info!(
        "📥 New solve request: {} trays, {}",
        trays.len(),
        SolveCriteria::from(&settings)
    );
    let report = tokio::task::spawn_blocking(move || solve(&trays, &settings)).await?;
    info!(
        "📦 Result: {} boxes from {} candidates ({})",
        report.box_count(),
        report.candidate_count,
        report.status.code()
    );

    Ok(Json(SolveResponse::from_report(report)))
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
