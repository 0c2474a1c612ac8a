// Lumber Estimator - Web Server
// REST API over the estimation engine and the stored catalogs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use lumber_estimator::{
    db, AccuracyReport, EstimationEngine, EstimationResult, RawMaterial, RejectedMaterial,
    ValidationInput,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

/// POST /api/estimate request body
#[derive(Deserialize)]
struct EstimateRequest {
    project_name: String,
    materials: Vec<RawMaterial>,

    /// Restrict the catalog to one contractor's snapshot
    #[serde(default)]
    contractor: Option<String>,

    /// Ground-truth actuals, when a reconciliation pass supplies them
    #[serde(default)]
    validation: Option<ValidationInput>,
}

/// POST /api/estimate response body
#[derive(Serialize)]
struct EstimateResponse {
    run_id: String,
    estimate: EstimationResult,
    accuracy: AccuracyReport,
    rejected: Vec<RejectedMaterial>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/contractors - All contractors on file
async fn get_contractors(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match db::get_all_contractors(&conn) {
        Ok(contractors) => (StatusCode::OK, Json(ApiResponse::ok(contractors))).into_response(),
        Err(e) => {
            eprintln!("Error getting contractors: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET /api/catalog/:contractor - One contractor's price snapshot
async fn get_contractor_catalog(
    State(state): State<AppState>,
    Path(contractor): Path<String>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match db::get_catalog(&conn, Some(&contractor)) {
        Ok(entries) => (StatusCode::OK, Json(ApiResponse::ok(entries))).into_response(),
        Err(e) => {
            eprintln!("Error getting catalog: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e.to_string())),
            )
                .into_response()
        }
    }
}

/// POST /api/estimate - Run one estimation against the stored catalog
async fn run_estimate(
    State(state): State<AppState>,
    Json(request): Json<EstimateRequest>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    let catalog = match db::get_catalog(&conn, request.contractor.as_deref()) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Error loading catalog: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e.to_string())),
            )
                .into_response();
        }
    };

    let engine = EstimationEngine::new();
    let run = engine.run(
        &request.project_name,
        request.materials,
        catalog,
        request.validation.as_ref(),
    );

    if let Err(e) = db::insert_run(&conn, &run) {
        eprintln!("Error saving run {}: {}", run.run_id, e);
    }

    let response = EstimateResponse {
        run_id: run.run_id,
        estimate: run.estimate,
        accuracy: run.accuracy,
        rejected: run.rejected,
    };

    (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
}

/// GET /api/runs - Stored run history
async fn get_runs(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match db::list_runs(&conn) {
        Ok(runs) => (StatusCode::OK, Json(ApiResponse::ok(runs))).into_response(),
        Err(e) => {
            eprintln!("Error listing runs: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET /api/runs/:id - One stored run, in full
async fn get_run_detail(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match db::get_run(&conn, &run_id) {
        Ok(Some(run)) => (StatusCode::OK, Json(ApiResponse::ok(run))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err(format!("run {} not found", run_id))),
        )
            .into_response(),
        Err(e) => {
            eprintln!("Error loading run {}: {}", run_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e.to_string())),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    println!("🌐 Lumber Estimator - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "lumber_estimator.db".to_string());

    let conn = Connection::open(&db_path).expect("Failed to open database");
    db::setup_database(&conn).expect("Failed to set up schema");
    println!("✓ Database opened: {}", db_path);

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/contractors", get(get_contractors))
        .route("/catalog/:contractor", get(get_contractor_catalog))
        .route("/estimate", post(run_estimate))
        .route("/runs", get(get_runs))
        .route("/runs/:id", get(get_run_detail))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = "0.0.0.0:8003";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://localhost:8003");
    println!("   Health:   http://localhost:8003/api/health");
    println!("   Estimate: POST http://localhost:8003/api/estimate");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
