use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use server_api::{
    change_status, grievance_details, grievance_report, list_grievances, submit_grievance,
    ApiContext,
};
use shared::{
    domain::GrievanceId,
    error::{ApiError, ErrorCode},
    protocol::{
        GrievancePayload, ReportPayload, StatusUpdateRequest, StatusUpdateResponse,
        SubmitGrievanceRequest, SubmitGrievanceResponse,
    },
};
use smtp_integration::{Notifier, SmtpConfig, SmtpMailer};
use storage::{DocumentStore, FirestoreStore, MemoryStore, ServiceAccountKey, Storage};
use tracing::{error, info};

mod config;

use config::{load_settings, parse_store_backend, Settings, StoreBackend};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let storage = build_storage(&settings).await?;
    storage.health_check().await.map_err(|error| {
        error!(
            %error,
            "document store unreachable at startup; verify backend settings and credentials"
        );
        error
    })?;

    let notifier = build_notifier(&settings)?;
    let state = AppState {
        api: ApiContext { storage, notifier },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_storage(settings: &Settings) -> anyhow::Result<Storage> {
    let store: Arc<dyn DocumentStore> = match parse_store_backend(&settings.store_backend)? {
        StoreBackend::Memory => {
            info!("using in-memory document store");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Firestore => {
            let key = ServiceAccountKey::from_file(&settings.firestore_credentials).await?;
            info!(project = %key.project_id, "using firestore document store");
            Arc::new(FirestoreStore::new(key))
        }
    };
    Ok(Storage::new(store))
}

fn build_notifier(settings: &Settings) -> anyhow::Result<Notifier> {
    let mailer = SmtpMailer::new(&SmtpConfig {
        host: settings.smtp_host.clone(),
        port: settings.smtp_port,
        username: settings.smtp_username.clone(),
        password: settings.smtp_password.clone(),
        from_address: settings.smtp_from.clone(),
    })?;
    Ok(Notifier::new(Arc::new(mailer)))
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/grievances", post(http_submit_grievance))
        .route("/grievances", get(http_list_grievances))
        .route("/grievances/:grievance_id", get(http_grievance_details))
        .route("/grievances/:grievance_id/status", post(http_change_status))
        .route("/report", get(http_report))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

fn error_response(error: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match error.code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Storage | ErrorCode::Notification | ErrorCode::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(error))
}

async fn http_submit_grievance(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitGrievanceRequest>,
) -> Result<(StatusCode, Json<SubmitGrievanceResponse>), (StatusCode, Json<ApiError>)> {
    let id = submit_grievance(&state.api, request)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(SubmitGrievanceResponse { id })))
}

async fn http_list_grievances(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<GrievancePayload>>, (StatusCode, Json<ApiError>)> {
    let grievances = list_grievances(&state.api).await.map_err(error_response)?;
    Ok(Json(grievances))
}

async fn http_grievance_details(
    State(state): State<Arc<AppState>>,
    Path(grievance_id): Path<String>,
) -> Result<Json<GrievancePayload>, (StatusCode, Json<ApiError>)> {
    let grievance = grievance_details(&state.api, &GrievanceId(grievance_id))
        .await
        .map_err(error_response)?;
    Ok(Json(grievance))
}

async fn http_change_status(
    State(state): State<Arc<AppState>>,
    Path(grievance_id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<StatusUpdateResponse>, (StatusCode, Json<ApiError>)> {
    let response = change_status(&state.api, &GrievanceId(grievance_id), request.status)
        .await
        .map_err(error_response)?;
    Ok(Json(response))
}

async fn http_report(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReportPayload>, (StatusCode, Json<ApiError>)> {
    let report = grievance_report(&state.api).await.map_err(error_response)?;
    Ok(Json(report))
}
