use alloy_primitives::Address;
use anyhow::Context;
use axum::{
    extract::{FromRef, Path, Query, State},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use annsuraksha_core::{ComplaintAnalysis, LogAction};
use annsuraksha_ledger::{
    chain::{self, ChainMirror},
    config::Config,
    storage::{
        ActiveComplaint, BlockchainLogRecord, ComplaintRecord, DaoTally, DashboardMetrics,
        DeliveryRecord, FpsRecord, Storage, TimelineEvent, TrustOverview, TrustScoreRecord,
    },
    workflow::{FileComplaintRequest, LogDeliveryRequest, RegisterUser, UserDelivery, Workflows},
};

use crate::auth::{AdminClaims, JwtKeys};
use crate::error::{
    bad_request, internal_error, not_found, service_unavailable, unauthorized, workflow_error,
    ApiResult,
};

const DEFAULT_RECENT_DELIVERIES: i64 = 5;
const DEFAULT_RECENT_ALERTS: i64 = 5;
const DEFAULT_TIMELINE_EVENTS: i64 = 10;
const ACTIVE_COMPLAINTS: i64 = 5;
const MAX_LIMIT: i64 = 500;

const ALERT_ACTIONS: [LogAction; 2] = [LogAction::ComplaintFiled, LogAction::AiAlert];

#[derive(Clone)]
struct AppState {
    workflows: Workflows,
    jwt: JwtKeys,
}

impl AppState {
    fn storage(&self) -> &Storage {
        self.workflows.storage()
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let storage = Storage::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await?;
    storage.run_migrations().await?;

    let mirror = chain::connect(config.chain.as_ref()).context("Failed to set up chain mirror")?;

    Ok(state_for(storage, mirror, config))
}

fn state_for(storage: Storage, mirror: Arc<dyn ChainMirror>, config: &Config) -> AppState {
    AppState {
        workflows: Workflows::new(storage, mirror),
        jwt: JwtKeys::new(&config.api.jwt_secret, config.api.token_ttl_hours),
    }
}

fn router_for_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/api/login", post(login))
        .route("/delivery", post(log_delivery))
        .route("/deliveries/:id/confirm", post(confirm_delivery))
        .route("/deliveries/:id/resolve", post(resolve_dispute))
        .route("/complaint", post(file_complaint))
        .route("/complaints", get(list_complaints))
        .route("/dealers/authorize", post(authorize_dealer))
        .route("/trust_scores/overview", get(trust_overview))
        .route("/trust_scores/:aadhar_number", get(trust_score))
        .route("/trust_scores/:aadhar_number/history", get(trust_history))
        .route("/users/:aadhar_number/deliveries", get(user_deliveries))
        .route("/dashboard/recent_deliveries", get(recent_deliveries))
        .route("/dashboard/metrics", get(dashboard_metrics))
        .route("/dashboard/active_complaints", get(active_complaints))
        .route("/alerts/recent", get(recent_alerts))
        .route("/timeline", get(timeline))
        .route("/fps", get(list_fps))
        .route("/dao/vote", post(dao_vote))
        .route("/dao/results/:dealer_id", get(dao_results))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Build an in-process API router from explicit configuration.
pub async fn build_app(config: &Config) -> anyhow::Result<Router> {
    let state = build_state(config).await?;
    Ok(router_for_state(state))
}

/// Run the API server until Ctrl+C or SIGTERM.
pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    let state = build_state(&config).await?;
    let storage_for_shutdown = state.storage().clone();
    let app = router_for_state(state);

    let listener = tokio::net::TcpListener::bind((config.api.host.as_str(), config.api.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.api.host, config.api.port))?;
    info!("AnnSuraksha API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    storage_for_shutdown.close().await;
    info!("AnnSuraksha API shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

impl LimitQuery {
    fn or(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
    }
}

async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    state
        .storage()
        .health_check()
        .await
        .map_err(|e| service_unavailable(format!("Database unavailable: {:#}", e)))?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterUser>,
) -> ApiResult<MessageResponse> {
    state
        .workflows
        .register_user(form)
        .await
        .map_err(workflow_error)?;
    Ok(Json(MessageResponse {
        message: "User registered successfully",
    }))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    message: &'static str,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let user = state
        .workflows
        .login(&req.email, &req.password)
        .await
        .map_err(workflow_error)?
        .ok_or_else(|| unauthorized("Invalid email or password"))?;

    let token = state.jwt.issue(&user).map_err(internal_error)?;
    Ok(Json(LoginResponse {
        token,
        message: "Login successful",
    }))
}

#[derive(Debug, Serialize)]
struct DeliveryResponse {
    message: &'static str,
    delivery: DeliveryRecord,
}

async fn log_delivery(
    State(state): State<AppState>,
    Json(req): Json<LogDeliveryRequest>,
) -> ApiResult<DeliveryResponse> {
    let delivery = state
        .workflows
        .log_delivery(req)
        .await
        .map_err(workflow_error)?;
    Ok(Json(DeliveryResponse {
        message: "Delivery logged",
        delivery,
    }))
}

async fn confirm_delivery(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<DeliveryResponse> {
    let delivery = state
        .workflows
        .confirm_delivery(id)
        .await
        .map_err(workflow_error)?;
    Ok(Json(DeliveryResponse {
        message: "Delivery confirmed",
        delivery,
    }))
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    dealer_at_fault: bool,
    #[serde(default)]
    resolution: Option<String>,
}

async fn resolve_dispute(
    AdminClaims(admin): AdminClaims,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<DeliveryResponse> {
    info!(admin = admin.sub, delivery_id = id, "Resolving dispute");
    let delivery = state
        .workflows
        .resolve_dispute(id, req.dealer_at_fault, req.resolution)
        .await
        .map_err(workflow_error)?;
    Ok(Json(DeliveryResponse {
        message: "Dispute resolved",
        delivery,
    }))
}

#[derive(Debug, Serialize)]
struct ComplaintResponse {
    message: &'static str,
    complaint_id: i64,
    ai_result: ComplaintAnalysis,
}

async fn file_complaint(
    State(state): State<AppState>,
    Json(req): Json<FileComplaintRequest>,
) -> ApiResult<ComplaintResponse> {
    let filed = state
        .workflows
        .file_complaint(req)
        .await
        .map_err(workflow_error)?;
    Ok(Json(ComplaintResponse {
        message: "Complaint filed",
        complaint_id: filed.complaint.id,
        ai_result: filed.analysis,
    }))
}

async fn list_complaints(State(state): State<AppState>) -> ApiResult<Vec<ComplaintRecord>> {
    let complaints = state
        .storage()
        .list_complaints()
        .await
        .map_err(internal_error)?;
    Ok(Json(complaints))
}

#[derive(Debug, Deserialize)]
struct AuthorizeRequest {
    dealer: String,
    #[serde(default = "default_authorized")]
    authorized: bool,
}

fn default_authorized() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct AuthorizeResponse {
    message: &'static str,
    dealer: Address,
    authorized: bool,
    tx_hash: Option<String>,
}

async fn authorize_dealer(
    AdminClaims(admin): AdminClaims,
    State(state): State<AppState>,
    Json(req): Json<AuthorizeRequest>,
) -> ApiResult<AuthorizeResponse> {
    let dealer: Address = req
        .dealer
        .trim()
        .parse()
        .map_err(|e| bad_request(format!("Invalid dealer address: {}", e)))?;

    info!(admin = admin.sub, %dealer, authorized = req.authorized, "Updating dealer authorization");
    let receipt = state
        .workflows
        .authorize_dealer(dealer, req.authorized)
        .await
        .map_err(workflow_error)?;

    Ok(Json(AuthorizeResponse {
        message: "Dealer authorization updated",
        dealer,
        authorized: req.authorized,
        tx_hash: receipt.map(|r| r.tx_hash.to_string()),
    }))
}

async fn trust_overview(State(state): State<AppState>) -> ApiResult<TrustOverview> {
    let overview = state
        .storage()
        .trust_overview()
        .await
        .map_err(internal_error)?;
    Ok(Json(overview))
}

async fn trust_score(
    State(state): State<AppState>,
    Path(aadhar_number): Path<String>,
) -> ApiResult<Value> {
    let user = state
        .storage()
        .get_user_by_aadhar(&aadhar_number)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("User not found"))?;
    Ok(Json(json!({ "trust_score": user.trust_score })))
}

async fn trust_history(
    State(state): State<AppState>,
    Path(aadhar_number): Path<String>,
) -> ApiResult<Vec<TrustScoreRecord>> {
    let user = state
        .storage()
        .get_user_by_aadhar(&aadhar_number)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("User not found"))?;
    let history = state
        .storage()
        .trust_history(user.id)
        .await
        .map_err(internal_error)?;
    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    #[serde(default)]
    verify: bool,
}

async fn user_deliveries(
    State(state): State<AppState>,
    Path(aadhar_number): Path<String>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<Vec<UserDelivery>> {
    let deliveries = state
        .workflows
        .user_deliveries(&aadhar_number, query.verify)
        .await
        .map_err(workflow_error)?;
    Ok(Json(deliveries))
}

async fn recent_deliveries(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<DeliveryRecord>> {
    let deliveries = state
        .storage()
        .recent_deliveries(query.or(DEFAULT_RECENT_DELIVERIES))
        .await
        .map_err(internal_error)?;
    Ok(Json(deliveries))
}

async fn dashboard_metrics(State(state): State<AppState>) -> ApiResult<DashboardMetrics> {
    let metrics = state
        .storage()
        .live_metrics()
        .await
        .map_err(internal_error)?;
    Ok(Json(metrics))
}

async fn active_complaints(State(state): State<AppState>) -> ApiResult<Vec<ActiveComplaint>> {
    let complaints = state
        .storage()
        .active_complaints(ACTIVE_COMPLAINTS)
        .await
        .map_err(internal_error)?;
    Ok(Json(complaints))
}

async fn recent_alerts(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<BlockchainLogRecord>> {
    let alerts = state
        .storage()
        .recent_logs(&ALERT_ACTIONS, query.or(DEFAULT_RECENT_ALERTS))
        .await
        .map_err(internal_error)?;
    Ok(Json(alerts))
}

async fn timeline(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<TimelineEvent>> {
    let events = state
        .storage()
        .timeline(query.or(DEFAULT_TIMELINE_EVENTS))
        .await
        .map_err(internal_error)?;
    Ok(Json(events))
}

async fn list_fps(State(state): State<AppState>) -> ApiResult<Vec<FpsRecord>> {
    let shops = state.storage().list_fps().await.map_err(internal_error)?;
    Ok(Json(shops))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VoteRequest {
    dealer_id: Option<String>,
    vote: Option<String>,
    voter_email: Option<String>,
}

async fn dao_vote(
    State(state): State<AppState>,
    Json(req): Json<VoteRequest>,
) -> ApiResult<MessageResponse> {
    state
        .workflows
        .record_vote(
            req.dealer_id.as_deref(),
            req.vote.as_deref(),
            req.voter_email.as_deref(),
        )
        .await
        .map_err(workflow_error)?;
    Ok(Json(MessageResponse {
        message: "Vote recorded",
    }))
}

async fn dao_results(
    State(state): State<AppState>,
    Path(dealer_id): Path<String>,
) -> ApiResult<DaoTally> {
    let tally = state
        .storage()
        .tally(&dealer_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(tally))
}
