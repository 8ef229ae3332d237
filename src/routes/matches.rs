use actix_web::{web, HttpResponse};
use std::sync::Arc;
use validator::Validate;

use crate::core::MatchEngine;
use crate::error::KindredError;
use crate::models::{
    CandidatesParams, HealthResponse, MatchesParams, MatchesResponse, RecordActionRequest, RequestedAction,
    ScoreParams,
};
use crate::services::VerificationCodeStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchEngine>,
    pub codes: Arc<dyn VerificationCodeStore>,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/actions", web::post().to(record_action))
        .route("/candidates", web::get().to(get_candidates))
        .route("/score", web::get().to(get_score))
        .route("/matches", web::get().to(get_matches));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let status = if state.engine.is_healthy().await { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Record an action
///
/// POST /api/v1/actions
///
/// Request body:
/// ```json
/// {
///   "actorId": "string",
///   "targetId": "string",
///   "kind": "like | superlike | dislike | block"
/// }
/// ```
async fn record_action(
    state: web::Data<AppState>,
    req: web::Json<RecordActionRequest>,
) -> Result<HttpResponse, KindredError> {
    req.validate()?;

    let result = match req.requested_action()? {
        RequestedAction::Act(kind) => state.engine.record_action(&req.actor_id, &req.target_id, kind).await?,
        RequestedAction::Block => state.engine.block(&req.actor_id, &req.target_id).await?,
    };

    Ok(HttpResponse::Ok().json(result))
}

/// Ranked candidates for a requester
///
/// GET /api/v1/candidates?requesterId=..&ageMin=..&ageMax=..&maxDistance=..&genderPref=female,other&page=1&limit=20
async fn get_candidates(
    state: web::Data<AppState>,
    params: web::Query<CandidatesParams>,
) -> Result<HttpResponse, KindredError> {
    params.validate()?;
    let query = params.to_query()?;

    tracing::info!(
        "Finding candidates for {} (page {:?}, limit {:?})",
        params.requester_id,
        query.page,
        query.limit
    );

    let page = state.engine.candidates(&params.requester_id, &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// GET /api/v1/score?idA=..&idB=..
async fn get_score(
    state: web::Data<AppState>,
    params: web::Query<ScoreParams>,
) -> Result<HttpResponse, KindredError> {
    params.validate()?;
    let result = state.engine.score(&params.id_a, &params.id_b).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/v1/matches?profileId=..
async fn get_matches(
    state: web::Data<AppState>,
    params: web::Query<MatchesParams>,
) -> Result<HttpResponse, KindredError> {
    params.validate()?;
    let matches = state.engine.matches_for(&params.profile_id).await?;

    Ok(HttpResponse::Ok().json(MatchesResponse {
        profile_id: params.profile_id.clone(),
        count: matches.len(),
        matches,
    }))
}
