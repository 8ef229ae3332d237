use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::error::KindredError;
use crate::models::{CreateProfileRequest, ProfilePatch};
use crate::routes::matches::AppState;

/// Configure profile management routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/profiles", web::post().to(create_profile))
        .route("/profiles/{id}", web::get().to(get_profile))
        .route("/profiles/{id}", web::patch().to(update_profile))
        .route("/profiles/{id}", web::delete().to(delete_profile));
}

async fn create_profile(
    state: web::Data<AppState>,
    req: web::Json<CreateProfileRequest>,
) -> Result<HttpResponse, KindredError> {
    req.validate()?;

    let profile = req.into_inner().into_profile();
    let created = state.engine.create_profile(profile).await?;

    tracing::info!("Created profile {}", created.id);
    Ok(HttpResponse::Created().json(created))
}

async fn get_profile(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, KindredError> {
    let profile = state.engine.get_profile(&path).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Verification is granted only through the verification flow
async fn update_profile(
    state: web::Data<AppState>,
    path: web::Path<String>,
    patch: web::Json<ProfilePatch>,
) -> Result<HttpResponse, KindredError> {
    let patch = patch.into_inner();
    if patch.is_verified.is_some() {
        return Err(KindredError::Validation(
            "isVerified cannot be set directly; use /verification/verify".to_string(),
        ));
    }

    let updated = state.engine.update_profile(&path, patch).await?;
    tracing::debug!("Updated profile {}", updated.id);
    Ok(HttpResponse::Ok().json(updated))
}

async fn delete_profile(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, KindredError> {
    state.engine.delete_profile(&path).await?;
    tracing::info!("Soft-deleted profile {}", path.as_str());
    Ok(HttpResponse::NoContent().finish())
}
