use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::error::KindredError;
use crate::models::{ProfilePatch, SendCodeRequest, VerificationResponse, VerificationSentResponse, VerifyCodeRequest};
use crate::routes::matches::AppState;

/// Configure verification routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/verification/send", web::post().to(send_code))
        .route("/verification/verify", web::post().to(verify_code));
}

/// Issue a code for a profile. Delivery (SMS, email) happens outside this
/// service, so the code itself is only logged at debug level.
async fn send_code(
    state: web::Data<AppState>,
    req: web::Json<SendCodeRequest>,
) -> Result<HttpResponse, KindredError> {
    req.validate()?;

    // Only existing profiles can be verified
    state.engine.get_profile(&req.subject).await?;

    let issued = state
        .engine
        .deadline()
        .run_with_retry("issue code", || state.codes.issue(&req.subject))
        .await?;
    tracing::debug!("Verification code for {}: {}", req.subject, issued.code);

    Ok(HttpResponse::Ok().json(VerificationSentResponse {
        sent: true,
        expires_in_secs: issued.expires_in.as_secs(),
    }))
}

async fn verify_code(
    state: web::Data<AppState>,
    req: web::Json<VerifyCodeRequest>,
) -> Result<HttpResponse, KindredError> {
    req.validate()?;

    let deadline = state.engine.deadline();
    // Not retried: a timed-out attempt may already have consumed the code
    let verified = deadline
        .run("check code", state.codes.verify(&req.subject, &req.code))
        .await?;

    if verified {
        if let Err(e) = state.engine.update_profile(&req.subject, ProfilePatch::verified()).await {
            // The code was consumed but nothing was granted; give it back
            if let Err(restore) = deadline
                .run_with_retry("reinstate code", || state.codes.reinstate(&req.subject, &req.code))
                .await
            {
                tracing::error!("Failed to reinstate code for {}: {}", req.subject, restore);
            }
            return Err(e);
        }
        tracing::info!("Profile {} verified", req.subject);
    } else {
        tracing::info!("Verification failed for {}", req.subject);
    }

    Ok(HttpResponse::Ok().json(VerificationResponse { verified }))
}
