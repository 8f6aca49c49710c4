use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResponse;
use crate::error::AppError;
use crate::middleware::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateRetentionConfigBody {
    pub count: u32,
    pub enabled: bool,
}

/// GET /api/v1/message-retention/config
pub async fn get_config(state: web::Data<AppState>, _user: User) -> HttpResponse {
    let settings = state.facade.get_retention_config();
    HttpResponse::Ok().json(ApiResponse::ok("Retention configuration retrieved successfully", settings))
}

/// PUT /api/v1/message-retention/config
pub async fn update_config(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<UpdateRetentionConfigBody>,
) -> Result<HttpResponse, AppError> {
    let updated = state.facade.update_retention_config(body.count, body.enabled)?;
    tracing::info!(user_id = %user.id, count = updated.count, enabled = updated.enabled, "retention config changed via api");
    Ok(HttpResponse::Ok().json(ApiResponse::ok(
        format!(
            "Retention configuration updated: enabled={}, count={}",
            updated.enabled, updated.count
        ),
        updated,
    )))
}

/// GET /api/v1/message-retention/stats/{other_user_id}
pub async fn get_stats(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let stats = state.facade.get_retention_stats(user.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Retention statistics retrieved successfully", stats)))
}

/// POST /api/v1/message-retention/cleanup/{other_user_id}
pub async fn cleanup_conversation(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let result = state.facade.trigger_cleanup(user.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Conversation cleanup completed successfully", result)))
}

/// POST /api/v1/message-retention/cleanup-all
pub async fn cleanup_all(state: web::Data<AppState>, user: User) -> Result<HttpResponse, AppError> {
    let report = state.facade.trigger_cleanup_all().await?;
    tracing::info!(
        user_id = %user.id,
        conversations = report.conversations,
        deleted = report.deleted,
        failures = report.failures.len(),
        "manual retention sweep finished"
    );
    Ok(HttpResponse::Ok().json(ApiResponse::ok("All conversations cleanup completed", report)))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/message-retention")
            .route("/config", web::get().to(get_config))
            .route("/config", web::put().to(update_config))
            .route("/stats/{other_user_id}", web::get().to(get_stats))
            .route("/cleanup/{other_user_id}", web::post().to(cleanup_conversation))
            .route("/cleanup-all", web::post().to(cleanup_all)),
    );
}
