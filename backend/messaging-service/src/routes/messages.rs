use actix_web::{web, HttpResponse};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResponse;
use crate::error::AppError;
use crate::middleware::User;
use crate::models::{MediaUpload, MessageType, SendMessageRequest};
use crate::state::AppState;

/// Media payload sent as JSON, with the file base64-encoded
#[derive(Debug, Deserialize)]
pub struct SendMediaMessageBody {
    pub receiver_id: Uuid,
    pub message_type: MessageType,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub data_base64: Option<String>,
}

/// POST /api/v1/messages
pub async fn send_message(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let message = state.facade.send(user.id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Message sent successfully", message)))
}

/// POST /api/v1/messages/media
pub async fn send_media_message(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<SendMediaMessageBody>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    let upload = match body.data_base64.as_deref() {
        Some(encoded) => {
            let bytes = STANDARD
                .decode(encoded.trim())
                .map_err(|e| AppError::BadRequest(format!("data_base64 is not valid base64: {e}")))?;
            Some(MediaUpload {
                file_name: body.file_name,
                bytes,
            })
        }
        None => None,
    };

    let message = state
        .facade
        .send_with_media(user.id, body.receiver_id, body.message_type, body.text_content, upload)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Media message sent successfully", message)))
}

/// GET /api/v1/messages/conversation/{other_user_id}
pub async fn get_conversation(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let messages = state.facade.get_conversation(user.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Conversation retrieved successfully", messages)))
}

/// DELETE /api/v1/messages/{message_id}
pub async fn delete_message(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    state.facade.delete_message(path.into_inner(), user.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::done("Message deleted successfully")))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/messages")
            .route("", web::post().to(send_message))
            .route("/media", web::post().to(send_media_message))
            .route("/conversation/{other_user_id}", web::get().to(get_conversation))
            .route("/{message_id}", web::delete().to(delete_message)),
    );
}
