use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use crate::AppState;

/// Answer given while no engine is available (missing API key or store).
pub const NOT_READY: &str =
    "System is initializing or missing API Key. Please try again in a moment.";

#[derive(Debug, Deserialize, Validate)]
pub struct ChatIn {
    #[validate(custom(function = "not_blank"))]
    pub question: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(
            ValidationError::new("blank").with_message("question must not be empty".into())
        );
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatOut {
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub rag_ready: bool,
}

// POST /chat - Answer a question from the profile
async fn chat(state: web::Data<AppState>, req: web::Json<ChatIn>) -> AppResult<HttpResponse> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let answer = match &state.engine {
        Some(engine) => engine.answer(&req.question).await,
        None => NOT_READY.to_string(),
    };

    Ok(HttpResponse::Ok().json(ChatOut { answer }))
}

// GET /health - Liveness plus knowledge base readiness
async fn health(state: web::Data<AppState>) -> HttpResponse {
    let rag_ready = state
        .engine
        .as_ref()
        .map(|engine| engine.is_ready())
        .unwrap_or(false);

    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        rag_ready,
    })
}

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/chat", web::post().to(chat))
        .route("/health", web::get().to(health));
}
