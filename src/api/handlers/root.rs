use axum::{http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Barbell API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Payments, bank transfers and refunds for gym memberships",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "api": "/api/v1",
            "auth": "/api/v1/auth/login"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
