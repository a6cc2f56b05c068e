/// Health, version, and Prometheus metrics endpoints
use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::app_state::AppState;
use crate::models::VersionResponse;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

pub async fn version(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let storage_backend = match state.config.storage.backend {
        crate::config::StorageBackend::Local => "local",
        crate::config::StorageBackend::S3 => "s3",
        crate::config::StorageBackend::R2 => "r2",
    };
    let queue_backend = match state.config.queue.backend {
        crate::config::QueueBackend::Memory => "memory",
        crate::config::QueueBackend::Redis => "redis",
        crate::config::QueueBackend::Sqs => "sqs",
    };

    HttpResponse::Ok().json(VersionResponse {
        app_name: state.config.app.name,
        app_version: state.config.app.version,
        queue_backend,
        storage_backend,
    })
}

pub async fn metrics(state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(state.metrics.gather())
}
