/// Upload handlers - HTTP endpoints for the chunked ingestion control plane
use std::sync::Arc;

use actix_web::http::header::HeaderValue;
use actix_web::{web, HttpRequest, HttpResponse};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use validator::Validate;

use crate::app_state::AppState;
use crate::error::{AppError, Result};
use crate::middleware::PrincipalExt;
use crate::models::InitUploadRequest;
use crate::services::UploadCoordinator;

fn idempotency_key(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Idempotency-Key")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

pub async fn init_upload(
    state: web::Data<Arc<AppState>>,
    principal: PrincipalExt,
    req: HttpRequest,
    body: web::Json<InitUploadRequest>,
) -> Result<HttpResponse> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let coordinator = UploadCoordinator::new(state.get_ref().clone());
    let response = coordinator
        .init(&principal.0, &body, idempotency_key(&req).as_deref())
        .await?;

    Ok(HttpResponse::Created().json(response))
}

pub async fn upload_chunk(
    state: web::Data<Arc<AppState>>,
    principal: PrincipalExt,
    path: web::Path<(String, i64)>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let (upload_id, chunk_index) = path.into_inner();

    let content_length = req
        .headers()
        .get(actix_web::http::header::CONTENT_LENGTH)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    let chunk_sha256 = req
        .headers()
        .get("X-Chunk-SHA256")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let coordinator = UploadCoordinator::new(state.get_ref().clone());
    let response = coordinator
        .upload_chunk(
            &principal.0,
            &upload_id,
            chunk_index,
            content_length,
            chunk_sha256.as_deref(),
            idempotency_key(&req).as_deref(),
            Bytes::from(body.to_vec()),
        )
        .await?;

    Ok(HttpResponse::Accepted().json(response))
}

pub async fn missing_chunks(
    state: web::Data<Arc<AppState>>,
    principal: PrincipalExt,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let coordinator = UploadCoordinator::new(state.get_ref().clone());
    let response = coordinator.missing_chunks(&principal.0, &path).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn complete_upload(
    state: web::Data<Arc<AppState>>,
    principal: PrincipalExt,
    path: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let coordinator = UploadCoordinator::new(state.get_ref().clone());
    let response = coordinator
        .complete(&principal.0, &path, idempotency_key(&req).as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn download(
    state: web::Data<Arc<AppState>>,
    principal: PrincipalExt,
    path: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let range_header = req
        .headers()
        .get(actix_web::http::header::RANGE)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let coordinator = UploadCoordinator::new(state.get_ref().clone());
    let plan = coordinator
        .download_plan(&principal.0, &path, range_header.as_deref())
        .await?;

    let storage = state.storage.clone();
    let body_stream = stream::iter(plan.segments).then(move |segment| {
        let storage = storage.clone();
        async move {
            let full = storage
                .read_chunk(&segment.storage_key)
                .await
                .map_err(actix_web::error::ErrorInternalServerError)?;
            Ok::<Bytes, actix_web::Error>(full.slice(segment.start..segment.end + 1))
        }
    });

    let mut builder = if plan.partial {
        HttpResponse::PartialContent()
    } else {
        HttpResponse::Ok()
    };

    builder.insert_header(("Accept-Ranges", "bytes"));
    builder.insert_header((
        "Content-Disposition",
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", plan.file_name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    ));
    builder.insert_header(("Content-Length", plan.content_length.to_string()));
    if let Some(content_range) = &plan.content_range {
        builder.insert_header(("Content-Range", content_range.clone()));
    }

    Ok(builder.streaming(body_stream))
}
