/// Admin-only endpoints
use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::app_state::AppState;
use crate::error::{AppError, Result};
use crate::middleware::PrincipalExt;

/// Runs the maintenance sweep synchronously and returns its stats.
/// Restricted to admin principals; the background loop already runs this
/// on `CLEANUP_INTERVAL_SECONDS`, this endpoint is for on-demand runs.
pub async fn cleanup(state: web::Data<Arc<AppState>>, principal: PrincipalExt) -> Result<HttpResponse> {
    if !principal.0.is_admin {
        return Err(AppError::Forbidden("admin cleanup requires an admin principal".into()));
    }

    let stats = crate::maintenance::run_sweep(&state).await?;
    Ok(HttpResponse::Ok().json(stats))
}
