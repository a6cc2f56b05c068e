/// Chunked ingestion service - HTTP server
use std::io;
use std::sync::Arc;

use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use chunked_ingest::app_state::AppState;
use chunked_ingest::middleware::{ApiRateLimitMiddleware, AuthMiddleware, MetricsMiddleware, RequestIdMiddleware};
use chunked_ingest::{handlers, Config};
use tokio::task::JoinSet;

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env().expect("failed to load configuration");
    chunked_ingest::auth::init_jwt_key(&config.auth).expect("failed to initialize JWT decoding key");

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    let consumer_count = config.queue.consumer_count;
    let uses_durable_queue = !matches!(config.queue.backend, chunked_ingest::config::QueueBackend::Memory);

    let state = Arc::new(
        AppState::build(config)
            .await
            .map_err(|e| io::Error::other(format!("failed to build application state: {e}")))?,
    );

    let mut tasks = JoinSet::new();

    {
        let state = state.clone();
        tasks.spawn(async move {
            tracing::info!("maintenance sweep loop starting");
            chunked_ingest::maintenance::run_loop(state).await;
            Ok(())
        });
    }

    {
        let state = state.clone();
        tasks.spawn(async move {
            tracing::info!("autoscaler loop starting");
            chunked_ingest::autoscaler::run_loop(state).await;
            Ok(())
        });
    }

    if uses_durable_queue {
        for consumer_id in 0..consumer_count {
            let state = state.clone();
            tasks.spawn(async move {
                tracing::info!(consumer_id, "durable queue consumer starting");
                chunked_ingest::queue::consumer::run(state, consumer_id).await;
                Ok(())
            });
        }
    }

    let http_state = state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(http_state.clone()))
            .wrap(actix_middleware::Logger::default())
            .wrap(ApiRateLimitMiddleware::new(http_state.clone()))
            .wrap(AuthMiddleware::new(http_state.clone()))
            .wrap(MetricsMiddleware::new(http_state.clone()))
            .wrap(RequestIdMiddleware::new(http_state.config.app.version))
            .route("/health", web::get().to(handlers::health::health))
            .route("/version", web::get().to(handlers::health::version))
            .route("/metrics", web::get().to(handlers::health::metrics))
            .service(
                web::scope("/v1/uploads")
                    .route("/init", web::post().to(handlers::uploads::init_upload))
                    .route(
                        "/{upload_id}/chunks/{chunk_index}",
                        web::put().to(handlers::uploads::upload_chunk),
                    )
                    .route(
                        "/{upload_id}/missing-chunks",
                        web::get().to(handlers::uploads::missing_chunks),
                    )
                    .route("/{upload_id}/complete", web::post().to(handlers::uploads::complete_upload))
                    .route("/{upload_id}/download", web::get().to(handlers::uploads::download)),
            )
            .service(web::scope("/v1/admin").route("/cleanup", web::post().to(handlers::admin::cleanup)))
    })
    .bind(&bind_address)?
    .run();

    tasks.spawn(async move {
        tracing::info!(%bind_address, "HTTP server is running");
        server.await
    });

    let mut first_error = None;
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(())) => tracing::warn!("background task completed"),
            Ok(Err(e)) => {
                tracing::error!("task error: {e}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(e) => {
                tracing::error!("task join error: {e}");
                if first_error.is_none() {
                    first_error = Some(io::Error::other(format!("{e}")));
                }
            }
        }
    }

    tracing::info!("chunked-ingest shutting down");
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
