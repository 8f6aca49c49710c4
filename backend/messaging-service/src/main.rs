use actix_web::{middleware::Logger, web, App, HttpServer};
use messaging_service::{
    config::{self, MediaBackend, MessageStoreBackend},
    db, error,
    jobs::RetentionScheduler,
    logging, routes,
    services::{CommunicationGate, MessagingFacade, RetentionConfig, RetentionPolicyEngine},
    state::AppState,
    store::{
        InMemoryMessageStore, InMemoryRelationStore, LocalMediaStore, MediaStore, MessageStore,
        PgMessageStore, PgRelationStore, RelationStore, S3MediaStore,
    },
};
use std::sync::Arc;
use tokio::sync::broadcast;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let (messages, relations): (Arc<dyn MessageStore>, Arc<dyn RelationStore>) = match &cfg.store {
        MessageStoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = db::init_pool(database_url, *max_connections)
                .await
                .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;
            db::run_migrations(&pool)
                .await
                .map_err(|e| error::AppError::StartServer(format!("database migrations failed: {e}")))?;
            (
                Arc::new(PgMessageStore::new(pool.clone())),
                Arc::new(PgRelationStore::new(pool)),
            )
        }
        MessageStoreBackend::Memory => {
            tracing::warn!("MESSAGE_STORE=memory: messages are not persisted across restarts");
            (
                Arc::new(InMemoryMessageStore::new()),
                Arc::new(InMemoryRelationStore::new()),
            )
        }
    };

    let media: Arc<dyn MediaStore> = match &cfg.media {
        MediaBackend::Local { root } => {
            tracing::info!(root = %root.display(), "using local media store");
            Arc::new(LocalMediaStore::new(root.clone()))
        }
        MediaBackend::S3 { bucket } => {
            tracing::info!(bucket = %bucket, "using S3 media store");
            Arc::new(S3MediaStore::from_env(bucket.clone()).await)
        }
    };

    let retention = RetentionConfig::new(cfg.retention)?;
    let engine = RetentionPolicyEngine::new(
        messages.clone(),
        media.clone(),
        retention,
        cfg.store_timeout,
        cfg.schedule.sweep_concurrency,
    );
    let gate = CommunicationGate::new(messages.clone(), relations, cfg.store_timeout);
    let facade = Arc::new(MessagingFacade::new(
        messages,
        media,
        gate,
        engine.clone(),
        cfg.store_timeout,
    ));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let scheduler = Arc::new(RetentionScheduler::new(engine, cfg.schedule.clone()));
    let job_handles = scheduler.start(&shutdown_tx);

    let state = AppState { facade };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting messaging-service HTTP server");

    let server_result = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .configure(routes::configure_routes)
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind {bind_addr}: {e}")))?
    .run()
    .await;

    // HTTP server has stopped (SIGINT/SIGTERM); stop the sweep loops too
    let _ = shutdown_tx.send(());
    for handle in job_handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "retention job task panicked");
        }
    }

    server_result.map_err(|e| error::AppError::StartServer(format!("server: {e}")))
}
