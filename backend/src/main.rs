use std::sync::Arc;
use backend::{
    build_rocket,
    config::{ServerConfig, StoreKind},
    document::DocumentStore,
    store::{MemoryStore, PollStore},
};
use shuttle_runtime::CustomError;
use sqlx::PgPool;
use tracing::info;

#[shuttle_runtime::main]
async fn rocket(
    #[shuttle_shared_db::Postgres] pool: PgPool,
    #[shuttle_runtime::Secrets] secret_store: shuttle_runtime::SecretStore,
) -> shuttle_rocket::ShuttleRocket {
    info!("🚀 Starting poll server");

    let config = ServerConfig::from_lookup(|key| secret_store.get(key)).map_err(CustomError::new)?;

    let store: Arc<dyn PollStore> = match config.store {
        StoreKind::Memory => {
            info!("Utilising in-memory poll store");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Document => {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(CustomError::new)?;
            info!("📋 Migrations complete, using document store");
            Arc::new(DocumentStore::new(pool))
        }
    };

    info!(
        "Subscriber queue capacity {}, hub mailbox capacity {}",
        config.hub.queue_capacity, config.hub.mailbox_capacity
    );

    Ok(build_rocket(&config, store).into())
}
