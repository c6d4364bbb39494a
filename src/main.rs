use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studydash::api::router;
use studydash::config::{AppConfig, StoreBackend};
use studydash::identity::{IdentityProvider, StaticIdentity};
use studydash::realtime::{ChangeFeed, PollingChangeFeed};
use studydash::services::{MutationService, SyncController};
use studydash::state::AppState;
use studydash::store::RemoteStore;
use studydash::store::sqlite::SqliteStore;
use studydash::store::supabase::SupabaseClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "studydash=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let (store, feed, identity): (
        Arc<dyn RemoteStore>,
        Arc<dyn ChangeFeed>,
        Arc<dyn IdentityProvider>,
    ) = match config.backend {
        StoreBackend::Sqlite {
            database_url,
            user_id,
        } => {
            let store = SqliteStore::connect(&database_url).await?;
            let feed = store.feed();
            (
                Arc::new(store),
                feed,
                Arc::new(StaticIdentity::new(user_id)),
            )
        }
        StoreBackend::Supabase(supabase) => {
            info!("using hosted store at {}", supabase.url);
            let client = Arc::new(SupabaseClient::new(supabase)?);
            let feed = PollingChangeFeed::new(client.clone(), config.realtime_poll_secs);
            (client.clone(), Arc::new(feed), client)
        }
    };

    let controller = SyncController::new(store.clone(), feed, identity.clone());
    controller.start().await;

    let mutations = Arc::new(MutationService::new(store, identity, controller.clone()));
    let state = AppState {
        controller: controller.clone(),
        mutations,
    };

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    controller.shutdown().await;
    Ok(())
}
