//! Storefront notification client.
//!
//! Runs the realtime notification path headless: connects to the notification
//! service, binds the user from `STOREFRONT_USER_ID` (if any) and logs store
//! changes until Ctrl-C.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_client::application::{AuthHandle, NotificationProvider};
use storefront_client::config::ClientConfig;
use storefront_client::infrastructure::http_client::{ApiClient, HttpNotificationsApi};
use storefront_client::infrastructure::messaging::ConnectionManager;
use storefront_client::state::SharedNotificationStore;
use storefront_domain::AuthUser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting storefront notification client");

    let config = ClientConfig::from_env()?;
    tracing::info!(
        ws_url = %config.ws_url,
        api_base_url = %config.api_base_url,
        "Configuration loaded"
    );

    let mut api = ApiClient::new(&config.api_base_url)?;
    if let Some(token) = &config.api_token {
        api = api.with_token(token.as_str());
    }

    let connection = ConnectionManager::websocket(config.connection());
    let store = SharedNotificationStore::new();
    let auth = AuthHandle::new();

    let provider = NotificationProvider::new(connection.clone(), store.clone())
        .with_api(Arc::new(HttpNotificationsApi::new(api)));
    let provider_task = tokio::spawn(provider.run(auth.subscribe()));

    let mut status = connection.observe_status();
    tokio::spawn(async move {
        while let Some(status) = status.changed().await {
            tracing::info!(status = %status, "Connection status");
        }
    });

    let mut changes = store.subscribe();
    tokio::spawn(async move {
        while let Some(snapshot) = changes.changed().await {
            let latest = snapshot
                .notifications
                .first()
                .map(|n| n.message().to_string())
                .unwrap_or_default();
            tracing::info!(
                total = snapshot.notifications.len(),
                unread = snapshot.unread_count,
                latest = %latest,
                "Notifications updated"
            );
        }
    });

    match &config.user_id {
        Some(user_id) => auth.login(AuthUser::new(user_id.clone())),
        None => {
            tracing::info!("STOREFRONT_USER_ID not set, connecting without a room");
            connection.connect();
        }
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    auth.logout();
    drop(auth);
    provider_task.await?;
    connection.disconnect();

    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
