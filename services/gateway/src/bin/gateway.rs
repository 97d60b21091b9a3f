//! services/gateway/src/bin/gateway.rs

use file_search_core::{
    Authenticator, DocumentCatalog, FileSearchService, OperationPoller, QueryGateway,
    RemoteStoreHandle, TokenAuthority,
};
use gateway_lib::{
    adapters::{GeminiClient, GeminiFileSearchAdapter, GeminiRagAdapter, JsonCredentialStore},
    config::Config,
    error::ApiError,
    web::{self, state::AppState},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting gateway...");

    // --- 2. Initialize Service Adapters ---
    let client = GeminiClient::new(
        &config.gemini_base_url,
        &config.gemini_api_key,
        config.request_timeout,
    )?;
    let file_search: Arc<dyn FileSearchService> =
        Arc::new(GeminiFileSearchAdapter::new(client.clone()));
    let generator = Arc::new(GeminiRagAdapter::new(client, config.gemini_model.clone()));
    let credentials = Arc::new(JsonCredentialStore::new(config.users_file.clone()));

    // --- 3. Session Signing Key ---
    let secret = match &config.session_secret {
        Some(secret) => secret.as_bytes().to_vec(),
        None => {
            warn!("SESSION_SECRET not set; sessions will not survive a restart.");
            TokenAuthority::generate_secret()
        }
    };
    let tokens = Arc::new(TokenAuthority::new(&secret)?);

    // --- 4. Load the Instruction Prefix ---
    let instruction_prefix = match tokio::fs::read_to_string(&config.prompt_path).await {
        Ok(prefix) => {
            info!("Loaded instruction prefix from {}", config.prompt_path.display());
            Some(prefix)
        }
        Err(e) => {
            warn!(
                "Could not read {} ({}); questions are sent without instructions",
                config.prompt_path.display(),
                e
            );
            None
        }
    };

    // --- 5. Prepare the Upload Staging Directory ---
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    // --- 6. Build the Core Services ---
    let store = Arc::new(
        RemoteStoreHandle::new(file_search.clone())
            .with_paging(config.store_page_size, config.pagination_max_pages),
    );
    let poller = OperationPoller::new(config.poll_interval, config.poll_max_attempts);
    let catalog = Arc::new(
        DocumentCatalog::new(store.clone(), file_search, poller)
            .with_paging(config.document_page_size, config.pagination_max_pages),
    );
    let query = Arc::new(QueryGateway::new(store.clone(), generator, instruction_prefix));
    let authenticator = Arc::new(Authenticator::new(credentials)?);

    // --- 7. Bind the Remote Store Before Accepting Traffic ---
    info!("Initializing file search store '{}'...", config.file_search_store_name);
    match store.acquire(&config.file_search_store_name).await {
        Ok(bound) => info!("Using file search store {} ({})", bound.display_name, bound.id),
        Err(e) => {
            error!("Failed to initialize the file search store: {}", e);
            error!("Check that GEMINI_API_KEY is valid and has File Search API access.");
            error!("Check connectivity to {}.", config.gemini_base_url);
            return Err(e.into());
        }
    }

    let app_state = Arc::new(AppState {
        config: config.clone(),
        tokens,
        authenticator,
        store,
        catalog,
        query,
    });

    // --- 8. Start the Server ---
    let app = web::router(app_state);
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
