use ledgerlight::{
    api::{self, AppState},
    config::{database, secrets, settings},
    core::{assistant::GeminiAssistant, auth::TokenKeys, policy::Policy},
    errors::Result,
};
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Settings file and secrets
    let settings = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;
    let secrets =
        secrets::load_secrets().inspect_err(|e| error!("Failed to load secrets: {}", e))?;

    // 4. Database
    let database_url = database::get_database_url();
    let db = database::create_connection(&database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Shared state
    let assistant = GeminiAssistant::new(
        settings.chatbot.api_base.clone(),
        settings.chatbot.model.clone(),
        secrets.gemini_api_key.clone(),
    );
    let state = AppState {
        db,
        keys: TokenKeys::new(secrets.jwt_secret.as_bytes(), settings.auth.token_ttl_hours),
        policy: Arc::new(Policy::standard()),
        assistant: Arc::new(assistant),
        settings: Arc::new(settings),
    };

    // 6. Serve until Ctrl-C
    let bind_address = state.settings.server.bind_address.clone();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", bind_address, e))?;
    info!("Listening on {}", bind_address);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
