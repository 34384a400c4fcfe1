use actix_web::{App, HttpServer, web};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use chat_relay::auth::{IdentityProvider, RestIdentityProvider, StaticIdentityProvider};
use chat_relay::chat::{ChatMessage, ChatRecord, ChatRequest, ChatRole};
use chat_relay::completion::GenAiBackend;
use chat_relay::config::AppConfig;
use chat_relay::handler::{AppState, chat};
use chat_relay::store::{ChatStore, MemoryChatStore, RestChatStore};

#[derive(OpenApi)]
#[openapi(
    paths(chat_relay::handler::chat),
    components(schemas(ChatRequest, ChatMessage, ChatRole, ChatRecord))
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let identity: Arc<dyn IdentityProvider> = match &config.auth {
        Some(endpoint) => Arc::new(RestIdentityProvider::new(
            endpoint.url.clone(),
            endpoint.key.clone(),
        )),
        None => {
            tracing::warn!("AUTH_URL not set; every session resolves to no user");
            Arc::new(StaticIdentityProvider::default())
        }
    };

    let store: Arc<dyn ChatStore> = match &config.database {
        Some(endpoint) => Arc::new(RestChatStore::new(
            endpoint.url.clone(),
            endpoint.key.clone(),
        )),
        None => {
            tracing::warn!("DATABASE_URL not set; transcripts are kept in memory only");
            Arc::new(MemoryChatStore::default())
        }
    };

    let bind = (config.host.clone(), config.port);
    let state = web::Data::new(AppState {
        config,
        identity,
        store,
        completions: Arc::new(GenAiBackend),
    });

    tracing::info!("Starting server at http://{}:{}/swagger-ui/", bind.0, bind.1);

    HttpServer::new(move || {
        App::new().app_data(state.clone()).service(chat).service(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()),
        )
    })
    .bind(bind)?
    .run()
    .await
}
