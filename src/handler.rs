//! The chat endpoint: validate, authorize, stream, persist.

use actix_web::{HttpRequest, HttpResponse, post, web};
use futures::stream::Stream;
use futures_util::StreamExt;
use std::sync::Arc;

use crate::auth::IdentityProvider;
use crate::chat::{ChatMessage, ChatRecord, ChatRequest};
use crate::completion::{CompletionBackend, CompletionStream};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::store::ChatStore;

/// Server-controlled system directive prepended to every upstream
/// conversation. Never persisted and never client-overridable.
const SYSTEM_DIRECTIVE: &str = "reply in french";

/// Shared per-process dependencies, wired once in `main`.
pub struct AppState {
    pub config: AppConfig,
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn ChatStore>,
    pub completions: Arc<dyn CompletionBackend>,
}

#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Incremental completion text", content_type = "text/plain"),
        (status = 400, description = "Malformed body or invalid messages"),
        (status = 401, description = "No authenticated user for the session"),
        (status = 500, description = "Identity provider or completion service failure")
    )
)]
#[post("/api/chat")]
pub async fn chat(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let request = parse_chat_request(&body)?;

    let session_token = req
        .cookie(&state.config.session_cookie)
        .map(|cookie| cookie.value().to_string());

    let user = match state.identity.resolve_user(session_token.as_deref()).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(ApiError::Unauthenticated),
        Err(e) => {
            tracing::error!("identity resolution failed: {e}");
            return Err(ApiError::AuthProvider(e));
        }
    };

    let mut upstream_messages = Vec::with_capacity(request.messages.len() + 1);
    upstream_messages.push(ChatMessage::system(SYSTEM_DIRECTIVE));
    upstream_messages.extend(request.messages.iter().cloned());

    // The preview token, when present, replaces the process credential for
    // this call only.
    let credential = request
        .preview_token
        .as_deref()
        .unwrap_or(&state.config.openai_api_key);

    let upstream = match state
        .completions
        .stream_completion(&upstream_messages, credential)
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("completion invocation failed: {e}");
            return Err(ApiError::Upstream(e));
        }
    };

    let body_stream = relay_stream(
        upstream,
        request.messages,
        request.id,
        user.id,
        state.store.clone(),
    );

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .streaming(body_stream))
}

/// Two-phase body parse: JSON first, then the `messages` shape check, so the
/// two failure modes surface as distinct 400 responses.
fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
        tracing::warn!("rejecting unparsable request body: {e}");
        ApiError::MalformedBody(e)
    })?;

    match value.get("messages") {
        Some(serde_json::Value::Array(messages)) if !messages.is_empty() => {}
        _ => return Err(ApiError::InvalidPayload),
    }

    serde_json::from_value(value).map_err(|_| ApiError::InvalidPayload)
}

/// Forwards upstream chunks to the client as they arrive, then persists the
/// full transcript as the stream's final act.
///
/// The upsert runs inside the same generator, after the last chunk has been
/// yielded to the transport; it is never a detached job, so no work outlives
/// the request. If the client disconnects mid-stream the generator is
/// dropped, which cancels the upstream call and skips persistence. A broken
/// upstream stream aborts the body with an error, so the client sees a
/// truncated response rather than a clean end, and skips persistence:
/// partial completions are never written. Upsert failures are logged and
/// swallowed; the client has already received its response.
fn relay_stream(
    mut upstream: CompletionStream,
    original_messages: Vec<ChatMessage>,
    request_id: Option<String>,
    user_id: String,
    store: Arc<dyn ChatStore>,
) -> impl Stream<Item = Result<web::Bytes, actix_web::Error>> {
    async_stream::stream! {
        let mut completion = String::new();

        while let Some(item) = upstream.next().await {
            match item {
                Ok(chunk) => {
                    completion.push_str(&chunk);
                    yield Ok(web::Bytes::from(chunk));
                }
                Err(e) => {
                    tracing::error!("completion stream broke mid-response: {e}");
                    yield Err(actix_web::error::ErrorInternalServerError(
                        "completion stream failed",
                    ));
                    return;
                }
            }
        }

        let record = ChatRecord::assemble(request_id, &user_id, original_messages, completion);
        match store.upsert(&record).await {
            Ok(()) => tracing::debug!(chat_id = %record.id, "chat transcript persisted"),
            Err(e) => tracing::error!(chat_id = %record.id, "chat upsert failed: {e}"),
        }
    }
}
