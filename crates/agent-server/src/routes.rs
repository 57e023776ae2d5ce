//! Router

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::handlers::{
    chat_handler, chat_stream_handler, clear_history, create_session, delete_api_key,
    get_session, health_check, list_models, put_api_key, update_settings,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))

        // Sessions and sidebar controls
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/api-key", put(put_api_key).delete(delete_api_key))
        .route("/api/sessions/{id}/settings", put(update_settings))
        .route("/api/sessions/{id}/clear", post(clear_history))

        // Agent
        .route("/api/sessions/{id}/chat", post(chat_handler))
        .route("/api/sessions/{id}/chat/stream", get(chat_stream_handler))

        // Static files (WASM frontend)
        .fallback_service(static_files)

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
