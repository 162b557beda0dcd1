use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, games, health, rulebooks, submissions, users};
use crate::server::state::AppState;

/// Room for multipart boundaries and the small form fields next to the file
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Creates the application router.
///
/// `/` and `/health` sit at the root; everything else is nested under
/// `server.api_prefix`.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state);
    let body_limit = state
        .config
        .server
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    let api = Router::new()
        .route("/ping", get(health::ping))
        .route("/rulebooks/upload", post(rulebooks::upload_rulebook))
        .route(
            "/rulebooks/:rulebook_id",
            get(rulebooks::get_rulebook).delete(rulebooks::delete_rulebook),
        )
        .route("/games", get(games::list_games).post(games::create_game))
        .route(
            "/games/:game_id",
            get(games::get_game).delete(games::delete_game),
        )
        .route("/games/:game_id/rulebooks", get(games::list_game_rulebooks))
        .route("/games/:game_id/ask", post(games::ask))
        .route("/chat/:session_id", get(chat::get_history))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/submissions",
            get(submissions::list_submissions).post(submissions::create_submission),
        );

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .nest(&state.config.server.api_prefix, api)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(state: &Arc<AppState>) -> CorsLayer {
    let origins = state
        .config
        .server
        .cors_allowed_origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}
