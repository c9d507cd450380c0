//! HTTP interface - axum router, shared state and handlers.
//!
//! Handlers stay thin: authenticate, check the caller's capability, call into
//! `core`, serialize. Every error goes through `IntoResponse for Error`.

use crate::{
    config::settings::Settings,
    core::{assistant::Assistant, auth::TokenKeys, policy::Policy},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod auth;
mod chat;
mod chatbot;
mod department;
pub mod extract;
mod institution;
mod public;

/// Headroom above the upload limit for multipart framing and text fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Service settings
    pub settings: Arc<Settings>,
    /// Token signing keys
    pub keys: TokenKeys,
    /// Role to capability grants
    pub policy: Arc<Policy>,
    /// Chatbot backend
    pub assistant: Arc<dyn Assistant>,
}

/// Builds the full router with its middleware stack.
pub fn router(state: AppState) -> Router {
    let body_limit = state.settings.uploads.max_bytes + MULTIPART_OVERHEAD;

    let auth_routes = Router::new()
        .route("/institution/register", post(auth::register_institution))
        .route("/institution/login", post(auth::login_institution))
        .route("/department/register", post(auth::register_department))
        .route("/department/login", post(auth::login_department))
        .route("/user/register", post(auth::register_user))
        .route("/user/login", post(auth::login_user))
        .route("/logout", get(auth::logout))
        .route("/me", get(auth::me));

    let institution_routes = Router::new()
        .route("/link-department", post(institution::link_department))
        .route("/departments", get(institution::departments))
        .route("/upload-transactions", post(institution::upload_transactions))
        .route("/reports", get(institution::reports))
        .route("/anomalies", get(institution::anomalies))
        .route("/anomalies/:id", patch(institution::update_anomaly));

    let department_routes = Router::new()
        .route("/pending-transactions", get(department::pending_transactions))
        .route("/verify-transaction/:id", patch(department::verify_transaction))
        .route("/upload-spending", post(department::upload_spending));

    let public_routes = Router::new()
        .route("/institutions", get(public::institutions))
        .route("/flowchart/:institution_id", get(public::flowchart))
        .route(
            "/analytics/:institution_id/department-share",
            get(public::department_share),
        )
        .route(
            "/analytics/:institution_id/spending-trend",
            get(public::spending_trend),
        );

    let chatbot_routes = Router::new()
        .route("/session", post(chatbot::open_session))
        .route("/session/:id", get(chatbot::session_history))
        .route("/session/:id/message", post(chatbot::ask));

    let chat_routes = Router::new()
        .route("/", get(chat::list).post(chat::open))
        .route("/:conversation_id/messages", get(chat::messages).post(chat::send));

    Router::new()
        .nest("/auth", auth_routes)
        .nest("/institution", institution_routes)
        .nest("/department", department_routes)
        .nest("/public", public_routes)
        .nest("/chatbot", chatbot_routes)
        .nest("/chat", chat_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CookieManagerLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
