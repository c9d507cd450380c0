//! Registration, login and logout for all three account kinds.

use crate::{
    api::{
        AppState,
        extract::{AuthSession, expired_cookie, session_cookie},
    },
    core::auth::{self, Identity},
    errors::Result,
};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

#[derive(Debug, Deserialize)]
pub struct NamedCredentials {
    name: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRegistration {
    department_code: String,
    name: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentCredentials {
    department_code: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    token: String,
    identity: Identity,
}

fn start_session(state: &AppState, cookies: &Cookies, identity: Identity) -> Result<Json<SessionResponse>> {
    let token = state.keys.issue_token(&identity)?;
    cookies.add(session_cookie(token.clone(), state.keys.ttl_seconds()));
    tracing::info!("{} {} signed in", identity.role, identity.id);
    Ok(Json(SessionResponse { token, identity }))
}

pub async fn register_institution(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<NamedCredentials>,
) -> Result<Json<SessionResponse>> {
    let identity = auth::register_institution(&state.db, &body.name, &body.password).await?;
    start_session(&state, &cookies, identity)
}

pub async fn login_institution(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<NamedCredentials>,
) -> Result<Json<SessionResponse>> {
    let identity = auth::login_institution(&state.db, &body.name, &body.password).await?;
    start_session(&state, &cookies, identity)
}

pub async fn register_department(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<DepartmentRegistration>,
) -> Result<Json<SessionResponse>> {
    let identity = auth::register_department(
        &state.db,
        &body.department_code,
        &body.name,
        &body.password,
    )
    .await?;
    start_session(&state, &cookies, identity)
}

pub async fn login_department(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<DepartmentCredentials>,
) -> Result<Json<SessionResponse>> {
    let identity =
        auth::login_department(&state.db, &body.department_code, &body.password).await?;
    start_session(&state, &cookies, identity)
}

pub async fn register_user(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<NamedCredentials>,
) -> Result<Json<SessionResponse>> {
    let identity = auth::register_user(&state.db, &body.name, &body.password).await?;
    start_session(&state, &cookies, identity)
}

pub async fn login_user(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<NamedCredentials>,
) -> Result<Json<SessionResponse>> {
    let identity = auth::login_user(&state.db, &body.name, &body.password).await?;
    start_session(&state, &cookies, identity)
}

pub async fn logout(cookies: Cookies) -> Json<serde_json::Value> {
    cookies.remove(expired_cookie());
    Json(serde_json::json!({ "message": "Logged out" }))
}

pub async fn me(AuthSession(identity): AuthSession) -> Json<Identity> {
    Json(identity)
}
