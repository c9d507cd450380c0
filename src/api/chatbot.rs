//! Assistant session routes for users.

use crate::{
    api::{AppState, extract::AuthSession},
    core::{
        chatbot::{self, ContextWindow},
        policy::Capability,
    },
    entities::{ChatbotEntryModel, ChatbotSessionModel},
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSession {
    institution_id: i64,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    session: ChatbotSessionModel,
    entries: Vec<ChatbotEntryModel>,
}

pub async fn open_session(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(body): Json<OpenSession>,
) -> Result<Json<SessionView>> {
    let me = auth.require(&state, Capability::UseChatbot)?;
    let session = chatbot::get_or_create_session(&state.db, me.id, body.institution_id).await?;
    let (session, entries) = chatbot::get_session_entries(&state.db, me.id, session.id).await?;
    Ok(Json(SessionView { session, entries }))
}

pub async fn session_history(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(id): Path<i64>,
) -> Result<Json<SessionView>> {
    let me = auth.require(&state, Capability::UseChatbot)?;
    let (session, entries) = chatbot::get_session_entries(&state.db, me.id, id).await?;
    Ok(Json(SessionView { session, entries }))
}

#[derive(Debug, Deserialize)]
pub struct Question {
    question: String,
}

#[derive(Debug, Serialize)]
pub struct Exchange {
    question: ChatbotEntryModel,
    answer: ChatbotEntryModel,
}

pub async fn ask(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(id): Path<i64>,
    Json(body): Json<Question>,
) -> Result<Json<Exchange>> {
    let me = auth.require(&state, Capability::UseChatbot)?;
    let window = ContextWindow::from(&state.settings.chatbot);
    let (question, answer) = chatbot::post_message(
        &state.db,
        state.assistant.as_ref(),
        window,
        me.id,
        id,
        &body.question,
    )
    .await?;
    Ok(Json(Exchange { question, answer }))
}
