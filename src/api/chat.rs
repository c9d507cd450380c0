//! User and department conversation routes.

use crate::{
    api::{AppState, extract::AuthSession},
    core::{conversation, policy::Capability},
    entities::{ConversationModel, MessageModel, Participant, User},
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Path, State},
};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};

pub async fn list(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<Vec<ConversationModel>>> {
    auth.require(&state, Capability::Converse)?;
    let me = auth.participant()?;
    Ok(Json(conversation::list_conversations(&state.db, me).await?))
}

/// Users name a department to talk to, departments name a user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenConversation {
    department_id: Option<i64>,
    user_id: Option<i64>,
}

pub async fn open(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(body): Json<OpenConversation>,
) -> Result<Json<ConversationModel>> {
    auth.require(&state, Capability::Converse)?;
    let (user_id, department_id) = match (auth.participant()?, body) {
        (
            Participant::User(user_id),
            OpenConversation {
                department_id: Some(department_id),
                ..
            },
        ) => (user_id, department_id),
        (
            Participant::Department(department_id),
            OpenConversation {
                user_id: Some(user_id),
                ..
            },
        ) => {
            // Departments can only reply to existing accounts
            User::find_by_id(user_id)
                .one(&state.db)
                .await?
                .ok_or_else(|| Error::not_found("User", user_id))?;
            (user_id, department_id)
        }
        (Participant::User(_), _) => return Err(Error::bad_request("departmentId is required")),
        (Participant::Department(_), _) => return Err(Error::bad_request("userId is required")),
    };
    Ok(Json(
        conversation::open_conversation(&state.db, user_id, department_id).await?,
    ))
}

pub async fn messages(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(conversation_id): Path<i64>,
) -> Result<Json<Vec<MessageView>>> {
    auth.require(&state, Capability::Converse)?;
    let me = auth.participant()?;
    let messages = conversation::list_messages(&state.db, conversation_id, me).await?;
    Ok(Json(messages.into_iter().map(MessageView::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct NewMessage {
    text: String,
}

pub async fn send(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(conversation_id): Path<i64>,
    Json(body): Json<NewMessage>,
) -> Result<Json<MessageView>> {
    auth.require(&state, Capability::Converse)?;
    let me = auth.participant()?;
    let message = conversation::post_message(&state.db, conversation_id, me, &body.text).await?;
    Ok(Json(message.into()))
}

/// A message with its sender as a tagged participant.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    id: i64,
    conversation_id: i64,
    sender: Participant,
    text: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<MessageModel> for MessageView {
    fn from(message: MessageModel) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender: message.sender(),
            text: message.text,
            created_at: message.created_at,
        }
    }
}
