//! Direct conversations between users and departments.

use crate::{
    core::institution::get_department,
    entities::{Conversation, Message, Participant, conversation, message},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};

/// Returns the conversation between `user_id` and `department_id`, opening it if needed.
pub async fn open_conversation(
    db: &DatabaseConnection,
    user_id: i64,
    department_id: i64,
) -> Result<conversation::Model> {
    get_department(db, department_id).await?;

    if let Some(existing) = find_conversation(db, user_id, department_id).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let inserted = conversation::ActiveModel {
        user_id: Set(user_id),
        department_id: Set(department_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await;

    match inserted {
        Ok(conversation) => Ok(conversation),
        Err(e) => find_conversation(db, user_id, department_id)
            .await?
            .ok_or_else(|| e.into()),
    }
}

async fn find_conversation(
    db: &DatabaseConnection,
    user_id: i64,
    department_id: i64,
) -> Result<Option<conversation::Model>> {
    Conversation::find()
        .filter(conversation::Column::UserId.eq(user_id))
        .filter(conversation::Column::DepartmentId.eq(department_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists the conversations `participant` takes part in, most recently active first.
pub async fn list_conversations(
    db: &DatabaseConnection,
    participant: Participant,
) -> Result<Vec<conversation::Model>> {
    let filter = match participant {
        Participant::User(id) => conversation::Column::UserId.eq(id),
        Participant::Department(id) => conversation::Column::DepartmentId.eq(id),
    };
    Conversation::find()
        .filter(filter)
        .order_by_desc(conversation::Column::UpdatedAt)
        .order_by_desc(conversation::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

const fn is_participant(conversation: &conversation::Model, participant: Participant) -> bool {
    match participant {
        Participant::User(id) => conversation.user_id == id,
        Participant::Department(id) => conversation.department_id == id,
    }
}

async fn joined_conversation<C>(
    db: &C,
    conversation_id: i64,
    participant: Participant,
) -> Result<conversation::Model>
where
    C: ConnectionTrait,
{
    let conversation = Conversation::find_by_id(conversation_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Conversation", conversation_id))?;
    if !is_participant(&conversation, participant) {
        return Err(Error::unauthorized("Not a participant in this conversation"));
    }
    Ok(conversation)
}

/// Sends `text` from `sender` into a conversation it belongs to.
#[tracing::instrument(skip(db, text))]
pub async fn post_message(
    db: &DatabaseConnection,
    conversation_id: i64,
    sender: Participant,
    text: &str,
) -> Result<message::Model> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::bad_request("Message cannot be empty"));
    }

    let txn = db.begin().await?;
    let conversation = joined_conversation(&txn, conversation_id, sender).await?;
    let (sender_kind, sender_id) = sender.into_columns();
    let now = Utc::now();

    let message = message::ActiveModel {
        conversation_id: Set(conversation_id),
        sender_kind: Set(sender_kind),
        sender_id: Set(sender_id),
        text: Set(text.to_string()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut active: conversation::ActiveModel = conversation.into();
    active.updated_at = Set(now);
    active.update(&txn).await?;
    txn.commit().await?;

    Ok(message)
}

/// Lists a conversation's messages, oldest first.
pub async fn list_messages(
    db: &DatabaseConnection,
    conversation_id: i64,
    participant: Participant,
) -> Result<Vec<message::Model>> {
    joined_conversation(db, conversation_id, participant).await?;
    Message::find()
        .filter(message::Column::ConversationId.eq(conversation_id))
        .order_by_asc(message::Column::CreatedAt)
        .order_by_asc(message::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
