//! Chatbot business logic - per (user, institution) assistant sessions.
//!
//! Each question is answered by the configured [`Assistant`] with a context
//! built from the institution's allocation ledger and the session history.
//! The question and the reply are stored together only after the assistant
//! succeeds, so a failed call leaves the session unchanged.

use crate::{
    config::settings::ChatbotSettings,
    core::{
        assistant::{Assistant, AssistantRequest, Turn},
        institution::get_institution,
        transaction::get_transactions_for_institution,
    },
    entities::{ChatRole, ChatbotEntry, ChatbotSession, chatbot_entry, chatbot_session, transaction},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};

/// Bounds on what is sent to the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    /// Most recent history entries kept
    pub max_history_entries: usize,
    /// Character budget for the whole request
    pub max_context_chars: usize,
}

impl From<&ChatbotSettings> for ContextWindow {
    fn from(settings: &ChatbotSettings) -> Self {
        Self {
            max_history_entries: settings.max_history_entries,
            max_context_chars: settings.max_context_chars,
        }
    }
}

fn ledger_line(txn: &transaction::Model) -> String {
    format!(
        "{} | department {} | {} | {:.2} | {} | {}",
        txn.date,
        txn.department_id,
        txn.vendor,
        txn.amount,
        txn.status.label(),
        txn.description
    )
}

impl ContextWindow {
    /// Builds the assistant request.
    ///
    /// `ledger` is newest first and `history` oldest first. While the request
    /// is over budget the oldest history turns go first, then the oldest
    /// ledger lines. The header and the question are always kept.
    #[must_use]
    pub fn build(
        &self,
        institution_name: &str,
        ledger: &[transaction::Model],
        history: &[chatbot_entry::Model],
        question: &str,
    ) -> AssistantRequest {
        let header = format!(
            "You answer questions about the public finances of {institution_name}. \
             Base your answers on the allocation ledger below \
             (date | department | vendor | amount | status | description), newest first."
        );
        let mut lines: Vec<String> = ledger.iter().map(ledger_line).collect();

        let skip = history.len().saturating_sub(self.max_history_entries);
        let mut turns: Vec<Turn> = history[skip..]
            .iter()
            .map(|entry| Turn {
                role: entry.role,
                text: entry.text.clone(),
            })
            .collect();
        turns.push(Turn {
            role: ChatRole::User,
            text: question.to_string(),
        });

        let assemble = |lines: &[String], turns: Vec<Turn>| {
            let mut system = header.clone();
            for line in lines {
                system.push('\n');
                system.push_str(line);
            }
            AssistantRequest { system, turns }
        };

        let mut request = assemble(&lines, turns);
        // The question is the last turn and is never dropped
        while request.char_len() > self.max_context_chars && request.turns.len() > 1 {
            request.turns.remove(0);
        }
        while request.char_len() > self.max_context_chars && !lines.is_empty() {
            lines.pop();
            request = assemble(&lines, request.turns);
        }
        request
    }
}

/// Returns the session for (`user_id`, `institution_id`), creating it if needed.
pub async fn get_or_create_session(
    db: &DatabaseConnection,
    user_id: i64,
    institution_id: i64,
) -> Result<chatbot_session::Model> {
    get_institution(db, institution_id).await?;

    if let Some(existing) = find_session(db, user_id, institution_id).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let inserted = chatbot_session::ActiveModel {
        user_id: Set(user_id),
        institution_id: Set(institution_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await;

    match inserted {
        Ok(session) => {
            tracing::info!(
                "Created chatbot session {} for user {} and institution {}",
                session.id,
                user_id,
                institution_id
            );
            Ok(session)
        }
        // A concurrent request won the unique index
        Err(e) => find_session(db, user_id, institution_id)
            .await?
            .ok_or_else(|| e.into()),
    }
}

async fn find_session<C>(
    db: &C,
    user_id: i64,
    institution_id: i64,
) -> Result<Option<chatbot_session::Model>>
where
    C: ConnectionTrait,
{
    ChatbotSession::find()
        .filter(chatbot_session::Column::UserId.eq(user_id))
        .filter(chatbot_session::Column::InstitutionId.eq(institution_id))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn owned_session<C>(db: &C, user_id: i64, session_id: i64) -> Result<chatbot_session::Model>
where
    C: ConnectionTrait,
{
    let session = ChatbotSession::find_by_id(session_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Chatbot session", session_id))?;
    if session.user_id != user_id {
        return Err(Error::unauthorized("This chatbot session belongs to another user"));
    }
    Ok(session)
}

async fn session_entries<C>(db: &C, session_id: i64) -> Result<Vec<chatbot_entry::Model>>
where
    C: ConnectionTrait,
{
    ChatbotEntry::find()
        .filter(chatbot_entry::Column::SessionId.eq(session_id))
        .order_by_asc(chatbot_entry::Column::Position)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Returns the history of a session owned by `user_id`, oldest first.
pub async fn get_session_entries(
    db: &DatabaseConnection,
    user_id: i64,
    session_id: i64,
) -> Result<(chatbot_session::Model, Vec<chatbot_entry::Model>)> {
    let session = owned_session(db, user_id, session_id).await?;
    let entries = session_entries(db, session_id).await?;
    Ok((session, entries))
}

/// Asks the assistant `question` in session `session_id` and stores the exchange.
///
/// Returns the two new entries (user question, model reply).
#[tracing::instrument(skip(db, assistant, question))]
pub async fn post_message(
    db: &DatabaseConnection,
    assistant: &dyn Assistant,
    window: ContextWindow,
    user_id: i64,
    session_id: i64,
    question: &str,
) -> Result<(chatbot_entry::Model, chatbot_entry::Model)> {
    let session = owned_session(db, user_id, session_id).await?;
    let question = question.trim();
    if question.is_empty() {
        return Err(Error::bad_request("Question cannot be empty"));
    }

    let institution = get_institution(db, session.institution_id).await?;
    let ledger = get_transactions_for_institution(db, session.institution_id).await?;
    let history = session_entries(db, session_id).await?;
    let request = window.build(&institution.name, &ledger, &history, question);

    let reply = assistant.generate(&request).await.inspect_err(|e| {
        tracing::warn!("Assistant call failed for session {}: {}", session_id, e);
    })?;

    let txn = db.begin().await?;
    let last: Option<Option<i32>> = ChatbotEntry::find()
        .select_only()
        .column_as(Expr::col(chatbot_entry::Column::Position).max(), "max_position")
        .filter(chatbot_entry::Column::SessionId.eq(session_id))
        .into_tuple()
        .one(&txn)
        .await?;
    let next = last.flatten().map_or(0, |p| p + 1);
    let now = Utc::now();

    let user_entry = chatbot_entry::ActiveModel {
        session_id: Set(session_id),
        position: Set(next),
        role: Set(ChatRole::User),
        text: Set(question.to_string()),
        timestamp: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    let model_entry = chatbot_entry::ActiveModel {
        session_id: Set(session_id),
        position: Set(next + 1),
        role: Set(ChatRole::Model),
        text: Set(reply),
        timestamp: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut active: chatbot_session::ActiveModel = session.into();
    active.updated_at = Set(now);
    active.update(&txn).await?;
    txn.commit().await?;

    Ok((user_entry, model_entry))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::TransactionStatus;
    use crate::test_utils::*;

    const WIDE: ContextWindow = ContextWindow {
        max_history_entries: 20,
        max_context_chars: 100_000,
    };

    fn entry(position: i32, role: ChatRole, text: &str) -> chatbot_entry::Model {
        chatbot_entry::Model {
            id: i64::from(position) + 1,
            session_id: 1,
            position,
            role,
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_window_keeps_recent_history() {
        let history = vec![
            entry(0, ChatRole::User, "q1"),
            entry(1, ChatRole::Model, "a1"),
            entry(2, ChatRole::User, "q2"),
            entry(3, ChatRole::Model, "a2"),
        ];
        let window = ContextWindow {
            max_history_entries: 2,
            ..WIDE
        };
        let request = window.build("City", &[], &history, "q3");
        let texts: Vec<&str> = request.turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q2", "a2", "q3"]);
        assert!(request.system.contains("City"));
    }

    #[test]
    fn test_window_drops_history_before_question() {
        let history = vec![
            entry(0, ChatRole::User, &"x".repeat(500)),
            entry(1, ChatRole::Model, &"y".repeat(500)),
        ];
        let budget = WIDE.build("City", &[], &[], "question").char_len() + 10;
        let window = ContextWindow {
            max_context_chars: budget,
            ..WIDE
        };
        let request = window.build("City", &[], &history, "question");
        assert_eq!(request.turns.len(), 1);
        assert_eq!(request.turns[0].text, "question");
        assert!(request.char_len() <= budget);
    }

    #[tokio::test]
    async fn test_get_or_create_session_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let inst = create_test_institution(&db, "City").await?;
        let user = create_test_user(&db, "alice").await?;

        let first = get_or_create_session(&db, user.id, inst.id).await?;
        let second = get_or_create_session(&db, user.id, inst.id).await?;
        assert_eq!(first.id, second.id);
        assert_eq!(ChatbotSession::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_session_for_unknown_institution() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let result = get_or_create_session(&db, user.id, 99).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_post_message_appends_both_entries() -> Result<()> {
        let (db, inst, dept) = setup_linked_department().await?;
        create_test_allocation(&db, inst.id, dept.id, 1000.0, TransactionStatus::Completed).await?;
        let user = create_test_user(&db, "alice").await?;
        let session = get_or_create_session(&db, user.id, inst.id).await?;
        let assistant = ScriptedAssistant::replying("Roads received $1000.");

        let (asked, answered) =
            post_message(&db, &assistant, WIDE, user.id, session.id, "Where did money go?").await?;
        assert_eq!(asked.position, 0);
        assert_eq!(answered.position, 1);
        assert_eq!(answered.role, ChatRole::Model);

        post_message(&db, &assistant, WIDE, user.id, session.id, "And then?").await?;
        let (_, entries) = get_session_entries(&db, user.id, session.id).await?;
        let positions: Vec<i32> = entries.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);

        // The second request carried the ledger and the first exchange
        let requests = assistant.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].system.contains("Test vendor"));
        assert_eq!(requests[1].turns.len(), 3);
        assert_eq!(requests[1].turns[1].text, "Roads received $1000.");
        Ok(())
    }

    #[tokio::test]
    async fn test_assistant_failure_persists_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let inst = create_test_institution(&db, "City").await?;
        let user = create_test_user(&db, "alice").await?;
        let session = get_or_create_session(&db, user.id, inst.id).await?;

        let result = post_message(
            &db,
            &ScriptedAssistant::failing(),
            WIDE,
            user.id,
            session.id,
            "Anything?",
        )
        .await;
        assert!(matches!(result, Err(Error::Assistant { .. })));
        assert_eq!(ChatbotEntry::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_post_message_checks_owner_and_question() -> Result<()> {
        let db = setup_test_db().await?;
        let inst = create_test_institution(&db, "City").await?;
        let alice = create_test_user(&db, "alice").await?;
        let bob = create_test_user(&db, "bob").await?;
        let session = get_or_create_session(&db, alice.id, inst.id).await?;
        let assistant = ScriptedAssistant::replying("ok");

        let foreign = post_message(&db, &assistant, WIDE, bob.id, session.id, "hi").await;
        assert!(matches!(foreign, Err(Error::Unauthorized { .. })));

        let blank = post_message(&db, &assistant, WIDE, alice.id, session.id, "   ").await;
        assert!(matches!(blank, Err(Error::BadRequest { .. })));

        assert!(assistant.requests().is_empty());
        Ok(())
    }
}
