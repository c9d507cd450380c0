//! Database configuration module for Ledgerlight.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. The composite unique indexes that
//! back "one per pair" rules (chatbot sessions, conversations) are created here too.

use crate::entities::{
    Anomaly, ChatbotEntry, ChatbotSession, Conversation, Department, DepartmentTransaction,
    Institution, Message, Report, Transaction, User, chatbot_session, conversation,
};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, sea_query::Index,
};

/// Default database location when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/ledgerlight.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database at `database_url`.
///
/// For file-backed `SQLite` URLs the parent directory is created first so a
/// fresh checkout can start without manual setup.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(path) = sqlite_file_path(database_url) {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    Database::connect(database_url).await.map_err(Into::into)
}

fn sqlite_file_path(database_url: &str) -> Option<&str> {
    let rest = database_url.strip_prefix("sqlite://")?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.contains(":memory:") {
        None
    } else {
        Some(path)
    }
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables and composite indexes. Safe to call on every start.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    // Referenced tables first
    create_table(db, &schema, Institution).await?;
    create_table(db, &schema, Department).await?;
    create_table(db, &schema, User).await?;
    create_table(db, &schema, Report).await?;
    create_table(db, &schema, Transaction).await?;
    create_table(db, &schema, DepartmentTransaction).await?;
    create_table(db, &schema, Anomaly).await?;
    create_table(db, &schema, ChatbotSession).await?;
    create_table(db, &schema, ChatbotEntry).await?;
    create_table(db, &schema, Conversation).await?;
    create_table(db, &schema, Message).await?;

    let session_pair = Index::create()
        .name("idx_chatbot_sessions_user_institution")
        .table(ChatbotSession)
        .col(chatbot_session::Column::UserId)
        .col(chatbot_session::Column::InstitutionId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&session_pair)).await?;

    let conversation_pair = Index::create()
        .name("idx_conversations_user_department")
        .table(Conversation)
        .col(conversation::Column::UserId)
        .col(conversation::Column::DepartmentId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&conversation_pair)).await?;

    Ok(())
}
