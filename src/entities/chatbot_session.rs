//! Chatbot session entity - One assistant thread per (user, institution) pair.
//!
//! Uniqueness of the pair is enforced by a composite unique index created in
//! `config::database::create_tables`, so two concurrent "get or create" calls
//! cannot both insert.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Chatbot session database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chatbot_sessions")]
pub struct Model {
    /// Unique identifier for the session
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the session
    pub user_id: i64,
    /// Institution the questions are about
    pub institution_id: i64,
    /// When the session was opened
    pub created_at: DateTimeUtc,
    /// When the last exchange was saved
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `ChatbotSession` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One session holds many entries
    #[sea_orm(has_many = "super::chatbot_entry::Entity")]
    Entries,
}

impl Related<super::chatbot_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
