//! Chatbot entry entity - One turn of an assistant session.
//!
//! Entries are append-only and ordered by `position` within their session.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Who produced an entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// The person asking
    #[sea_orm(string_value = "user")]
    User,
    /// The text-generation model
    #[sea_orm(string_value = "model")]
    Model,
}

/// Chatbot entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chatbot_entries")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Session this entry belongs to
    pub session_id: i64,
    /// Zero-based order within the session
    pub position: i32,
    /// Author of the entry
    pub role: ChatRole,
    /// Entry text
    pub text: String,
    /// When the entry was written
    pub timestamp: DateTimeUtc,
}

/// Defines relationships between `ChatbotEntry` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one session
    #[sea_orm(
        belongs_to = "super::chatbot_session::Entity",
        from = "Column::SessionId",
        to = "super::chatbot_session::Column::Id"
    )]
    Session,
}

impl Related<super::chatbot_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
