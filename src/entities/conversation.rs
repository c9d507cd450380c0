//! Conversation entity - A direct thread between a user and a department.
//!
//! At most one conversation exists per (user, department) pair, enforced by a
//! composite unique index.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Conversation database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conversations")]
pub struct Model {
    /// Unique identifier for the conversation
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User side of the thread
    pub user_id: i64,
    /// Department side of the thread
    pub department_id: i64,
    /// When the thread was opened
    pub created_at: DateTimeUtc,
    /// When the last message was sent
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Conversation and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One conversation has many messages
    #[sea_orm(has_many = "super::message::Entity")]
    Messages,
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
