//! Message entity - One message in a user/department conversation.
//!
//! The sender is stored as a `sender_kind` + `sender_id` column pair. Code
//! outside this module works with [`Participant`] instead, so a sender can
//! never be a raw id with a mismatched kind string.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which table a sender id refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    /// `users.id`
    #[sea_orm(string_value = "user")]
    User,
    /// `departments.id`
    #[sea_orm(string_value = "department")]
    Department,
}

/// A party to a conversation: either a user or a department.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Participant {
    /// A public user
    User(i64),
    /// A department
    Department(i64),
}

impl Participant {
    /// Splits the participant into its storage columns.
    #[must_use]
    pub const fn into_columns(self) -> (SenderKind, i64) {
        match self {
            Self::User(id) => (SenderKind::User, id),
            Self::Department(id) => (SenderKind::Department, id),
        }
    }

    /// Rebuilds a participant from its storage columns.
    #[must_use]
    pub const fn from_columns(kind: SenderKind, id: i64) -> Self {
        match kind {
            SenderKind::User => Self::User(id),
            SenderKind::Department => Self::Department(id),
        }
    }
}

/// Message database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    /// Unique identifier for the message
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Conversation this message belongs to
    pub conversation_id: i64,
    /// Table `sender_id` refers to
    pub sender_kind: SenderKind,
    /// Id of the sending user or department
    pub sender_id: i64,
    /// Message body
    pub text: String,
    /// When the message was sent
    pub created_at: DateTimeUtc,
}

impl Model {
    /// The typed sender of this message.
    #[must_use]
    pub const fn sender(&self) -> Participant {
        Participant::from_columns(self.sender_kind, self.sender_id)
    }
}

/// Defines relationships between Message and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each message belongs to one conversation
    #[sea_orm(
        belongs_to = "super::conversation::Entity",
        from = "Column::ConversationId",
        to = "super::conversation::Column::Id"
    )]
    Conversation,
}

impl Related<super::conversation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Conversation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_columns_round_trip() {
        let dept = Participant::Department(7);
        let (kind, id) = dept.into_columns();
        assert_eq!(kind, SenderKind::Department);
        assert_eq!(Participant::from_columns(kind, id), dept);
    }

    #[test]
    fn test_participant_json_is_tagged() {
        let json = serde_json::to_value(Participant::User(3)).unwrap_or_default();
        assert_eq!(json, serde_json::json!({ "kind": "user", "id": 3 }));
    }
}
