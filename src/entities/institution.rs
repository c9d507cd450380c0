//! Institution entity - An organization that allocates funds to departments.
//!
//! Linked departments are not stored on the institution row; they are the
//! departments whose `institution_id` points here.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Institution database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "institutions")]
pub struct Model {
    /// Unique identifier for the institution
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Public name, unique across institutions
    #[sea_orm(unique)]
    pub name: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// When the institution registered
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Institution and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One institution has many linked departments
    #[sea_orm(has_many = "super::department::Entity")]
    Departments,
    /// One institution issues many allocations
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Departments.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
