//! Department entity - A spending unit that receives allocations.
//!
//! Departments register with a shareable `department_code`; an institution
//! links a department by quoting that code. A department belongs to at most
//! one institution at a time (`institution_id` is nullable).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Department database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "departments")]
pub struct Model {
    /// Unique identifier for the department
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Code the department shares with its institution to get linked
    #[sea_orm(unique)]
    pub department_code: String,
    /// Display name (used in flowcharts and analytics)
    pub name: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Institution this department is currently linked to, if any
    pub institution_id: Option<i64>,
    /// When the department registered
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Department and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each department belongs to at most one institution
    #[sea_orm(
        belongs_to = "super::institution::Entity",
        from = "Column::InstitutionId",
        to = "super::institution::Column::Id"
    )]
    Institution,
    /// One department receives many allocations
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
    /// One department logs many spending records
    #[sea_orm(has_many = "super::department_transaction::Entity")]
    DepartmentTransactions,
}

impl Related<super::institution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Institution.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::department_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DepartmentTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
