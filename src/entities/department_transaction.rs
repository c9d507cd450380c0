//! Department transaction entity - Money a department reports having spent.
//!
//! Spending has no status: once logged it is final and counts towards the
//! department's total spend in the anomaly check.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Department transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "department_transactions")]
pub struct Model {
    /// Unique identifier for the spending record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Amount spent, always positive
    pub amount: f64,
    /// Who received the money
    pub recipient: String,
    /// Free-text description
    pub description: String,
    /// Date of the spend
    pub date: Date,
    /// Spending department
    pub department_id: i64,
    /// Institution the department was linked to when the spend was logged
    pub institution_id: i64,
    /// Report (upload batch) this spend came from, if any
    pub report_id: Option<i64>,
    /// When the row was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `DepartmentTransaction` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each spend is logged by one department
    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::DepartmentId",
        to = "super::department::Column::Id"
    )]
    Department,
    /// Each spend may come from one report
    #[sea_orm(
        belongs_to = "super::report::Entity",
        from = "Column::ReportId",
        to = "super::report::Column::Id"
    )]
    Report,
}

impl Related<super::department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Department.def()
    }
}

impl Related<super::report::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Report.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
