//! Report entity - A named batch of allocations or spending records.
//!
//! Every upload creates one report. `source_url` points at the stored copy of
//! the uploaded file so the batch can be audited later.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What kind of records a report groups
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// Institution to department allocations
    #[sea_orm(string_value = "allocation")]
    Allocation,
    /// Department to vendor spending
    #[sea_orm(string_value = "spending")]
    Spending,
}

/// Report database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    /// Unique identifier for the report
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name given by the uploader
    pub name: String,
    /// Allocation or spending batch
    pub report_type: ReportType,
    /// Date the report was filed
    pub date: Date,
    /// Location of the stored source file
    pub source_url: Option<String>,
    /// Institution the report belongs to
    pub institution_id: i64,
    /// Department the report concerns, if scoped to one
    pub department_id: Option<i64>,
    /// When the row was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Report and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One report authorizes many allocations
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
    /// One report groups many spending records
    #[sea_orm(has_many = "super::department_transaction::Entity")]
    DepartmentTransactions,
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
