//! Anomaly entity - A snapshot of a department spending more than it was allocated.
//!
//! The amounts are captured at check time and never rewritten. Only `status`
//! moves forward as the institution acknowledges and resolves the anomaly.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Review status of an anomaly
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, EnumIter, DeriveActiveEnum, Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    /// Just detected
    #[sea_orm(string_value = "new")]
    New,
    /// Seen by the institution
    #[sea_orm(string_value = "acknowledged")]
    Acknowledged,
    /// Closed
    #[sea_orm(string_value = "resolved")]
    Resolved,
}

impl AnomalyStatus {
    /// Whether the anomaly still needs attention.
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Resolved)
    }
}

/// Anomaly database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "anomalies")]
pub struct Model {
    /// Unique identifier for the anomaly
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Department that overspent
    pub department_id: i64,
    /// Institution that owns the department
    pub institution_id: i64,
    /// Sum of completed allocations at check time
    pub total_allocated: f64,
    /// Sum of logged spending at check time
    pub total_spent: f64,
    /// `total_spent - total_allocated`
    pub overage_amount: f64,
    /// Action that ran the check (e.g. "Department Spending Report Upload")
    pub triggered_by: String,
    /// Review status
    pub status: AnomalyStatus,
    /// When the anomaly was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Anomaly and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each anomaly concerns one department
    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::DepartmentId",
        to = "super::department::Column::Id"
    )]
    Department,
}

impl Related<super::department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Department.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
