//! Transaction entity - An allocation of funds from an institution to a department.
//!
//! Allocations arrive as `pending_approval` and are verified by the receiving
//! department, which moves them to `completed` or `disputed`. Both of those
//! states are terminal. Only `completed` allocations count towards a
//! department's budget in the anomaly check.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Verification status of an allocation
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Uploaded by the institution, awaiting the department
    #[sea_orm(string_value = "pending_approval")]
    PendingApproval,
    /// Department confirmed receipt
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Department rejected the allocation
    #[sea_orm(string_value = "disputed")]
    Disputed,
}

impl TransactionStatus {
    /// Whether no further transition is allowed from this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Disputed)
    }

    /// Human-readable, capitalized label used in flowchart nodes.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingApproval => "Pending Approval",
            Self::Completed => "Completed",
            Self::Disputed => "Disputed",
        }
    }
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Allocated amount, always positive
    pub amount: f64,
    /// Vendor or purpose named on the allocation line
    pub vendor: String,
    /// Free-text description
    pub description: String,
    /// Date the allocation applies to
    pub date: Date,
    /// Verification status
    pub status: TransactionStatus,
    /// Allocating institution
    pub institution_id: i64,
    /// Receiving department
    pub department_id: i64,
    /// Report (upload batch) that authorized this allocation
    pub report_id: i64,
    /// When the row was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each allocation is issued by one institution
    #[sea_orm(
        belongs_to = "super::institution::Entity",
        from = "Column::InstitutionId",
        to = "super::institution::Column::Id"
    )]
    Institution,
    /// Each allocation targets one department
    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::DepartmentId",
        to = "super::department::Column::Id"
    )]
    Department,
    /// Each allocation comes from one report
    #[sea_orm(
        belongs_to = "super::report::Entity",
        from = "Column::ReportId",
        to = "super::report::Column::Id"
    )]
    Report,
}

impl Related<super::institution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Institution.def()
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TransactionStatus::PendingApproval.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Disputed.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TransactionStatus::PendingApproval).unwrap_or_default();
        assert_eq!(json, "\"pending_approval\"");
    }
}
