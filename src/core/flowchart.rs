//! Flowchart (Sankey) aggregation for an institution's allocations.
//!
//! Produces three node levels:
//! 1. the institution name
//! 2. department display names, fed by the department's completed allocations
//! 3. status labels ("Pending Approval", "Completed", "Disputed"), one link per
//!    department and status holding that department's allocations in the status
//!
//! The sums are computed by a single grouped query (department, status).
//! Links with a zero amount are left out.

use crate::{
    core::institution::get_institution,
    entities::{Department, Transaction, TransactionStatus, department, transaction},
    errors::Result,
};
use sea_orm::{QuerySelect, prelude::*, sea_query::Expr};
use serde::Serialize;
use std::collections::BTreeMap;

/// One edge of the Sankey diagram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowLink {
    /// Upstream node name
    pub source: String,
    /// Downstream node name
    pub target: String,
    /// Flow amount, always positive
    pub amount: f64,
}

/// Per-department allocation sums by status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DepartmentTotals {
    /// Department id
    pub department_id: i64,
    /// Department display name
    pub department_name: String,
    /// Sum of completed allocations
    pub completed: f64,
    /// Sum of allocations awaiting verification
    pub pending_approval: f64,
    /// Sum of disputed allocations
    pub disputed: f64,
}

impl DepartmentTotals {
    fn add(&mut self, status: TransactionStatus, amount: f64) {
        match status {
            TransactionStatus::Completed => self.completed += amount,
            TransactionStatus::PendingApproval => self.pending_approval += amount,
            TransactionStatus::Disputed => self.disputed += amount,
        }
    }

    const fn get(&self, status: TransactionStatus) -> f64 {
        match status {
            TransactionStatus::Completed => self.completed,
            TransactionStatus::PendingApproval => self.pending_approval,
            TransactionStatus::Disputed => self.disputed,
        }
    }
}

/// Sankey data for one institution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowchartData {
    /// Root node name
    pub institution: String,
    /// Edges, department links first within each department
    pub links: Vec<FlowLink>,
    /// Raw sums behind the links
    pub department_totals: Vec<DepartmentTotals>,
}

const STATUS_ORDER: [TransactionStatus; 3] = [
    TransactionStatus::Completed,
    TransactionStatus::PendingApproval,
    TransactionStatus::Disputed,
];

/// Builds the flowchart for `institution_id`.
pub async fn institution_flowchart(
    db: &DatabaseConnection,
    institution_id: i64,
) -> Result<FlowchartData> {
    let institution = get_institution(db, institution_id).await?;

    let rows: Vec<(i64, TransactionStatus, Option<f64>)> = Transaction::find()
        .select_only()
        .column(transaction::Column::DepartmentId)
        .column(transaction::Column::Status)
        .column_as(Expr::col(transaction::Column::Amount).sum(), "total")
        .filter(transaction::Column::InstitutionId.eq(institution_id))
        .group_by(transaction::Column::DepartmentId)
        .group_by(transaction::Column::Status)
        .into_tuple()
        .all(db)
        .await?;

    let department_ids: Vec<i64> = rows.iter().map(|(id, _, _)| *id).collect();
    let names: BTreeMap<i64, String> = Department::find()
        .filter(department::Column::Id.is_in(department_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect();

    let mut totals: BTreeMap<i64, DepartmentTotals> = BTreeMap::new();
    for (department_id, status, sum) in rows {
        let entry = totals.entry(department_id).or_insert_with(|| DepartmentTotals {
            department_id,
            department_name: names
                .get(&department_id)
                .cloned()
                .unwrap_or_else(|| format!("Department {department_id}")),
            ..Default::default()
        });
        entry.add(status, sum.unwrap_or(0.0));
    }

    let mut department_totals: Vec<DepartmentTotals> = totals.into_values().collect();
    department_totals.sort_by(|a, b| {
        a.department_name
            .cmp(&b.department_name)
            .then(a.department_id.cmp(&b.department_id))
    });

    let links = build_links(&institution.name, &department_totals);
    Ok(FlowchartData {
        institution: institution.name,
        links,
        department_totals,
    })
}

/// Turns per-department sums into Sankey edges, dropping zero flows.
#[must_use]
pub fn build_links(institution_name: &str, departments: &[DepartmentTotals]) -> Vec<FlowLink> {
    let mut links = Vec::new();
    for dept in departments {
        if dept.completed > 0.0 {
            links.push(FlowLink {
                source: institution_name.to_string(),
                target: dept.department_name.clone(),
                amount: dept.completed,
            });
        }
        for status in STATUS_ORDER {
            let amount = dept.get(status);
            if amount > 0.0 {
                links.push(FlowLink {
                    source: dept.department_name.clone(),
                    target: status.label().to_string(),
                    amount,
                });
            }
        }
    }
    links
}
