//! Anomaly detection - flags departments that spend more than they were allocated.
//!
//! A check compares two totals for one department/institution pair:
//! - allocated: sum of `completed` allocations (pending and disputed ones do not count)
//! - spent: sum of every logged department transaction
//!
//! The two sums are independent reads and run concurrently. When spent exceeds
//! allocated, an anomaly snapshot is recorded. Whether a repeated check
//! records another snapshot is governed by [`AnomalyPolicy`].

use crate::{
    entities::{
        Anomaly, AnomalyStatus, DepartmentTransaction, Transaction, TransactionStatus, anomaly,
        department_transaction, transaction,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Iterable, QueryOrder, QuerySelect, Set, prelude::*, sea_query::Expr};
use serde::Deserialize;

/// What a check does when the department already has an open anomaly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyPolicy {
    /// Every over-budget check records a new snapshot
    #[default]
    RecordEvery,
    /// While a `new` or `acknowledged` anomaly exists, no further snapshot is recorded
    OneOpenPerDepartment,
}

/// Outcome of one anomaly check.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyCheck {
    /// Sum of completed allocations
    pub total_allocated: f64,
    /// Sum of logged spending
    pub total_spent: f64,
    /// The anomaly covering this overage, if spending exceeds allocation
    pub anomaly: Option<anomaly::Model>,
    /// Whether `anomaly` was inserted by this check
    pub recorded: bool,
}

/// Rounds a money amount to whole cents.
#[allow(clippy::cast_possible_truncation)]
fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[allow(clippy::cast_precision_loss)]
fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Sums completed allocations from `institution_id` to `department_id`, rounded to cents.
pub async fn total_allocated<C>(db: &C, department_id: i64, institution_id: i64) -> Result<f64>
where
    C: ConnectionTrait,
{
    let total: Option<Option<f64>> = Transaction::find()
        .select_only()
        .column_as(Expr::col(transaction::Column::Amount).sum(), "total")
        .filter(transaction::Column::DepartmentId.eq(department_id))
        .filter(transaction::Column::InstitutionId.eq(institution_id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Completed))
        .into_tuple()
        .one(db)
        .await?;
    Ok(from_cents(to_cents(total.flatten().unwrap_or(0.0))))
}

/// Sums spending logged by `department_id` under `institution_id`, rounded to cents.
pub async fn total_spent<C>(db: &C, department_id: i64, institution_id: i64) -> Result<f64>
where
    C: ConnectionTrait,
{
    let total: Option<Option<f64>> = DepartmentTransaction::find()
        .select_only()
        .column_as(
            Expr::col(department_transaction::Column::Amount).sum(),
            "total",
        )
        .filter(department_transaction::Column::DepartmentId.eq(department_id))
        .filter(department_transaction::Column::InstitutionId.eq(institution_id))
        .into_tuple()
        .one(db)
        .await?;
    Ok(from_cents(to_cents(total.flatten().unwrap_or(0.0))))
}

async fn latest_open_anomaly<C>(
    db: &C,
    department_id: i64,
    institution_id: i64,
) -> Result<Option<anomaly::Model>>
where
    C: ConnectionTrait,
{
    let open: Vec<AnomalyStatus> = AnomalyStatus::iter().filter(|s| s.is_open()).collect();
    Anomaly::find()
        .filter(anomaly::Column::DepartmentId.eq(department_id))
        .filter(anomaly::Column::InstitutionId.eq(institution_id))
        .filter(anomaly::Column::Status.is_in(open))
        .order_by_desc(anomaly::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Compares allocation and spending for a department and records an anomaly on overage.
///
/// Totals are compared in whole cents. `triggered_by` names the action that
/// ran the check, for example `"Department Spending Report Upload"`.
#[tracing::instrument(skip(db))]
pub async fn check_for_anomaly<C>(
    db: &C,
    department_id: i64,
    institution_id: i64,
    triggered_by: &str,
    policy: AnomalyPolicy,
) -> Result<AnomalyCheck>
where
    C: ConnectionTrait,
{
    let (allocated, spent) = tokio::try_join!(
        total_allocated(db, department_id, institution_id),
        total_spent(db, department_id, institution_id),
    )?;
    let (allocated_cents, spent_cents) = (to_cents(allocated), to_cents(spent));

    if spent_cents <= allocated_cents {
        tracing::debug!("Department {department_id} within budget: {spent} <= {allocated}");
        return Ok(AnomalyCheck {
            total_allocated: allocated,
            total_spent: spent,
            anomaly: None,
            recorded: false,
        });
    }

    if policy == AnomalyPolicy::OneOpenPerDepartment {
        if let Some(open) = latest_open_anomaly(db, department_id, institution_id).await? {
            tracing::info!(
                "Department {} still over budget; anomaly {} already open",
                department_id,
                open.id
            );
            return Ok(AnomalyCheck {
                total_allocated: allocated,
                total_spent: spent,
                anomaly: Some(open),
                recorded: false,
            });
        }
    }

    let overage = from_cents(spent_cents - allocated_cents);
    let model = anomaly::ActiveModel {
        department_id: Set(department_id),
        institution_id: Set(institution_id),
        total_allocated: Set(allocated),
        total_spent: Set(spent),
        overage_amount: Set(overage),
        triggered_by: Set(triggered_by.to_string()),
        status: Set(AnomalyStatus::New),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::warn!(
        "Anomaly {}: department {} spent {:.2} against {:.2} allocated (overage {:.2})",
        model.id,
        department_id,
        spent,
        allocated,
        overage
    );
    Ok(AnomalyCheck {
        total_allocated: allocated,
        total_spent: spent,
        anomaly: Some(model),
        recorded: true,
    })
}

/// Lists an institution's anomalies, newest first.
pub async fn list_anomalies(
    db: &DatabaseConnection,
    institution_id: i64,
) -> Result<Vec<anomaly::Model>> {
    Anomaly::find()
        .filter(anomaly::Column::InstitutionId.eq(institution_id))
        .order_by_desc(anomaly::Column::CreatedAt)
        .order_by_desc(anomaly::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Moves an anomaly forward: `new → acknowledged → resolved` (or straight to resolved).
///
/// Amounts are never touched; only the status changes.
#[tracing::instrument(skip(db))]
pub async fn update_anomaly_status(
    db: &DatabaseConnection,
    institution_id: i64,
    anomaly_id: i64,
    status: AnomalyStatus,
) -> Result<anomaly::Model> {
    let existing = Anomaly::find_by_id(anomaly_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Anomaly", anomaly_id))?;

    if existing.institution_id != institution_id {
        return Err(Error::unauthorized(
            "Anomaly belongs to another institution",
        ));
    }
    if status <= existing.status {
        return Err(Error::bad_request(format!(
            "Cannot move anomaly from {:?} to {:?}",
            existing.status, status
        )));
    }

    let mut active: anomaly::ActiveModel = existing.into();
    active.status = Set(status);
    let updated = active.update(db).await?;
    tracing::info!("Anomaly {} is now {:?}", updated.id, updated.status);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    const TRIGGER: &str = "Department Spending Report Upload";

    #[tokio::test]
    async fn test_totals_default_to_zero() -> Result<()> {
        let (db, inst, dept) = setup_linked_department().await?;
        assert_eq!(total_allocated(&db, dept.id, inst.id).await?, 0.0);
        assert_eq!(total_spent(&db, dept.id, inst.id).await?, 0.0);

        let check = check_for_anomaly(&db, dept.id, inst.id, TRIGGER, AnomalyPolicy::RecordEvery).await?;
        assert!(check.anomaly.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_only_completed_allocations_count() -> Result<()> {
        let (db, inst, dept) = setup_linked_department().await?;
        create_test_allocation(&db, inst.id, dept.id, 1000.0, TransactionStatus::Completed).await?;
        create_test_allocation(&db, inst.id, dept.id, 400.0, TransactionStatus::PendingApproval).await?;
        create_test_allocation(&db, inst.id, dept.id, 300.0, TransactionStatus::Disputed).await?;

        assert_eq!(total_allocated(&db, dept.id, inst.id).await?, 1000.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_anomaly_when_spend_equals_allocation() -> Result<()> {
        let (db, inst, dept) = setup_linked_department().await?;
        create_test_allocation(&db, inst.id, dept.id, 1000.0, TransactionStatus::Completed).await?;
        create_test_spend(&db, dept.id, inst.id, 1000.0).await?;

        let check = check_for_anomaly(&db, dept.id, inst.id, TRIGGER, AnomalyPolicy::RecordEvery).await?;
        assert!(check.anomaly.is_none());
        assert!(list_anomalies(&db, inst.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_cent_amounts_compare_exactly() -> Result<()> {
        let (db, inst, dept) = setup_linked_department().await?;
        create_test_allocation(&db, inst.id, dept.id, 0.3, TransactionStatus::Completed).await?;
        create_test_spend(&db, dept.id, inst.id, 0.1).await?;
        create_test_spend(&db, dept.id, inst.id, 0.2).await?;

        let check = check_for_anomaly(&db, dept.id, inst.id, TRIGGER, AnomalyPolicy::RecordEvery).await?;
        assert!(check.anomaly.is_none());
        assert_eq!(check.total_spent, 0.3);
        assert!(list_anomalies(&db, inst.id).await?.is_empty());

        // One cent over is still caught, with an exact overage
        create_test_spend(&db, dept.id, inst.id, 0.01).await?;
        let over = check_for_anomaly(&db, dept.id, inst.id, TRIGGER, AnomalyPolicy::RecordEvery).await?;
        let anomaly = over.anomaly.unwrap();
        assert_eq!(anomaly.overage_amount, 0.01);
        assert_eq!(anomaly.total_spent, 0.31);
        assert_eq!(anomaly.total_allocated, 0.3);
        Ok(())
    }

    #[tokio::test]
    async fn test_overage_scenario_records_every_check() -> Result<()> {
        let (db, inst, dept) = setup_linked_department().await?;
        create_test_allocation(&db, inst.id, dept.id, 1000.0, TransactionStatus::Completed).await?;

        create_test_spend(&db, dept.id, inst.id, 1200.0).await?;
        let first = check_for_anomaly(&db, dept.id, inst.id, TRIGGER, AnomalyPolicy::RecordEvery).await?;
        let first_anomaly = first.anomaly.unwrap();
        assert!(first.recorded);
        assert_eq!(first_anomaly.overage_amount, 200.0);
        assert_eq!(first_anomaly.total_allocated, 1000.0);
        assert_eq!(first_anomaly.total_spent, 1200.0);
        assert_eq!(first_anomaly.triggered_by, TRIGGER);
        assert_eq!(first_anomaly.status, AnomalyStatus::New);

        create_test_spend(&db, dept.id, inst.id, 100.0).await?;
        let second = check_for_anomaly(&db, dept.id, inst.id, TRIGGER, AnomalyPolicy::RecordEvery).await?;
        assert_eq!(second.anomaly.unwrap().overage_amount, 300.0);

        let all = list_anomalies(&db, inst.id).await?;
        assert_eq!(all.len(), 2);
        // The first snapshot is untouched
        assert_eq!(all[1].overage_amount, 200.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_one_open_policy_suppresses_duplicates() -> Result<()> {
        let (db, inst, dept) = setup_linked_department().await?;
        create_test_allocation(&db, inst.id, dept.id, 1000.0, TransactionStatus::Completed).await?;
        create_test_spend(&db, dept.id, inst.id, 1200.0).await?;

        let policy = AnomalyPolicy::OneOpenPerDepartment;
        let first = check_for_anomaly(&db, dept.id, inst.id, TRIGGER, policy).await?;
        assert!(first.recorded);

        create_test_spend(&db, dept.id, inst.id, 100.0).await?;
        let second = check_for_anomaly(&db, dept.id, inst.id, TRIGGER, policy).await?;
        assert!(!second.recorded);
        assert_eq!(second.total_spent, 1300.0);
        assert_eq!(second.anomaly.as_ref().map(|a| a.id), first.anomaly.as_ref().map(|a| a.id));
        assert_eq!(list_anomalies(&db, inst.id).await?.len(), 1);

        // Acknowledged still counts as open
        let first_id = first.anomaly.unwrap().id;
        update_anomaly_status(&db, inst.id, first_id, AnomalyStatus::Acknowledged).await?;
        let acked = check_for_anomaly(&db, dept.id, inst.id, TRIGGER, policy).await?;
        assert!(!acked.recorded);

        // Once resolved, a fresh overage is recorded again
        update_anomaly_status(&db, inst.id, first_id, AnomalyStatus::Resolved).await?;
        let third = check_for_anomaly(&db, dept.id, inst.id, TRIGGER, policy).await?;
        assert!(third.recorded);
        assert_eq!(third.anomaly.unwrap().overage_amount, 300.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_other_institution_spend_not_counted() -> Result<()> {
        let (db, inst, dept) = setup_linked_department().await?;
        let other = create_test_institution(&db, "Elsewhere").await?;
        create_test_allocation(&db, inst.id, dept.id, 100.0, TransactionStatus::Completed).await?;
        create_test_spend(&db, dept.id, other.id, 500.0).await?;

        let check = check_for_anomaly(&db, dept.id, inst.id, TRIGGER, AnomalyPolicy::RecordEvery).await?;
        assert!(check.anomaly.is_none());
        assert_eq!(check.total_spent, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_anomaly_status_forward_only() -> Result<()> {
        let (db, inst, dept) = setup_linked_department().await?;
        create_test_spend(&db, dept.id, inst.id, 50.0).await?;
        let check = check_for_anomaly(&db, dept.id, inst.id, TRIGGER, AnomalyPolicy::RecordEvery).await?;
        let id = check.anomaly.unwrap().id;

        let acked = update_anomaly_status(&db, inst.id, id, AnomalyStatus::Acknowledged).await?;
        assert_eq!(acked.status, AnomalyStatus::Acknowledged);
        assert_eq!(acked.overage_amount, 50.0);

        let back = update_anomaly_status(&db, inst.id, id, AnomalyStatus::New).await;
        assert!(matches!(back, Err(Error::BadRequest { .. })));

        let resolved = update_anomaly_status(&db, inst.id, id, AnomalyStatus::Resolved).await?;
        assert_eq!(resolved.status, AnomalyStatus::Resolved);

        let other = create_test_institution(&db, "Other").await?;
        let foreign = update_anomaly_status(&db, other.id, id, AnomalyStatus::Resolved).await;
        assert!(matches!(foreign, Err(Error::Unauthorized { .. })));
        Ok(())
    }
}
