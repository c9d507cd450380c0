//! Allocation business logic - institution to department transactions.
//!
//! Allocations are created in bulk from an uploaded report and start out as
//! `pending_approval`. The receiving department then verifies each one,
//! moving it to `completed` or `disputed`. Verification is a guarded update
//! (`... WHERE status = 'pending_approval'`) so a terminal status can never be
//! overwritten, even by two verifications racing each other.

use crate::{
    core::{institution, upload::ParsedRecord},
    entities::{Report, Transaction, TransactionStatus, report, transaction},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};

/// Result of an allocation upload.
#[derive(Debug, Clone)]
pub struct AllocationUpload {
    /// The report created for the batch
    pub report: report::Model,
    /// Allocations created, all pending approval
    pub transactions: Vec<transaction::Model>,
}

/// Creates an allocation report and one pending transaction per record.
///
/// The target department must currently be linked to `institution_id`. The
/// report and all its transactions are written in a single database
/// transaction: either the whole batch lands or none of it does.
#[tracing::instrument(skip(db, records), fields(records = records.len()))]
pub async fn record_allocation_upload(
    db: &DatabaseConnection,
    institution_id: i64,
    department_id: i64,
    report_name: &str,
    source_url: Option<String>,
    records: &[ParsedRecord],
) -> Result<AllocationUpload> {
    if report_name.trim().is_empty() {
        return Err(Error::bad_request("Report name cannot be empty"));
    }
    if records.is_empty() {
        return Err(Error::bad_request("No allocation records to save"));
    }
    if let Some(bad) = records.iter().find(|r| !r.amount.is_finite() || r.amount <= 0.0) {
        return Err(Error::InvalidAmount { amount: bad.amount });
    }

    let dept = institution::get_department(db, department_id).await?;
    if dept.institution_id != Some(institution_id) {
        return Err(Error::unauthorized(
            "Department is not linked to this institution",
        ));
    }

    let txn = db.begin().await?;
    let now = Utc::now();

    let report = report::ActiveModel {
        name: Set(report_name.trim().to_string()),
        report_type: Set(report::ReportType::Allocation),
        date: Set(now.date_naive()),
        source_url: Set(source_url),
        institution_id: Set(institution_id),
        department_id: Set(Some(department_id)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut transactions = Vec::with_capacity(records.len());
    for record in records {
        let model = transaction::ActiveModel {
            amount: Set(record.amount),
            vendor: Set(record.counterparty.clone()),
            description: Set(record.description.clone()),
            date: Set(record.date),
            status: Set(TransactionStatus::PendingApproval),
            institution_id: Set(institution_id),
            department_id: Set(department_id),
            report_id: Set(report.id),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        transactions.push(model);
    }

    txn.commit().await?;

    tracing::info!(
        "Institution {} allocated {} transactions to department {} (report {})",
        institution_id,
        transactions.len(),
        department_id,
        report.id
    );
    Ok(AllocationUpload {
        report,
        transactions,
    })
}

/// Lists a department's allocations that still await verification, oldest first.
pub async fn get_pending_for_department(
    db: &DatabaseConnection,
    department_id: i64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::DepartmentId.eq(department_id))
        .filter(transaction::Column::Status.eq(TransactionStatus::PendingApproval))
        .order_by_asc(transaction::Column::Date)
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists every allocation issued by an institution, newest first.
pub async fn get_transactions_for_institution<C>(
    db: &C,
    institution_id: i64,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::InstitutionId.eq(institution_id))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific allocation by its unique ID.
pub async fn get_transaction_by_id(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists the reports filed by or for an institution, newest first.
pub async fn get_reports_for_institution(
    db: &DatabaseConnection,
    institution_id: i64,
) -> Result<Vec<report::Model>> {
    Report::find()
        .filter(report::Column::InstitutionId.eq(institution_id))
        .order_by_desc(report::Column::CreatedAt)
        .order_by_desc(report::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Moves a pending allocation to `completed` or `disputed`.
///
/// Only the receiving department may verify, and only while it is still linked
/// to the allocating institution. Verification does not run the anomaly check;
/// that happens when spending is uploaded.
#[tracing::instrument(skip(db))]
pub async fn verify_transaction(
    db: &DatabaseConnection,
    actor_department_id: i64,
    transaction_id: i64,
    new_status: TransactionStatus,
) -> Result<transaction::Model> {
    if !new_status.is_terminal() {
        return Err(Error::bad_request(
            "Status must be 'completed' or 'disputed'",
        ));
    }

    let existing = get_transaction_by_id(db, transaction_id)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", transaction_id))?;

    if existing.department_id != actor_department_id {
        return Err(Error::unauthorized(
            "Transaction belongs to another department",
        ));
    }
    let dept = institution::get_department(db, actor_department_id).await?;
    if dept.institution_id != Some(existing.institution_id) {
        return Err(Error::unauthorized(
            "Department is no longer linked to the allocating institution",
        ));
    }

    if existing.status.is_terminal() {
        return Err(Error::bad_request(format!(
            "Transaction is already {}",
            existing.status.label().to_lowercase()
        )));
    }

    // Guarded update: only a pending row may change
    let result = Transaction::update_many()
        .col_expr(transaction::Column::Status, Expr::value(new_status))
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::Status.eq(TransactionStatus::PendingApproval))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::bad_request("Transaction was verified concurrently"));
    }

    tracing::info!(
        "Department {} marked transaction {} as {:?}",
        actor_department_id,
        transaction_id,
        new_status
    );
    get_transaction_by_id(db, transaction_id)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", transaction_id))
}
