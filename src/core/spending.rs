//! Spending business logic - department to vendor transactions.
//!
//! A department logs spending by uploading a report. The records are attributed
//! to the institution the department is linked to at upload time. The anomaly
//! check for that pair runs in the same database transaction as the batch.

use crate::{
    core::{
        anomaly::{self, AnomalyCheck, AnomalyPolicy},
        institution,
        upload::ParsedRecord,
    },
    entities::{DepartmentTransaction, department_transaction, report},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};

/// `triggered_by` tag recorded on anomalies raised by a spending upload.
pub const SPENDING_UPLOAD_TRIGGER: &str = "Department Spending Report Upload";

/// Result of a spending upload.
#[derive(Debug, Clone)]
pub struct SpendingUpload {
    /// The report created for the batch
    pub report: report::Model,
    /// Spending records created
    pub records: Vec<department_transaction::Model>,
    /// Outcome of the anomaly check that followed the upload
    pub anomaly_check: AnomalyCheck,
}

/// Saves a spending report for `department_id` and runs the anomaly check.
///
/// The department must be linked to an institution. The report, its records
/// and any anomaly the check raises are written atomically.
#[tracing::instrument(skip(db, records), fields(records = records.len()))]
pub async fn record_spending_upload(
    db: &DatabaseConnection,
    department_id: i64,
    report_name: &str,
    source_url: Option<String>,
    records: &[ParsedRecord],
    policy: AnomalyPolicy,
) -> Result<SpendingUpload> {
    if report_name.trim().is_empty() {
        return Err(Error::bad_request("Report name cannot be empty"));
    }
    if records.is_empty() {
        return Err(Error::bad_request("No spending records to save"));
    }
    if let Some(bad) = records.iter().find(|r| !r.amount.is_finite() || r.amount <= 0.0) {
        return Err(Error::InvalidAmount { amount: bad.amount });
    }

    let dept = institution::get_department(db, department_id).await?;
    let institution_id = dept.institution_id.ok_or_else(|| {
        Error::bad_request("Department must be linked to an institution before logging spending")
    })?;

    let txn = db.begin().await?;
    let now = Utc::now();

    let report = report::ActiveModel {
        name: Set(report_name.trim().to_string()),
        report_type: Set(report::ReportType::Spending),
        date: Set(now.date_naive()),
        source_url: Set(source_url),
        institution_id: Set(institution_id),
        department_id: Set(Some(department_id)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut saved = Vec::with_capacity(records.len());
    for record in records {
        let model = department_transaction::ActiveModel {
            amount: Set(record.amount),
            recipient: Set(record.counterparty.clone()),
            description: Set(record.description.clone()),
            date: Set(record.date),
            department_id: Set(department_id),
            institution_id: Set(institution_id),
            report_id: Set(Some(report.id)),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        saved.push(model);
    }

    let anomaly_check = anomaly::check_for_anomaly(
        &txn,
        department_id,
        institution_id,
        SPENDING_UPLOAD_TRIGGER,
        policy,
    )
    .await?;

    txn.commit().await?;
    tracing::info!(
        "Department {} logged {} spending records (report {})",
        department_id,
        saved.len(),
        report.id
    );

    Ok(SpendingUpload {
        report,
        records: saved,
        anomaly_check,
    })
}

/// Lists all spending attributed to an institution, oldest first.
pub async fn get_spending_for_institution<C>(
    db: &C,
    institution_id: i64,
) -> Result<Vec<department_transaction::Model>>
where
    C: ConnectionTrait,
{
    DepartmentTransaction::find()
        .filter(department_transaction::Column::InstitutionId.eq(institution_id))
        .order_by_asc(department_transaction::Column::Date)
        .order_by_asc(department_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
