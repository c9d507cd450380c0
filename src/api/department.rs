//! Department routes - allocation verification and spending uploads.

use crate::{
    api::{
        AppState,
        extract::{AuthSession, UploadForm},
    },
    core::{policy::Capability, spending, transaction, upload},
    entities::{
        AnomalyModel, DepartmentTransactionModel, TransactionModel, TransactionStatus, report,
    },
    errors::Result,
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use serde::{Deserialize, Serialize};

pub async fn pending_transactions(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<Vec<TransactionModel>>> {
    let me = session.require(&state, Capability::ViewPendingTransactions)?;
    Ok(Json(
        transaction::get_pending_for_department(&state.db, me.id).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    status: TransactionStatus,
}

pub async fn verify_transaction(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<i64>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<TransactionModel>> {
    let me = session.require(&state, Capability::VerifyTransactions)?;
    Ok(Json(
        transaction::verify_transaction(&state.db, me.id, id, body.status).await?,
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingUploadResponse {
    report: report::Model,
    records: Vec<DepartmentTransactionModel>,
    total_allocated: f64,
    total_spent: f64,
    anomaly: Option<AnomalyModel>,
}

pub async fn upload_spending(
    State(state): State<AppState>,
    session: AuthSession,
    multipart: Multipart,
) -> Result<Json<SpendingUploadResponse>> {
    let me = session.require(&state, Capability::UploadSpending)?;
    let form = UploadForm::read(multipart, state.settings.uploads.max_bytes).await?;
    let report_name = form.field("report_name")?.to_string();

    let (_, records, stored) = form.accept(&state).await?;
    let upload = match spending::record_spending_upload(
        &state.db,
        me.id,
        &report_name,
        Some(stored.clone()),
        &records,
        state.settings.anomaly.policy,
    )
    .await
    {
        Ok(upload) => upload,
        Err(e) => {
            upload::discard_upload(&stored).await;
            return Err(e);
        }
    };

    let check = upload.anomaly_check;
    Ok(Json(SpendingUploadResponse {
        report: upload.report,
        records: upload.records,
        total_allocated: check.total_allocated,
        total_spent: check.total_spent,
        anomaly: check.anomaly,
    }))
}
