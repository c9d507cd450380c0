//! Institution routes - department linking, allocation uploads, reports, anomaly review.

use crate::{
    api::{
        AppState,
        extract::{AuthSession, UploadForm},
    },
    core::{anomaly, institution, policy::Capability, transaction, upload},
    entities::{AnomalyStatus, TransactionModel, anomaly as anomaly_entity, department, report},
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    department_code: String,
}

pub async fn link_department(
    State(state): State<AppState>,
    session: AuthSession,
    Json(body): Json<LinkRequest>,
) -> Result<Json<department::Model>> {
    let me = session.require(&state, Capability::LinkDepartment)?;
    let dept = institution::link_department(&state.db, me.id, &body.department_code).await?;
    Ok(Json(dept))
}

pub async fn departments(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<Vec<department::Model>>> {
    let me = session.require(&state, Capability::ListDepartments)?;
    Ok(Json(institution::linked_departments(&state.db, me.id).await?))
}

#[derive(Debug, Serialize)]
pub struct AllocationUploadResponse {
    report: report::Model,
    created: usize,
    transactions: Vec<TransactionModel>,
}

pub async fn upload_transactions(
    State(state): State<AppState>,
    session: AuthSession,
    multipart: Multipart,
) -> Result<Json<AllocationUploadResponse>> {
    let me = session.require(&state, Capability::UploadAllocations)?;
    let form = UploadForm::read(multipart, state.settings.uploads.max_bytes).await?;
    let department_id: i64 = form
        .field("department_id")?
        .trim()
        .parse()
        .map_err(|_| Error::bad_request("department_id must be a number"))?;
    let report_name = form.field("report_name")?.to_string();

    let (_, records, stored) = form.accept(&state).await?;
    let upload = match transaction::record_allocation_upload(
        &state.db,
        me.id,
        department_id,
        &report_name,
        Some(stored.clone()),
        &records,
    )
    .await
    {
        Ok(upload) => upload,
        Err(e) => {
            upload::discard_upload(&stored).await;
            return Err(e);
        }
    };

    Ok(Json(AllocationUploadResponse {
        created: upload.transactions.len(),
        report: upload.report,
        transactions: upload.transactions,
    }))
}

pub async fn reports(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<Vec<report::Model>>> {
    let me = session.require(&state, Capability::ViewReports)?;
    Ok(Json(
        transaction::get_reports_for_institution(&state.db, me.id).await?,
    ))
}

pub async fn anomalies(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<Vec<anomaly_entity::Model>>> {
    let me = session.require(&state, Capability::ReviewAnomalies)?;
    Ok(Json(anomaly::list_anomalies(&state.db, me.id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AnomalyUpdate {
    status: AnomalyStatus,
}

pub async fn update_anomaly(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<i64>,
    Json(body): Json<AnomalyUpdate>,
) -> Result<Json<anomaly_entity::Model>> {
    let me = session.require(&state, Capability::ReviewAnomalies)?;
    Ok(Json(
        anomaly::update_anomaly_status(&state.db, me.id, id, body.status).await?,
    ))
}
