//! Unauthenticated read-only routes.

use crate::{
    api::AppState,
    core::{
        analytics::{self, DepartmentShare, GroupBy, TrendPoint},
        flowchart::{self, FlowchartData},
        institution,
    },
    entities::InstitutionModel,
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

pub async fn institutions(State(state): State<AppState>) -> Result<Json<Vec<InstitutionModel>>> {
    Ok(Json(institution::list_institutions(&state.db).await?))
}

pub async fn flowchart(
    State(state): State<AppState>,
    Path(institution_id): Path<i64>,
) -> Result<Json<FlowchartData>> {
    Ok(Json(
        flowchart::institution_flowchart(&state.db, institution_id).await?,
    ))
}

pub async fn department_share(
    State(state): State<AppState>,
    Path(institution_id): Path<i64>,
) -> Result<Json<Vec<DepartmentShare>>> {
    Ok(Json(
        analytics::department_share(&state.db, institution_id).await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendQuery {
    group_by: Option<String>,
}

pub async fn spending_trend(
    State(state): State<AppState>,
    Path(institution_id): Path<i64>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<Vec<TrendPoint>>> {
    let group_by = match query.group_by.as_deref() {
        Some(raw) => raw.parse()?,
        None => GroupBy::default(),
    };
    Ok(Json(
        analytics::spending_trend(&state.db, institution_id, group_by).await?,
    ))
}
