//! Spending analytics - time-bucketed trends and per-department share.
//!
//! Both views read department transactions only and are recomputed on every call.

use crate::{
    core::{institution::get_institution, spending::get_spending_for_institution},
    entities::{Department, DepartmentTransaction, department, department_transaction},
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate};
use sea_orm::{QuerySelect, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Calendar granularity for the spending trend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// One bucket per calendar month
    #[default]
    Monthly,
    /// One bucket per calendar quarter
    Quarterly,
    /// One bucket per calendar year
    Annually,
}

impl FromStr for GroupBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "annually" => Ok(Self::Annually),
            other => Err(Error::bad_request(format!(
                "groupBy must be monthly, quarterly or annually (got '{other}')"
            ))),
        }
    }
}

/// Identifies one trend bucket. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PeriodKey {
    /// Calendar year
    pub year: i32,
    /// 1-12, set for monthly buckets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    /// 1-4, set for quarterly buckets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarter: Option<u32>,
}

impl PeriodKey {
    /// The bucket `date` falls into under `group_by`.
    #[must_use]
    pub fn for_date(date: NaiveDate, group_by: GroupBy) -> Self {
        let year = date.year();
        match group_by {
            GroupBy::Monthly => Self {
                year,
                month: Some(date.month()),
                quarter: None,
            },
            GroupBy::Quarterly => Self {
                year,
                month: None,
                quarter: Some((date.month() - 1) / 3 + 1),
            },
            GroupBy::Annually => Self {
                year,
                month: None,
                quarter: None,
            },
        }
    }
}

/// Total spending in one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// Which period
    pub period: PeriodKey,
    /// Sum of spending in the period
    pub total_spent: f64,
}

/// Total spending by one department.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentShare {
    /// Department id
    pub department_id: i64,
    /// Department display name
    pub department_name: String,
    /// Sum of the department's spending
    pub total_spent: f64,
}

/// Buckets `(date, amount)` pairs by period, ordered chronologically.
#[must_use]
pub fn bucket_spending<I>(entries: I, group_by: GroupBy) -> Vec<TrendPoint>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut buckets: BTreeMap<PeriodKey, f64> = BTreeMap::new();
    for (date, amount) in entries {
        *buckets
            .entry(PeriodKey::for_date(date, group_by))
            .or_insert(0.0) += amount;
    }
    buckets
        .into_iter()
        .map(|(period, total_spent)| TrendPoint {
            period,
            total_spent,
        })
        .collect()
}

/// Spending trend for `institution_id` bucketed by `group_by`.
pub async fn spending_trend(
    db: &DatabaseConnection,
    institution_id: i64,
    group_by: GroupBy,
) -> Result<Vec<TrendPoint>> {
    get_institution(db, institution_id).await?;
    let spending = get_spending_for_institution(db, institution_id).await?;
    Ok(bucket_spending(
        spending.into_iter().map(|s| (s.date, s.amount)),
        group_by,
    ))
}

/// Total spending per department for `institution_id`, largest first.
pub async fn department_share(
    db: &DatabaseConnection,
    institution_id: i64,
) -> Result<Vec<DepartmentShare>> {
    get_institution(db, institution_id).await?;

    let rows: Vec<(i64, Option<f64>)> = DepartmentTransaction::find()
        .select_only()
        .column(department_transaction::Column::DepartmentId)
        .column_as(
            Expr::col(department_transaction::Column::Amount).sum(),
            "total",
        )
        .filter(department_transaction::Column::InstitutionId.eq(institution_id))
        .group_by(department_transaction::Column::DepartmentId)
        .into_tuple()
        .all(db)
        .await?;

    let ids: Vec<i64> = rows.iter().map(|(id, _)| *id).collect();
    let names: HashMap<i64, String> = Department::find()
        .filter(department::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect();

    let mut shares: Vec<DepartmentShare> = rows
        .into_iter()
        .map(|(department_id, total)| DepartmentShare {
            department_id,
            department_name: names
                .get(&department_id)
                .cloned()
                .unwrap_or_else(|| format!("Department {department_id}")),
            total_spent: total.unwrap_or(0.0),
        })
        .collect();
    shares.sort_by(|a, b| {
        b.total_spent
            .total_cmp(&a.total_spent)
            .then_with(|| a.department_name.cmp(&b.department_name))
    });
    Ok(shares)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_group_by_parsing() {
        assert_eq!("monthly".parse::<GroupBy>().unwrap(), GroupBy::Monthly);
        assert_eq!("Quarterly".parse::<GroupBy>().unwrap(), GroupBy::Quarterly);
        assert_eq!("ANNUALLY".parse::<GroupBy>().unwrap(), GroupBy::Annually);
        assert!(matches!(
            "weekly".parse::<GroupBy>(),
            Err(Error::BadRequest { .. })
        ));
    }

    #[test]
    fn test_period_key_quarters() {
        let q = |m| PeriodKey::for_date(date(2024, m, 1), GroupBy::Quarterly).quarter;
        assert_eq!(q(1), Some(1));
        assert_eq!(q(3), Some(1));
        assert_eq!(q(4), Some(2));
        assert_eq!(q(9), Some(3));
        assert_eq!(q(12), Some(4));
    }

    #[test]
    fn test_bucket_totals_match_overall_total() {
        let entries = vec![
            (date(2023, 12, 31), 50.0),
            (date(2024, 1, 5), 100.0),
            (date(2024, 1, 20), 25.0),
            (date(2024, 4, 1), 10.0),
            (date(2024, 11, 30), 5.5),
        ];
        let total: f64 = entries.iter().map(|(_, a)| a).sum();

        for group_by in [GroupBy::Monthly, GroupBy::Quarterly, GroupBy::Annually] {
            let points = bucket_spending(entries.clone(), group_by);
            let bucketed: f64 = points.iter().map(|p| p.total_spent).sum();
            assert_eq!(bucketed, total, "{group_by:?}");
            // Chronological order
            assert!(points.windows(2).all(|w| w[0].period < w[1].period));
        }

        let monthly = bucket_spending(entries.clone(), GroupBy::Monthly);
        assert_eq!(monthly.len(), 4);
        assert_eq!(monthly[1].period.month, Some(1));
        assert_eq!(monthly[1].total_spent, 125.0);

        let annual = bucket_spending(entries, GroupBy::Annually);
        assert_eq!(annual.len(), 2);
        assert_eq!(annual[0].period.year, 2023);
        assert_eq!(annual[1].total_spent, 140.5);
    }

    #[test]
    fn test_period_key_json_shape() {
        let key = PeriodKey::for_date(date(2024, 5, 1), GroupBy::Quarterly);
        let json = serde_json::to_value(key).unwrap();
        assert_eq!(json, serde_json::json!({ "year": 2024, "quarter": 2 }));
    }

    #[tokio::test]
    async fn test_spending_trend_integration() -> Result<()> {
        let (db, inst, dept) = setup_linked_department().await?;
        create_dated_spend(&db, dept.id, inst.id, 100.0, 2024, 1, 10).await?;
        create_dated_spend(&db, dept.id, inst.id, 200.0, 2024, 2, 10).await?;
        create_dated_spend(&db, dept.id, inst.id, 300.0, 2024, 7, 10).await?;

        let quarterly = spending_trend(&db, inst.id, GroupBy::Quarterly).await?;
        assert_eq!(quarterly.len(), 2);
        assert_eq!(quarterly[0].total_spent, 300.0);
        assert_eq!(quarterly[1].period.quarter, Some(3));

        let annual = spending_trend(&db, inst.id, GroupBy::Annually).await?;
        assert_eq!(annual.len(), 1);
        assert_eq!(annual[0].total_spent, 600.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_department_share_merges_records() -> Result<()> {
        let (db, inst, dept) = setup_linked_department().await?;
        create_test_spend(&db, dept.id, inst.id, 300.0).await?;
        create_test_spend(&db, dept.id, inst.id, 700.0).await?;

        let shares = department_share(&db, inst.id).await?;
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].department_id, dept.id);
        assert_eq!(shares[0].department_name, "Roads");
        assert_eq!(shares[0].total_spent, 1000.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_department_share_orders_by_total() -> Result<()> {
        let (db, inst, roads) = setup_linked_department().await?;
        let parks = create_test_department(&db, "PARKS", "Parks").await?;
        crate::core::institution::link_department(&db, inst.id, "PARKS").await?;
        create_test_spend(&db, roads.id, inst.id, 100.0).await?;
        create_test_spend(&db, parks.id, inst.id, 900.0).await?;

        let shares = department_share(&db, inst.id).await?;
        assert_eq!(shares[0].department_name, "Parks");
        assert_eq!(shares[1].department_name, "Roads");
        Ok(())
    }

    #[tokio::test]
    async fn test_analytics_unknown_institution() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(matches!(
            department_share(&db, 77).await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            spending_trend(&db, 77, GroupBy::Monthly).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }
}
