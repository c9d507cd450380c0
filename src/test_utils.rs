//! Shared test utilities for `LedgerLight`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults. Entities are inserted
//! directly so tests don't pay for password hashing.

use crate::{
    core::{
        assistant::{Assistant, AssistantRequest},
        institution,
    },
    entities::{
        TransactionStatus, department, department_transaction, institution as institution_entity,
        report, transaction, user,
    },
    errors::{Error, Result},
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{DatabaseConnection, Set, prelude::*};
use std::sync::Mutex;

/// Stand-in for a real password hash in directly inserted rows.
pub const TEST_PASSWORD_HASH: &str = "not-a-real-hash";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test institution named `name`.
pub async fn create_test_institution(
    db: &DatabaseConnection,
    name: &str,
) -> Result<institution_entity::Model> {
    institution_entity::ActiveModel {
        name: Set(name.to_string()),
        password_hash: Set(TEST_PASSWORD_HASH.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates an unlinked test department.
pub async fn create_test_department(
    db: &DatabaseConnection,
    code: &str,
    name: &str,
) -> Result<department::Model> {
    department::ActiveModel {
        department_code: Set(code.to_string()),
        name: Set(name.to_string()),
        password_hash: Set(TEST_PASSWORD_HASH.to_string()),
        institution_id: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates a test user named `name`.
pub async fn create_test_user(db: &DatabaseConnection, name: &str) -> Result<user::Model> {
    user::ActiveModel {
        name: Set(name.to_string()),
        password_hash: Set(TEST_PASSWORD_HASH.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Sets up a complete test environment with a linked department.
/// Returns (db, institution "City", department "ROADS"/"Roads").
pub async fn setup_linked_department() -> Result<(
    DatabaseConnection,
    institution_entity::Model,
    department::Model,
)> {
    let db = setup_test_db().await?;
    let inst = create_test_institution(&db, "City").await?;
    create_test_department(&db, "ROADS", "Roads").await?;
    let dept = institution::link_department(&db, inst.id, "ROADS").await?;
    Ok((db, inst, dept))
}

async fn create_test_report(
    db: &DatabaseConnection,
    institution_id: i64,
    department_id: i64,
    report_type: report::ReportType,
    date: NaiveDate,
) -> Result<report::Model> {
    report::ActiveModel {
        name: Set("Test report".to_string()),
        report_type: Set(report_type),
        date: Set(date),
        source_url: Set(None),
        institution_id: Set(institution_id),
        department_id: Set(Some(department_id)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

fn test_date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Error::bad_request(format!("invalid test date {year}-{month}-{day}")))
}

/// Creates an allocation with the given status, dated 2024-01-15.
///
/// # Defaults
/// * `vendor`: "Test vendor"
/// * `description`: "Test allocation"
pub async fn create_test_allocation(
    db: &DatabaseConnection,
    institution_id: i64,
    department_id: i64,
    amount: f64,
    status: TransactionStatus,
) -> Result<transaction::Model> {
    create_dated_allocation(db, institution_id, department_id, amount, status, 2024, 1, 15).await
}

/// Creates an allocation with the given status and date.
#[allow(clippy::too_many_arguments)]
pub async fn create_dated_allocation(
    db: &DatabaseConnection,
    institution_id: i64,
    department_id: i64,
    amount: f64,
    status: TransactionStatus,
    year: i32,
    month: u32,
    day: u32,
) -> Result<transaction::Model> {
    let date = test_date(year, month, day)?;
    let report =
        create_test_report(db, institution_id, department_id, report::ReportType::Allocation, date)
            .await?;
    transaction::ActiveModel {
        amount: Set(amount),
        vendor: Set("Test vendor".to_string()),
        description: Set("Test allocation".to_string()),
        date: Set(date),
        status: Set(status),
        institution_id: Set(institution_id),
        department_id: Set(department_id),
        report_id: Set(report.id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates a spending record dated 2024-02-01.
///
/// # Defaults
/// * `recipient`: "Test vendor"
/// * `report_id`: None
pub async fn create_test_spend(
    db: &DatabaseConnection,
    department_id: i64,
    institution_id: i64,
    amount: f64,
) -> Result<department_transaction::Model> {
    create_dated_spend(db, department_id, institution_id, amount, 2024, 2, 1).await
}

/// Creates a spending record on the given date.
pub async fn create_dated_spend(
    db: &DatabaseConnection,
    department_id: i64,
    institution_id: i64,
    amount: f64,
    year: i32,
    month: u32,
    day: u32,
) -> Result<department_transaction::Model> {
    department_transaction::ActiveModel {
        amount: Set(amount),
        recipient: Set("Test vendor".to_string()),
        description: Set("Test spend".to_string()),
        date: Set(test_date(year, month, day)?),
        department_id: Set(department_id),
        institution_id: Set(institution_id),
        report_id: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Assistant that replies from a script and records what it was asked.
pub struct ScriptedAssistant {
    reply: Option<String>,
    requests: Mutex<Vec<AssistantRequest>>,
}

impl ScriptedAssistant {
    /// Always answers with `reply`.
    #[must_use]
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always fails like an unreachable upstream.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<AssistantRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Assistant for ScriptedAssistant {
    async fn generate(&self, request: &AssistantRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.reply.clone().ok_or_else(|| Error::Assistant {
            message: "scripted failure".to_string(),
        })
    }
}
