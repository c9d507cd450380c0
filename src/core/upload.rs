//! Upload validation and record parsing for allocation and spending reports.
//!
//! Only CSV and PDF files are accepted, and only up to the configured size. The
//! check runs before anything is stored or any anomaly check is triggered.
//! Both formats yield the same [`ParsedRecord`] rows:
//! `amount, counterparty, description, date`.

use crate::errors::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CSV_CONTENT_TYPES: &[&str] = &[
    "text/csv",
    "application/csv",
    "application/vnd.ms-excel",
    "text/plain",
    "application/octet-stream",
];
const PDF_CONTENT_TYPES: &[&str] = &["application/pdf", "application/octet-stream"];

/// Accepted upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Comma-separated values with a header row
    Csv,
    /// PDF whose text lines are comma-separated records
    Pdf,
}

impl UploadKind {
    /// File extension used when storing the upload.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Pdf => "pdf",
        }
    }
}

/// One line of an uploaded report.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    /// Positive amount
    pub amount: f64,
    /// Vendor (allocations) or recipient (spending)
    pub counterparty: String,
    /// Free-text description, may be empty
    pub description: String,
    /// Date of the record
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    amount: String,
    #[serde(alias = "vendor", alias = "recipient")]
    counterparty: String,
    #[serde(default)]
    description: String,
    date: String,
}

fn reject(message: impl Into<String>) -> Error {
    Error::Upload {
        message: message.into(),
    }
}

/// Checks name, declared content type and size of an upload.
///
/// # Errors
/// Returns [`Error::Upload`] for anything that is not a non-empty CSV or PDF
/// of at most `max_bytes`.
pub fn validate_upload(
    file_name: &str,
    content_type: Option<&str>,
    len: usize,
    max_bytes: usize,
) -> Result<UploadKind> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let kind = match extension.as_deref() {
        Some("csv") => UploadKind::Csv,
        Some("pdf") => UploadKind::Pdf,
        _ => return Err(reject("only CSV or PDF files are accepted")),
    };

    if let Some(content_type) = content_type {
        // Ignore parameters such as "; charset=utf-8"
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim()
            .to_ascii_lowercase();
        let allowed = match kind {
            UploadKind::Csv => CSV_CONTENT_TYPES,
            UploadKind::Pdf => PDF_CONTENT_TYPES,
        };
        if !allowed.contains(&essence.as_str()) {
            return Err(reject(format!(
                "content type '{essence}' does not match a .{} file",
                kind.extension()
            )));
        }
    }

    if len == 0 {
        return Err(reject("file is empty"));
    }
    if len > max_bytes {
        return Err(reject(format!(
            "file is {len} bytes, the limit is {max_bytes} bytes"
        )));
    }

    Ok(kind)
}

fn parse_amount(raw: &str, row: usize) -> Result<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    let amount: f64 = cleaned
        .parse()
        .map_err(|_| Error::bad_request(format!("row {row}: invalid amount '{raw}'")))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::bad_request(format!(
            "row {row}: amount must be a positive number"
        )));
    }
    Ok(amount)
}

fn parse_date(raw: &str, row: usize) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        Error::bad_request(format!(
            "row {row}: invalid date '{raw}', expected YYYY-MM-DD"
        ))
    })
}

fn build_record(raw: RawRecord, row: usize) -> Result<ParsedRecord> {
    let counterparty = raw.counterparty.trim().to_string();
    if counterparty.is_empty() {
        return Err(Error::bad_request(format!(
            "row {row}: counterparty is required"
        )));
    }
    Ok(ParsedRecord {
        amount: parse_amount(&raw.amount, row)?,
        counterparty,
        description: raw.description.trim().to_string(),
        date: parse_date(&raw.date, row)?,
    })
}

/// Parses CSV bytes with a header row into records.
///
/// Header names are matched case-insensitively; `vendor` and `recipient` are
/// accepted as aliases of `counterparty`.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<ParsedRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| Error::bad_request(format!("unreadable CSV header: {e}")))?
        .iter()
        .map(str::to_ascii_lowercase)
        .collect::<csv::StringRecord>();
    reader.set_headers(headers);

    let mut records = Vec::new();
    for (index, raw) in reader.deserialize::<RawRecord>().enumerate() {
        // Row 1 is the header
        let row = index + 2;
        let raw = raw.map_err(|e| Error::bad_request(format!("row {row}: {e}")))?;
        records.push(build_record(raw, row)?);
    }
    Ok(records)
}

/// Parses record lines out of text extracted from a PDF.
///
/// Lines with fewer than four comma-separated fields are treated as layout
/// text (titles, page numbers) and skipped. Commas inside the description are
/// kept: the first field is the amount, the second the counterparty, the last
/// the date and everything between them the description.
pub fn parse_text_lines(text: &str) -> Result<Vec<ParsedRecord>> {
    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let row = index + 1;
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 4 {
            continue;
        }
        if fields[0].eq_ignore_ascii_case("amount") {
            continue;
        }
        let last = fields.len() - 1;
        let raw = RawRecord {
            amount: fields[0].to_string(),
            counterparty: fields[1].to_string(),
            description: fields[2..last].join(", "),
            date: fields[last].to_string(),
        };
        records.push(build_record(raw, row)?);
    }
    Ok(records)
}

/// Parses an upload of the given kind into records.
///
/// # Errors
/// Returns [`Error::BadRequest`] for malformed rows or a file without records.
pub fn parse_records(kind: UploadKind, bytes: &[u8]) -> Result<Vec<ParsedRecord>> {
    let records = match kind {
        UploadKind::Csv => parse_csv(bytes)?,
        UploadKind::Pdf => {
            let text = pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| Error::bad_request(format!("unreadable PDF: {e}")))?;
            parse_text_lines(&text)?
        }
    };

    if records.is_empty() {
        return Err(Error::bad_request("file contains no records"));
    }
    Ok(records)
}

/// Copies the uploaded bytes into `upload_dir` under a fresh name.
///
/// Returns the stored path, which is recorded as the report's `source_url`.
pub async fn store_upload(upload_dir: &Path, kind: UploadKind, bytes: &[u8]) -> Result<String> {
    tokio::fs::create_dir_all(upload_dir).await?;
    let file_name = format!("{}.{}", uuid::Uuid::new_v4(), kind.extension());
    let path: PathBuf = upload_dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    tracing::debug!("Stored upload at {}", path.display());
    Ok(path.to_string_lossy().into_owned())
}

/// Deletes a stored upload whose records were never saved.
pub async fn discard_upload(path: &str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Discarded upload {}", path),
        Err(e) => tracing::warn!("Failed to discard upload {}: {}", path, e),
    }
}
