//! Request extractors shared by the handlers.

use crate::{
    api::AppState,
    core::{
        auth::Identity,
        policy::{Capability, Role},
        upload::{self, ParsedRecord, UploadKind},
    },
    entities::Participant,
    errors::{Error, Result},
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Multipart, multipart::MultipartError},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
};
use std::collections::HashMap;
use tower_cookies::{
    Cookie, Cookies,
    cookie::{SameSite, time::Duration},
};

/// Name of the httpOnly cookie carrying the auth token.
pub const TOKEN_COOKIE: &str = "token";

/// The authenticated caller. Rejects with 401 when no valid token is present.
///
/// The token is read from the `token` cookie, falling back to an
/// `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthSession(pub Identity);

impl AuthSession {
    /// Returns the identity if its role carries `capability`.
    pub fn require(&self, state: &AppState, capability: Capability) -> Result<&Identity> {
        state.policy.require(self.0.role, capability)?;
        Ok(&self.0)
    }

    /// The caller as a conversation participant.
    pub fn participant(&self) -> Result<Participant> {
        match self.0.role {
            Role::User => Ok(Participant::User(self.0.id)),
            Role::Department => Ok(Participant::Department(self.0.id)),
            Role::Institution => Err(Error::unauthorized(
                "Institutions do not take part in conversations",
            )),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let from_cookie = match Cookies::from_request_parts(parts, state).await {
            Ok(cookies) => cookies.get(TOKEN_COOKIE).map(|c| c.value().to_string()),
            Err(_) => None,
        };

        let token = from_cookie
            .or_else(|| bearer_token(parts))
            .ok_or_else(|| Error::Unauthenticated {
                message: "No authentication token".to_string(),
            })?;

        state.keys.verify_token(&token).map(AuthSession)
    }
}

/// Builds the auth cookie for a freshly issued token.
#[must_use]
pub fn session_cookie(token: String, ttl_seconds: i64) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(ttl_seconds))
        .build()
}

/// Builds a cookie that clears the auth token.
#[must_use]
pub fn expired_cookie() -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, "")).path("/").build()
}

/// A multipart upload with one `file` part and any number of text fields.
#[derive(Debug)]
pub struct UploadForm {
    /// Original file name
    pub file_name: String,
    /// Declared content type of the file part
    pub content_type: Option<String>,
    /// File contents
    pub bytes: Vec<u8>,
    /// Text fields by name
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// Reads every part of `multipart`. Fails when no `file` part is present.
    ///
    /// A body cut off by the request size limit is reported as
    /// [`Error::Upload`], like any other oversized file.
    pub async fn read(mut multipart: Multipart, max_bytes: usize) -> Result<Self> {
        let malformed = |context: String, e: MultipartError| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                Error::Upload {
                    message: format!("file exceeds the {max_bytes} byte limit"),
                }
            } else {
                Error::bad_request(format!("{context}: {e}"))
            }
        };

        let mut file = None;
        let mut fields = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| malformed("Malformed multipart body".to_string(), e))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(ToString::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| malformed("Could not read file".to_string(), e))?;
                file = Some((file_name, content_type, bytes.to_vec()));
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| malformed(format!("Could not read field '{name}'"), e))?;
                fields.insert(name, value);
            }
        }

        let (file_name, content_type, bytes) =
            file.ok_or_else(|| Error::bad_request("Missing 'file' part"))?;
        Ok(Self {
            file_name,
            content_type,
            bytes,
            fields,
        })
    }

    /// A required text field.
    pub fn field(&self, name: &str) -> Result<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::bad_request(format!("Missing '{name}' field")))
    }

    /// Validates the file, parses its records and stores a copy.
    ///
    /// Returns the records and the stored path. Nothing is written when
    /// validation or parsing fails. Callers discard the stored copy with
    /// [`upload::discard_upload`] if saving the records fails.
    pub async fn accept(&self, state: &AppState) -> Result<(UploadKind, Vec<ParsedRecord>, String)> {
        let uploads = &state.settings.uploads;
        let kind = upload::validate_upload(
            &self.file_name,
            self.content_type.as_deref(),
            self.bytes.len(),
            uploads.max_bytes,
        )?;
        let records = upload::parse_records(kind, &self.bytes)?;
        let stored = upload::store_upload(&uploads.upload_dir, kind, &self.bytes).await?;
        Ok((kind, records, stored))
    }
}
