//! Account registration, login and auth tokens.
//!
//! Passwords are stored as Argon2 PHC strings. A successful login produces an
//! [`Identity`], which is signed into an HS256 token carrying `{id, name, role}`.
//! The HTTP layer puts that token in an httpOnly cookie.

use crate::{
    core::policy::Role,
    entities::{Department, Institution, User, department, institution, user},
    errors::{Error, Result},
};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::{Set, prelude::*};
use serde::{Deserialize, Serialize};

/// Shortest password accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Who is making a request, as carried in the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Primary key in the table matching `role`
    pub id: i64,
    /// Display name
    pub name: String,
    /// Account kind
    pub role: Role,
}

/// Token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Account kind
    pub role: Role,
    /// Expiry, seconds since epoch
    pub exp: i64,
    /// Issued at, seconds since epoch
    pub iat: i64,
}

/// Signing material plus token lifetime.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    /// Builds HS256 keys from a shared secret.
    #[must_use]
    pub fn new(secret: &[u8], ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Token lifetime in seconds, for the cookie `Max-Age`.
    #[must_use]
    pub const fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Signs a token for `identity`.
    pub fn issue_token(&self, identity: &Identity) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            id: identity.id,
            name: identity.name.clone(),
            role: identity.role,
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| Error::Internal {
            message: format!("Failed to sign token: {e}"),
        })
    }

    /// Validates signature and expiry, returning the identity inside.
    pub fn verify_token(&self, token: &str) -> Result<Identity> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(
            |e| Error::Unauthenticated {
                message: format!("Invalid token: {e}"),
            },
        )?;
        Ok(Identity {
            id: data.claims.id,
            name: data.claims.name,
            role: data.claims.role,
        })
    }
}

/// Hashes a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal {
            message: format!("Failed to hash password: {e}"),
        })
}

/// Checks a password against a stored PHC string.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

fn validate_credentials(name: &str, password: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::bad_request("Name cannot be empty"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn invalid_login() -> Error {
    Error::Unauthenticated {
        message: "Invalid credentials".to_string(),
    }
}

/// Registers a new institution.
pub async fn register_institution(
    db: &DatabaseConnection,
    name: &str,
    password: &str,
) -> Result<Identity> {
    validate_credentials(name, password)?;
    let name = name.trim();

    let existing = Institution::find()
        .filter(institution::Column::Name.eq(name))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::Conflict {
            message: format!("Institution '{name}' already exists"),
        });
    }

    let model = institution::ActiveModel {
        name: Set(name.to_string()),
        password_hash: Set(hash_password(password)?),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!("Registered institution {} ({})", model.name, model.id);
    Ok(Identity {
        id: model.id,
        name: model.name,
        role: Role::Institution,
    })
}

/// Registers a new department under a shareable code.
pub async fn register_department(
    db: &DatabaseConnection,
    department_code: &str,
    name: &str,
    password: &str,
) -> Result<Identity> {
    validate_credentials(name, password)?;
    let code = department_code.trim();
    if code.is_empty() {
        return Err(Error::bad_request("Department code cannot be empty"));
    }

    let existing = Department::find()
        .filter(department::Column::DepartmentCode.eq(code))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::Conflict {
            message: format!("Department code '{code}' is already taken"),
        });
    }

    let model = department::ActiveModel {
        department_code: Set(code.to_string()),
        name: Set(name.trim().to_string()),
        password_hash: Set(hash_password(password)?),
        institution_id: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!("Registered department {} ({})", model.department_code, model.id);
    Ok(Identity {
        id: model.id,
        name: model.name,
        role: Role::Department,
    })
}

/// Registers a new public user.
pub async fn register_user(db: &DatabaseConnection, name: &str, password: &str) -> Result<Identity> {
    validate_credentials(name, password)?;
    let name = name.trim();

    let existing = User::find()
        .filter(user::Column::Name.eq(name))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::Conflict {
            message: format!("User '{name}' already exists"),
        });
    }

    let model = user::ActiveModel {
        name: Set(name.to_string()),
        password_hash: Set(hash_password(password)?),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!("Registered user {}", model.id);
    Ok(Identity {
        id: model.id,
        name: model.name,
        role: Role::User,
    })
}

/// Logs an institution in by name.
pub async fn login_institution(
    db: &DatabaseConnection,
    name: &str,
    password: &str,
) -> Result<Identity> {
    let model = Institution::find()
        .filter(institution::Column::Name.eq(name.trim()))
        .one(db)
        .await?
        .ok_or_else(invalid_login)?;
    if !verify_password(password, &model.password_hash) {
        return Err(invalid_login());
    }
    Ok(Identity {
        id: model.id,
        name: model.name,
        role: Role::Institution,
    })
}

/// Logs a department in by its code.
pub async fn login_department(
    db: &DatabaseConnection,
    department_code: &str,
    password: &str,
) -> Result<Identity> {
    let model = Department::find()
        .filter(department::Column::DepartmentCode.eq(department_code.trim()))
        .one(db)
        .await?
        .ok_or_else(invalid_login)?;
    if !verify_password(password, &model.password_hash) {
        return Err(invalid_login());
    }
    Ok(Identity {
        id: model.id,
        name: model.name,
        role: Role::Department,
    })
}

/// Logs a public user in by name.
pub async fn login_user(db: &DatabaseConnection, name: &str, password: &str) -> Result<Identity> {
    let model = User::find()
        .filter(user::Column::Name.eq(name.trim()))
        .one(db)
        .await?
        .ok_or_else(invalid_login)?;
    if !verify_password(password, &model.password_hash) {
        return Err(invalid_login());
    }
    Ok(Identity {
        id: model.id,
        name: model.name,
        role: Role::User,
    })
}
