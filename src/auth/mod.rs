//! Admin authentication: credential checks, session tokens and the
//! password change flow.

pub mod jwt;
pub mod password;
pub mod session;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::AuthEnv;
use crate::db::admin::{self, AdminUser};
use crate::db::{Database, DbError};

pub use jwt::{JwtSessions, SessionClaims};
pub use password::{PasswordRequirement, validate_password_strength};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Hash(String),

    #[error("{0}")]
    Token(String),

    #[error(transparent)]
    Storage(#[from] DbError),
}

#[derive(Debug, Error)]
pub enum PasswordChangeError {
    #[error("Current password is incorrect")]
    IncorrectCurrentPassword,

    #[error("New password must contain {}", join_requirements(.0))]
    WeakPassword(Vec<PasswordRequirement>),

    #[error("New password must differ from the current password")]
    Unchanged,

    #[error("Admin user not found")]
    UserNotFound,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Storage(#[from] DbError),
}

fn join_requirements(requirements: &[PasswordRequirement]) -> String {
    requirements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The admin user when the email and password match. Every failure,
/// including storage errors, is `None`.
pub fn validate_admin_credentials(db: &Database, email: &str, password: &str) -> Option<AdminUser> {
    let user = match db.with_conn(|conn| admin::get_admin_by_email(conn, email)) {
        Ok(Some(user)) => user,
        Ok(None) => return None,
        Err(e) => {
            tracing::error!(error = %e, "Failed to look up admin user");
            return None;
        }
    };

    match password::verify_password(password, &user.password_hash) {
        Ok(true) => Some(user),
        Ok(false) => None,
        Err(e) => {
            warn!(error = %e, "Stored admin password hash is unreadable");
            None
        }
    }
}

/// Creates the admin account from the environment when none exists.
/// Returns true when an account was created.
pub fn ensure_admin_user(db: &Database, env: &AuthEnv) -> Result<bool, AuthError> {
    if db.with_conn(admin::count_admins)? > 0 {
        return Ok(false);
    }

    let unmet = validate_password_strength(&env.admin_password);
    if !unmet.is_empty() {
        warn!(
            missing = %join_requirements(&unmet),
            "ADMIN_PASSWORD does not meet the password policy"
        );
    }

    let hash = password::hash_password(&env.admin_password)?;
    let user = db.with_conn(|conn| admin::create_admin(conn, &env.admin_email, "Admin", &hash))?;
    info!(email = %user.email, "Created admin user");
    Ok(true)
}

pub fn change_admin_password(
    db: &Database,
    user_id: i64,
    current_password: &str,
    new_password: &str,
) -> Result<(), PasswordChangeError> {
    let user = db
        .with_conn(|conn| admin::get_admin_by_id(conn, user_id))?
        .ok_or(PasswordChangeError::UserNotFound)?;

    if !password::verify_password(current_password, &user.password_hash)? {
        return Err(PasswordChangeError::IncorrectCurrentPassword);
    }

    let unmet = validate_password_strength(new_password);
    if !unmet.is_empty() {
        return Err(PasswordChangeError::WeakPassword(unmet));
    }
    if new_password == current_password {
        return Err(PasswordChangeError::Unchanged);
    }

    let hash = password::hash_password(new_password)?;
    db.with_conn(|conn| admin::update_password_hash(conn, user.id, &hash))?;
    info!(user_id, "Admin password changed");
    Ok(())
}
