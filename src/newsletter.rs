use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::db::{Database, DbError, subscribers};
use crate::recaptcha::RecaptchaVerifier;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub recaptcha_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("reCAPTCHA verification required")]
    MissingCaptcha,

    #[error("reCAPTCHA verification failed")]
    CaptchaRejected,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("reCAPTCHA verification unavailable")]
    CaptchaUnavailable(#[source] anyhow::Error),

    #[error("Failed to save subscription")]
    Storage(#[from] DbError),
}

/// Loose shape check: one `@`, a non-empty local part and a dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Adds an email to the newsletter after checking the captcha token. An
/// address that is already subscribed counts as success.
pub async fn subscribe(
    db: &Database,
    verifier: &RecaptchaVerifier,
    request: &SubscribeRequest,
    remote_ip: Option<&str>,
) -> Result<(), SubscribeError> {
    if request.recaptcha_token.trim().is_empty() {
        return Err(SubscribeError::MissingCaptcha);
    }
    if !is_valid_email(&request.email) {
        return Err(SubscribeError::InvalidEmail);
    }

    let verification = verifier
        .verify(&request.recaptcha_token, remote_ip)
        .await
        .map_err(SubscribeError::CaptchaUnavailable)?;
    if !verification.is_accepted() {
        return Err(SubscribeError::CaptchaRejected);
    }

    let added = db.with_conn(|conn| subscribers::subscribe(conn, &request.email))?;
    info!(new = added, "Newsletter subscription");
    Ok(())
}
