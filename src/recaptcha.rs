use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::RecaptchaSettings;
use crate::http_client::build_api_client;

const RECAPTCHA_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    /// Only reCAPTCHA v3 reports a score
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Outcome of a token check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Passed,
    Failed,
    /// No secret configured
    Skipped,
}

impl Verification {
    pub fn is_accepted(self) -> bool {
        !matches!(self, Verification::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    verify_url: String,
    secret: Option<String>,
    min_score: f64,
}

impl RecaptchaVerifier {
    pub fn new(settings: &RecaptchaSettings) -> Result<Self> {
        if settings.secret.is_none() {
            warn!("RECAPTCHA_SECRET_KEY not set, reCAPTCHA verification is disabled");
        }

        Ok(Self {
            client: build_api_client(RECAPTCHA_TIMEOUT_SECS)?,
            verify_url: settings.verify_url.clone(),
            secret: settings.secret.clone(),
            min_score: settings.min_score,
        })
    }

    pub async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<Verification> {
        let Some(secret) = self.secret.as_deref() else {
            debug!("Skipping reCAPTCHA verification");
            return Ok(Verification::Skipped);
        };

        let mut form = vec![("secret", secret), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response: SiteVerifyResponse = self
            .client
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await
            .context("reCAPTCHA request failed")?
            .error_for_status()
            .context("reCAPTCHA endpoint returned an error")?
            .json()
            .await
            .context("Invalid reCAPTCHA response")?;

        let passed = response.success
            && response.score.is_none_or(|score| score >= self.min_score);

        if !passed {
            warn!(
                success = response.success,
                score = ?response.score,
                action = ?response.action,
                errors = ?response.error_codes,
                "reCAPTCHA verification failed"
            );
        }

        Ok(if passed {
            Verification::Passed
        } else {
            Verification::Failed
        })
    }
}
