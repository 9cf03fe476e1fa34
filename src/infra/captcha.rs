use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::app::ports::CaptchaVerifier;
use crate::config::RecaptchaConfig;
use crate::error::Result;

/// Accepts everything; used when no secret is configured
pub struct DisabledCaptcha;

#[async_trait]
impl CaptchaVerifier for DisabledCaptcha {
    async fn verify(&self, _token: Option<&str>) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Google reCAPTCHA `siteverify` client
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    secret: String,
    verify_url: String,
    min_score: f64,
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    /// v3 only
    score: Option<f64>,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

impl RecaptchaVerifier {
    pub fn new(secret: String, config: &RecaptchaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            secret,
            verify_url: config.verify_url.clone(),
            min_score: config.min_score,
        })
    }

    fn accepts(&self, resp: &SiteVerifyResponse) -> bool {
        resp.success && resp.score.map_or(true, |s| s >= self.min_score)
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaVerifier {
    async fn verify(&self, token: Option<&str>) -> anyhow::Result<bool> {
        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            return Ok(false);
        };
        let resp: SiteVerifyResponse = self
            .client
            .post(&self.verify_url)
            .form(&[("secret", self.secret.as_str()), ("response", token)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let ok = self.accepts(&resp);
        if ok {
            debug!(score = ?resp.score, "captcha accepted");
        } else {
            warn!(score = ?resp.score, errors = ?resp.error_codes, "captcha rejected");
        }
        Ok(ok)
    }
}

/// Pick the verifier the configuration asks for.
pub fn from_config(config: &RecaptchaConfig) -> Result<Arc<dyn CaptchaVerifier>> {
    let verifier: Arc<dyn CaptchaVerifier> = match &config.secret {
        Some(secret) => Arc::new(RecaptchaVerifier::new(secret.clone(), config)?),
        None => Arc::new(DisabledCaptcha),
    };
    Ok(verifier)
}
