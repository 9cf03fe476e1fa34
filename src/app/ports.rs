use async_trait::async_trait;

use crate::domain::{CrisisAlert, FormSubmission};

/// Bot protection on public submissions
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// `Ok(false)` means the token was checked and rejected.
    async fn verify(&self, token: Option<&str>) -> anyhow::Result<bool>;
}

/// Delivery of crisis alerts to the people on call
#[async_trait]
pub trait CrisisNotifier: Send + Sync {
    async fn crisis_raised(
        &self,
        alert: &CrisisAlert,
        submission: &FormSubmission,
    ) -> anyhow::Result<()>;
}
