use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::app::ports::CrisisNotifier;
use crate::config::NotificationConfig;
use crate::domain::{CrisisAlert, FormSubmission};
use crate::error::Result;

/// Writes alerts to the log only
pub struct LogNotifier;

#[async_trait]
impl CrisisNotifier for LogNotifier {
    async fn crisis_raised(
        &self,
        alert: &CrisisAlert,
        submission: &FormSubmission,
    ) -> anyhow::Result<()> {
        warn!(
            alert_id = %alert.id,
            submission_id = %submission.id,
            risk_score = alert.risk_score,
            reason = %alert.reason,
            "Crisis alert raised"
        );
        Ok(())
    }
}

/// POSTs a JSON summary of each alert to an on-call webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl CrisisNotifier for WebhookNotifier {
    async fn crisis_raised(
        &self,
        alert: &CrisisAlert,
        submission: &FormSubmission,
    ) -> anyhow::Result<()> {
        let payload = json!({
            "event": "crisis_alert.raised",
            "alert_id": alert.id,
            "submission_id": submission.id,
            "user_id": alert.user_id,
            "risk_score": alert.risk_score,
            "risk_level": submission.risk_level,
            "urgency": submission.urgency,
            "reason": alert.reason,
            "raised_at": alert.created_at,
        });
        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        info!(alert_id = %alert.id, "Crisis alert delivered to webhook");
        Ok(())
    }
}

pub fn from_config(config: &NotificationConfig) -> Result<Arc<dyn CrisisNotifier>> {
    let notifier: Arc<dyn CrisisNotifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => Arc::new(LogNotifier),
    };
    Ok(notifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_client_builds_with_timeout() {
        let config = NotificationConfig {
            webhook_url: Some("http://127.0.0.1:9/hooks/crisis".into()),
        };
        assert!(from_config(&config).is_ok());
        assert!(from_config(&NotificationConfig::default()).is_ok());
        assert_eq!(
            WebhookNotifier::new("http://127.0.0.1:9/".into()).unwrap().url,
            "http://127.0.0.1:9/"
        );
    }
}
