//! Metrics for the intake, crisis and payment flows.
//!
//! Names come from [`MetricName`] so call sites never carry magic strings.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::sync::OnceLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Intake
    SubmissionsAccepted,
    SubmissionsRejected,
    SubmissionRiskScore,
    CriticalSubmissions,

    // Crisis alerts
    CrisisAlertsRaised,
    CrisisAlertsResolved,
    CrisisNotificationsFailed,

    // Tickets and payments
    TicketsOpened,
    PaymentsSettled,
    PaymentSignatureRejected,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SubmissionsAccepted => "consult_submissions_accepted_total",
            MetricName::SubmissionsRejected => "consult_submissions_rejected_total",
            MetricName::SubmissionRiskScore => "consult_submission_risk_score",
            MetricName::CriticalSubmissions => "consult_submissions_critical_total",
            MetricName::CrisisAlertsRaised => "consult_crisis_alerts_raised_total",
            MetricName::CrisisAlertsResolved => "consult_crisis_alerts_resolved_total",
            MetricName::CrisisNotificationsFailed => "consult_crisis_notifications_failed_total",
            MetricName::TicketsOpened => "consult_tickets_opened_total",
            MetricName::PaymentsSettled => "consult_payments_settled_total",
            MetricName::PaymentSignatureRejected => "consult_payment_signature_rejected_total",
        }
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once per process.
pub fn init() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if METRICS_HANDLE.set(handle).is_ok() {
                info!("Metrics recorder installed");
            }
        }
        Err(e) => warn!("Prometheus recorder install failed (possibly already installed): {}", e),
    }
}

/// Render the current metrics in Prometheus text format.
pub fn render() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

pub mod intake {
    use super::MetricName;

    pub fn submission_accepted(risk_level: &'static str, total_score: i64) {
        ::metrics::counter!(MetricName::SubmissionsAccepted.as_str(), "risk_level" => risk_level)
            .increment(1);
        ::metrics::histogram!(MetricName::SubmissionRiskScore.as_str()).record(total_score as f64);
    }

    pub fn submission_rejected() {
        ::metrics::counter!(MetricName::SubmissionsRejected.as_str()).increment(1);
    }

    pub fn critical_submission() {
        ::metrics::counter!(MetricName::CriticalSubmissions.as_str()).increment(1);
    }
}

pub mod crisis {
    use super::MetricName;

    pub fn alert_raised() {
        ::metrics::counter!(MetricName::CrisisAlertsRaised.as_str()).increment(1);
    }

    pub fn alert_resolved() {
        ::metrics::counter!(MetricName::CrisisAlertsResolved.as_str()).increment(1);
    }

    pub fn notification_failed() {
        ::metrics::counter!(MetricName::CrisisNotificationsFailed.as_str()).increment(1);
    }
}

pub mod billing {
    use super::MetricName;

    pub fn ticket_opened(priority: &'static str) {
        ::metrics::counter!(MetricName::TicketsOpened.as_str(), "priority" => priority).increment(1);
    }

    pub fn payment_settled() {
        ::metrics::counter!(MetricName::PaymentsSettled.as_str()).increment(1);
    }

    pub fn signature_rejected() {
        ::metrics::counter!(MetricName::PaymentSignatureRejected.as_str()).increment(1);
    }
}
