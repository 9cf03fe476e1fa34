use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::app::ports::{CaptchaVerifier, CrisisNotifier};
use crate::config::RiskThresholds;
use crate::domain::{CrisisAlert, FormAnswer, FormSubmission, User};
use crate::engine::{self, Answers, Evaluation};
use crate::error::{AppError, Result};
use crate::observability::metrics;
use crate::storage::{alerts, submissions, Database, SubmissionFilter};

#[derive(Debug, Clone, Serialize)]
pub struct IntakeOutcome {
    pub submission: FormSubmission,
    pub crisis_alert: Option<CrisisAlert>,
}

/// Public screening: evaluate, persist, escalate
pub struct IntakeUseCase {
    db: Arc<Database>,
    captcha: Arc<dyn CaptchaVerifier>,
    notifier: Arc<dyn CrisisNotifier>,
    thresholds: RiskThresholds,
}

impl IntakeUseCase {
    pub fn new(
        db: Arc<Database>,
        captcha: Arc<dyn CaptchaVerifier>,
        notifier: Arc<dyn CrisisNotifier>,
        thresholds: RiskThresholds,
    ) -> Self {
        Self {
            db,
            captcha,
            notifier,
            thresholds,
        }
    }

    /// Score answers against the active template without storing anything.
    pub fn evaluate(&self, slug: &str, answers: &Answers) -> Result<Evaluation> {
        let template = self.db.get_active_template(slug)?;
        engine::evaluate(&template, answers, &self.thresholds)
    }

    #[instrument(skip(self, actor, answers, captcha_token))]
    pub async fn submit(
        &self,
        slug: &str,
        actor: Option<&User>,
        answers: &Answers,
        captcha_token: Option<&str>,
    ) -> Result<IntakeOutcome> {
        self.check_captcha(captcha_token).await?;

        let template = self.db.get_active_template(slug)?;
        let evaluation = match engine::evaluate(&template, answers, &self.thresholds) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                metrics::intake::submission_rejected();
                return Err(e);
            }
        };

        let submission_id = Uuid::new_v4();
        let submission = FormSubmission {
            id: submission_id,
            template_id: template.id,
            template_version: template.version,
            user_id: actor.map(|u| u.id),
            total_risk_score: evaluation.total_risk_score,
            risk_level: evaluation.risk_level,
            urgency: evaluation.urgency,
            is_critical: evaluation.is_critical,
            needs_expert: evaluation.needs_expert,
            created_at: Utc::now(),
            answers: evaluation
                .answers
                .iter()
                .map(|a| FormAnswer {
                    id: Uuid::new_v4(),
                    submission_id,
                    field_id: a.field_id,
                    field_key: a.field_key.clone(),
                    field_label: a.field_label.clone(),
                    value: a.value.clone(),
                    risk_score: a.risk_score,
                })
                .collect(),
        };
        let crisis_alert = submission.is_critical.then(|| {
            CrisisAlert::new(
                submission.id,
                submission.user_id,
                submission.total_risk_score,
                alert_reason(&evaluation, &self.thresholds),
            )
        });

        self.db.transaction(|c| {
            submissions::insert(c, &submission)?;
            if let Some(alert) = &crisis_alert {
                alerts::insert(c, alert)?;
            }
            Ok(())
        })?;

        metrics::intake::submission_accepted(submission.risk_level.as_str(), submission.total_risk_score);
        info!(
            submission_id = %submission.id,
            template = %template.slug,
            score = submission.total_risk_score,
            risk_level = %submission.risk_level,
            "Stored form submission"
        );

        if let Some(alert) = &crisis_alert {
            metrics::intake::critical_submission();
            metrics::crisis::alert_raised();
            warn!(alert_id = %alert.id, submission_id = %submission.id, "Crisis alert raised");
            // delivery problems must never lose the stored submission
            if let Err(e) = self.notifier.crisis_raised(alert, &submission).await {
                metrics::crisis::notification_failed();
                warn!(alert_id = %alert.id, "Crisis notification failed: {:#}", e);
            }
        }

        Ok(IntakeOutcome {
            submission,
            crisis_alert,
        })
    }

    /// Owners see their own submissions; staff see all.
    pub fn get_submission(&self, actor: &User, id: Uuid) -> Result<FormSubmission> {
        let submission = self.db.get_submission(id)?;
        if actor.is_staff() || submission.user_id == Some(actor.id) {
            Ok(submission)
        } else {
            Err(AppError::forbidden("You may not view this submission."))
        }
    }

    pub fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Vec<FormSubmission>> {
        self.db.list_submissions(filter)
    }

    pub fn list_own_submissions(&self, actor: &User) -> Result<Vec<FormSubmission>> {
        self.db.list_submissions(&SubmissionFilter {
            user_id: Some(actor.id),
            ..SubmissionFilter::default()
        })
    }

    async fn check_captcha(&self, token: Option<&str>) -> Result<()> {
        let passed = match self.captcha.verify(token).await {
            Ok(passed) => passed,
            Err(e) => {
                warn!("reCAPTCHA verification errored: {:#}", e);
                false
            }
        };
        if passed {
            Ok(())
        } else {
            metrics::intake::submission_rejected();
            Err(AppError::field(
                "captcha_token",
                "The reCAPTCHA verification failed. Please try again.",
            ))
        }
    }
}

fn alert_reason(evaluation: &Evaluation, thresholds: &RiskThresholds) -> String {
    if evaluation.critical_indicators.is_empty() {
        format!(
            "Risk score {} reached the critical threshold of {}.",
            evaluation.total_risk_score, thresholds.critical
        )
    } else {
        format!(
            "Critical indicator answered: {} (risk score {}).",
            evaluation.critical_indicators.join(", "),
            evaluation.total_risk_score
        )
    }
}
