use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::text_enum;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Pending,
    Acknowledged,
    Resolved,
}

text_enum!(AlertStatus {
    Pending => "pending",
    Acknowledged => "acknowledged",
    Resolved => "resolved",
});

/// Raised for a critical submission; stays open until an admin resolves it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrisisAlert {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub user_id: Option<Uuid>,
    pub risk_score: i64,
    pub reason: String,
    pub status: AlertStatus,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CrisisAlert {
    pub fn new(submission_id: Uuid, user_id: Option<Uuid>, risk_score: i64, reason: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            submission_id,
            user_id,
            risk_score,
            reason,
            status: AlertStatus::Pending,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            resolution_notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn acknowledge(&mut self, admin_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if self.status != AlertStatus::Pending {
            return Err(AppError::rule(format!(
                "Only pending alerts can be acknowledged (alert is {}).",
                self.status
            )));
        }
        self.status = AlertStatus::Acknowledged;
        self.acknowledged_by = Some(admin_id);
        self.acknowledged_at = Some(at);
        Ok(())
    }

    /// Pending alerts may be resolved directly; acknowledgement is then implied.
    pub fn resolve(&mut self, admin_id: Uuid, notes: &str, at: DateTime<Utc>) -> Result<()> {
        if self.status == AlertStatus::Resolved {
            return Err(AppError::rule("Alert is already resolved."));
        }
        let notes = notes.trim();
        if notes.is_empty() {
            return Err(AppError::field("resolution_notes", "Resolution notes are required."));
        }
        if self.status == AlertStatus::Pending {
            self.acknowledged_by = Some(admin_id);
            self.acknowledged_at = Some(at);
        }
        self.status = AlertStatus::Resolved;
        self.resolved_by = Some(admin_id);
        self.resolved_at = Some(at);
        self.resolution_notes = Some(notes.to_string());
        Ok(())
    }
}
