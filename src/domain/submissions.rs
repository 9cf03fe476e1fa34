use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::text_enum;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

text_enum!(RiskLevel {
    Low => "low",
    Moderate => "moderate",
    High => "high",
    Critical => "critical",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Routine,
    Soon,
    Urgent,
    Immediate,
}

text_enum!(Urgency {
    Routine => "routine",
    Soon => "soon",
    Urgent => "urgent",
    Immediate => "immediate",
});

impl From<RiskLevel> for Urgency {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => Urgency::Routine,
            RiskLevel::Moderate => Urgency::Soon,
            RiskLevel::High => Urgency::Urgent,
            RiskLevel::Critical => Urgency::Immediate,
        }
    }
}

/// A stored answer; key and label are snapshotted so history survives field edits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormAnswer {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub field_id: Uuid,
    pub field_key: String,
    pub field_label: String,
    pub value: serde_json::Value,
    pub risk_score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormSubmission {
    pub id: Uuid,
    pub template_id: Uuid,
    pub template_version: i64,
    pub user_id: Option<Uuid>,
    pub total_risk_score: i64,
    pub risk_level: RiskLevel,
    pub urgency: Urgency,
    pub is_critical: bool,
    pub needs_expert: bool,
    pub created_at: DateTime<Utc>,
    pub answers: Vec<FormAnswer>,
}
