use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{text_enum, RiskLevel};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

text_enum!(TicketStatus {
    Open => "open",
    Assigned => "assigned",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl TicketStatus {
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Open, Assigned)
                | (Assigned, Assigned)
                | (Assigned, InProgress)
                | (InProgress, Completed)
                | (Open, Cancelled)
                | (Assigned, Cancelled)
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, TicketStatus::Completed | TicketStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Normal,
    High,
    Urgent,
}

text_enum!(TicketPriority {
    Low => "low",
    Normal => "normal",
    High => "high",
    Urgent => "urgent",
});

impl From<RiskLevel> for TicketPriority {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => TicketPriority::Low,
            RiskLevel::Moderate => TicketPriority::Normal,
            RiskLevel::High => TicketPriority::High,
            RiskLevel::Critical => TicketPriority::Urgent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsultationTicket {
    pub id: Uuid,
    pub code: String,
    pub client_id: Uuid,
    pub submission_id: Option<Uuid>,
    pub subject: String,
    pub description: Option<String>,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub requires_practitioner: bool,
    pub consultant_id: Option<Uuid>,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `TKT-YYYYMMDD-XXXXXX` with an uppercase alphanumeric suffix
pub fn generate_ticket_code(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("TKT-{}-{}", now.format("%Y%m%d"), suffix)
}
