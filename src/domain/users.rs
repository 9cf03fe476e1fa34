use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::text_enum;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Consultant,
    Practitioner,
    Client,
}

text_enum!(Role {
    Admin => "admin",
    Consultant => "consultant",
    Practitioner => "practitioner",
    Client => "client",
});

/// Any account on the platform; consultants and practitioners are users with those roles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub specialization: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Staff may read any client's intake data
    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Consultant | Role::Practitioner)
    }

    pub fn can_take_tickets(&self) -> bool {
        self.is_active && matches!(self.role, Role::Consultant | Role::Practitioner)
    }
}
