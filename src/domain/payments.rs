use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use uuid::Uuid;

use super::text_enum;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Paid,
    Failed,
    Expired,
}

text_enum!(TransactionStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Expired => "expired",
});

impl TransactionStatus {
    /// Map the gateway's `transaction_status` onto ours
    pub fn from_gateway(status: &str) -> Option<Self> {
        match status {
            "capture" | "settlement" => Some(TransactionStatus::Paid),
            "pending" => Some(TransactionStatus::Pending),
            "deny" | "cancel" | "failure" => Some(TransactionStatus::Failed),
            "expire" => Some(TransactionStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub order_id: String,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub status: TransactionStatus,
    pub gateway_status: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Apply a gateway status. Returns whether anything changed; `paid` is terminal.
    pub fn apply_gateway_status(
        &mut self,
        status: TransactionStatus,
        raw: &str,
        at: DateTime<Utc>,
    ) -> bool {
        if self.status == TransactionStatus::Paid || self.status == status {
            return false;
        }
        self.status = status;
        self.gateway_status = Some(raw.to_string());
        if status == TransactionStatus::Paid {
            self.paid_at = Some(at);
        }
        self.updated_at = at;
        true
    }
}

/// `hex(sha512(order_id + status_code + gross_amount + server_key))`
pub fn gateway_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}
