use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::domain::payments::gateway_signature;
use crate::domain::{TicketStatus, Transaction, TransactionStatus, User};
use crate::error::{AppError, Result};
use crate::observability::metrics;
use crate::storage::{payments, tickets, Database};

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutInput {
    /// Minor currency units
    pub amount: i64,
}

/// Payment gateway HTTP notification body
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayNotification {
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub transaction_status: String,
    pub signature_key: String,
}

pub struct PaymentUseCase {
    db: Arc<Database>,
    config: PaymentConfig,
}

impl PaymentUseCase {
    pub fn new(db: Arc<Database>, config: PaymentConfig) -> Self {
        Self { db, config }
    }

    /// Create a pending transaction for the client's own unpaid ticket.
    pub fn checkout(&self, client: &User, ticket_id: Uuid, input: CheckoutInput) -> Result<Transaction> {
        if input.amount <= 0 {
            return Err(AppError::field("amount", "The amount must be at least 1."));
        }
        let tx = self.db.transaction(|c| {
            let ticket = tickets::find(c, ticket_id)?.ok_or_else(|| AppError::not_found("Ticket"))?;
            if ticket.client_id != client.id {
                return Err(AppError::forbidden("You may only pay for your own tickets."));
            }
            if ticket.is_paid {
                return Err(AppError::rule("This ticket has already been paid."));
            }
            if ticket.status == TicketStatus::Cancelled {
                return Err(AppError::rule("Cancelled tickets cannot be paid."));
            }

            let attempt = payments::count_for_ticket(c, ticket.id)? + 1;
            let now = Utc::now();
            let tx = Transaction {
                id: Uuid::new_v4(),
                order_id: format!("ORD-{}-{}", ticket.code, attempt),
                ticket_id: ticket.id,
                user_id: client.id,
                amount: input.amount,
                currency: self.config.currency.clone(),
                status: TransactionStatus::Pending,
                gateway_status: None,
                paid_at: None,
                created_at: now,
                updated_at: now,
            };
            payments::insert(c, &tx)?;
            Ok(tx)
        })?;
        info!(order_id = %tx.order_id, amount = tx.amount, "Created payment transaction");
        Ok(tx)
    }

    /// Apply a signed gateway notification. Settled payments mark the ticket paid.
    pub fn handle_notification(&self, n: &GatewayNotification) -> Result<Transaction> {
        if self.config.server_key.is_empty() {
            warn!(order_id = %n.order_id, "Payment notification received but no server key is configured");
            return Err(AppError::forbidden("Payment notifications are not accepted."));
        }
        let expected = gateway_signature(&n.order_id, &n.status_code, &n.gross_amount, &self.config.server_key);
        if !expected.eq_ignore_ascii_case(n.signature_key.trim()) {
            metrics::billing::signature_rejected();
            warn!(order_id = %n.order_id, "Rejected payment notification with invalid signature");
            return Err(AppError::forbidden("Invalid signature."));
        }
        let status = TransactionStatus::from_gateway(&n.transaction_status).ok_or_else(|| {
            AppError::field(
                "transaction_status",
                format!("Unknown transaction status '{}'.", n.transaction_status),
            )
        })?;

        let (tx, settled) = self.db.transaction(|c| {
            let mut tx = payments::find_by_order(c, &n.order_id)?
                .ok_or_else(|| AppError::not_found("Transaction"))?;
            let changed = tx.apply_gateway_status(status, &n.transaction_status, Utc::now());
            if !changed {
                return Ok((tx, false));
            }
            payments::update_status(c, &tx)?;
            let settled = tx.status == TransactionStatus::Paid;
            if settled {
                if let Some(mut ticket) = tickets::find(c, tx.ticket_id)? {
                    ticket.is_paid = true;
                    ticket.updated_at = Utc::now();
                    tickets::update(c, &ticket)?;
                }
            }
            Ok((tx, settled))
        })?;

        if settled {
            metrics::billing::payment_settled();
        }
        info!(order_id = %tx.order_id, status = %tx.status, "Processed payment notification");
        Ok(tx)
    }

    pub fn list_for_ticket(&self, actor: &User, ticket_id: Uuid) -> Result<Vec<Transaction>> {
        let ticket = self.db.get_ticket(ticket_id)?;
        if !actor.is_admin() && ticket.client_id != actor.id {
            return Err(AppError::forbidden("You may not view these payments."));
        }
        self.db.list_transactions_for_ticket(ticket_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ticket_use_case::{TicketInput, TicketUseCase};
    use crate::domain::Role;

    const KEY: &str = "SB-Mid-server-test";

    fn client() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Client".into(),
            email: "client@example.org".into(),
            role: Role::Client,
            specialization: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn setup() -> (PaymentUseCase, Arc<Database>, User, Uuid) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let client = client();
        db.insert_user(&client).unwrap();
        let ticket = TicketUseCase::new(db.clone())
            .open(
                &client,
                TicketInput {
                    subject: "Session".into(),
                    description: None,
                    submission_id: None,
                },
            )
            .unwrap();
        let config = PaymentConfig {
            server_key: KEY.into(),
            currency: "IDR".into(),
        };
        (PaymentUseCase::new(db.clone(), config), db, client, ticket.id)
    }

    fn notification(order_id: &str, status: &str, signature: Option<String>) -> GatewayNotification {
        let signature = signature.unwrap_or_else(|| gateway_signature(order_id, "200", "150000.00", KEY));
        GatewayNotification {
            order_id: order_id.into(),
            status_code: "200".into(),
            gross_amount: "150000.00".into(),
            transaction_status: status.into(),
            signature_key: signature,
        }
    }

    #[test]
    fn settlement_marks_ticket_paid_and_is_terminal() {
        let (uc, db, client, ticket_id) = setup();
        let tx = uc.checkout(&client, ticket_id, CheckoutInput { amount: 150_000 }).unwrap();
        assert!(tx.order_id.starts_with("ORD-TKT-"));
        assert!(tx.order_id.ends_with("-1"));

        let paid = uc.handle_notification(&notification(&tx.order_id, "settlement", None)).unwrap();
        assert_eq!(paid.status, TransactionStatus::Paid);
        assert!(db.get_ticket(ticket_id).unwrap().is_paid);

        let after = uc.handle_notification(&notification(&tx.order_id, "expire", None)).unwrap();
        assert_eq!(after.status, TransactionStatus::Paid);

        // ticket is paid now
        assert!(uc.checkout(&client, ticket_id, CheckoutInput { amount: 1 }).is_err());
    }

    #[test]
    fn invalid_signature_is_forbidden() {
        let (uc, db, client, ticket_id) = setup();
        let tx = uc.checkout(&client, ticket_id, CheckoutInput { amount: 150_000 }).unwrap();
        let forged = notification(&tx.order_id, "settlement", Some("deadbeef".into()));
        assert!(matches!(uc.handle_notification(&forged), Err(AppError::Forbidden(_))));
        assert!(!db.get_ticket(ticket_id).unwrap().is_paid);
    }

    #[test]
    fn order_ids_count_attempts() {
        let (uc, _db, client, ticket_id) = setup();
        let first = uc.checkout(&client, ticket_id, CheckoutInput { amount: 10 }).unwrap();
        uc.handle_notification(&notification(&first.order_id, "expire", None)).unwrap();
        let second = uc.checkout(&client, ticket_id, CheckoutInput { amount: 10 }).unwrap();
        assert!(second.order_id.ends_with("-2"));
        assert_eq!(uc.list_for_ticket(&client, ticket_id).unwrap().len(), 2);
    }
}
