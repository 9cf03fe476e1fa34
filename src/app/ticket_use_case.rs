use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::tickets::generate_ticket_code;
use crate::domain::{ConsultationTicket, Role, TicketPriority, TicketStatus, User};
use crate::error::{AppError, Result};
use crate::observability::metrics;
use crate::storage::{submissions, tickets, users, Database, TicketFilter};

#[derive(Debug, Clone, Deserialize)]
pub struct TicketInput {
    pub subject: String,
    pub description: Option<String>,
    pub submission_id: Option<Uuid>,
}

/// Consultation tickets from opening to completion
pub struct TicketUseCase {
    db: Arc<Database>,
}

impl TicketUseCase {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Open a ticket for `client`; a linked submission sets priority and routing.
    #[instrument(skip(self, client, input), fields(client_id = %client.id))]
    pub fn open(&self, client: &User, input: TicketInput) -> Result<ConsultationTicket> {
        let subject = input.subject.trim();
        if subject.is_empty() {
            return Err(AppError::field("subject", "The subject field is required."));
        }
        if subject.chars().count() > 255 {
            return Err(AppError::field("subject", "The subject may not be greater than 255 characters."));
        }

        let ticket = self.db.transaction(|c| {
            let (priority, requires_practitioner) = match input.submission_id {
                Some(id) => {
                    let submission = submissions::find(c, id)?
                        .ok_or_else(|| AppError::not_found("Submission"))?;
                    if submission.user_id != Some(client.id) {
                        return Err(AppError::forbidden(
                            "Tickets can only be opened from your own submissions.",
                        ));
                    }
                    (TicketPriority::from(submission.risk_level), submission.needs_expert)
                }
                None => (TicketPriority::Normal, false),
            };

            let now = Utc::now();
            let ticket = ConsultationTicket {
                id: Uuid::new_v4(),
                code: generate_ticket_code(now),
                client_id: client.id,
                submission_id: input.submission_id,
                subject: subject.to_string(),
                description: input.description.filter(|d| !d.trim().is_empty()),
                priority,
                status: TicketStatus::Open,
                requires_practitioner,
                consultant_id: None,
                is_paid: false,
                created_at: now,
                updated_at: now,
            };
            tickets::insert(c, &ticket)?;
            Ok(ticket)
        })?;

        metrics::billing::ticket_opened(ticket.priority.as_str());
        info!(ticket = %ticket.code, priority = %ticket.priority, "Opened consultation ticket");
        Ok(ticket)
    }

    /// Owner, assignee and admins may read a ticket.
    pub fn get(&self, actor: &User, id: Uuid) -> Result<ConsultationTicket> {
        let ticket = self.db.get_ticket(id)?;
        if actor.is_admin() || ticket.client_id == actor.id || ticket.consultant_id == Some(actor.id) {
            Ok(ticket)
        } else {
            Err(AppError::forbidden("You may not view this ticket."))
        }
    }

    /// Admins see every ticket, consultants their assignments, clients their own.
    pub fn list_for(&self, actor: &User, status: Option<TicketStatus>) -> Result<Vec<ConsultationTicket>> {
        let mut filter = TicketFilter {
            status,
            ..TicketFilter::default()
        };
        match actor.role {
            Role::Admin => {}
            Role::Consultant | Role::Practitioner => filter.consultant_id = Some(actor.id),
            Role::Client => filter.client_id = Some(actor.id),
        }
        self.db.list_tickets(&filter)
    }

    pub fn list(&self, filter: &TicketFilter) -> Result<Vec<ConsultationTicket>> {
        self.db.list_tickets(filter)
    }

    #[instrument(skip(self, admin), fields(admin_id = %admin.id))]
    pub fn assign(&self, admin: &User, id: Uuid, consultant_id: Uuid) -> Result<ConsultationTicket> {
        if !admin.is_admin() {
            return Err(AppError::forbidden("Only administrators can assign tickets."));
        }
        let ticket = self.db.transaction(|c| {
            let mut ticket = tickets::find(c, id)?.ok_or_else(|| AppError::not_found("Ticket"))?;
            let consultant = users::find(c, consultant_id)?
                .ok_or_else(|| AppError::field("consultant_id", "The selected consultant is invalid."))?;
            if !consultant.can_take_tickets() {
                return Err(AppError::field(
                    "consultant_id",
                    "The selected user cannot take consultations.",
                ));
            }
            if ticket.requires_practitioner && consultant.role != Role::Practitioner {
                return Err(AppError::field(
                    "consultant_id",
                    "This ticket requires a practitioner.",
                ));
            }
            if !ticket.status.can_transition_to(TicketStatus::Assigned) {
                return Err(AppError::rule(format!(
                    "A {} ticket cannot be assigned.",
                    ticket.status
                )));
            }
            ticket.status = TicketStatus::Assigned;
            ticket.consultant_id = Some(consultant.id);
            ticket.updated_at = Utc::now();
            tickets::update(c, &ticket)?;
            Ok(ticket)
        })?;
        info!(ticket = %ticket.code, consultant_id = %consultant_id, "Assigned ticket");
        Ok(ticket)
    }

    /// Move a ticket forward (assignee or admin) or cancel it (owner or admin).
    pub fn change_status(&self, actor: &User, id: Uuid, next: TicketStatus) -> Result<ConsultationTicket> {
        let ticket = self.db.transaction(|c| {
            let mut ticket = tickets::find(c, id)?.ok_or_else(|| AppError::not_found("Ticket"))?;
            let allowed = match next {
                TicketStatus::InProgress | TicketStatus::Completed => {
                    actor.is_admin() || ticket.consultant_id == Some(actor.id)
                }
                TicketStatus::Cancelled => actor.is_admin() || ticket.client_id == actor.id,
                TicketStatus::Open | TicketStatus::Assigned => {
                    return Err(AppError::rule("Use assignment to change the consultant."));
                }
            };
            if !allowed {
                return Err(AppError::forbidden("You may not change this ticket."));
            }
            if !ticket.status.can_transition_to(next) {
                return Err(AppError::rule(format!(
                    "Cannot move a ticket from {} to {}.",
                    ticket.status, next
                )));
            }
            ticket.status = next;
            ticket.updated_at = Utc::now();
            tickets::update(c, &ticket)?;
            Ok(ticket)
        })?;
        info!(ticket = %ticket.code, status = %ticket.status, actor_id = %actor.id, "Ticket status changed");
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        let now = Utc::now();
        let id = Uuid::new_v4();
        User {
            id,
            name: format!("{role} user"),
            email: format!("{id}@example.org"),
            role,
            specialization: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn setup() -> (TicketUseCase, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        (TicketUseCase::new(db.clone()), db)
    }

    fn input() -> TicketInput {
        TicketInput {
            subject: "Trouble sleeping".into(),
            description: None,
            submission_id: None,
        }
    }

    #[test]
    fn full_lifecycle() {
        let (uc, db) = setup();
        let (client, admin, consultant) = (user(Role::Client), user(Role::Admin), user(Role::Consultant));
        for u in [&client, &admin, &consultant] {
            db.insert_user(u).unwrap();
        }

        let ticket = uc.open(&client, input()).unwrap();
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.priority, TicketPriority::Normal);
        assert!(ticket.code.starts_with("TKT-"));

        let ticket = uc.assign(&admin, ticket.id, consultant.id).unwrap();
        assert_eq!(ticket.consultant_id, Some(consultant.id));

        // the client cannot start the session
        assert!(matches!(
            uc.change_status(&client, ticket.id, TicketStatus::InProgress),
            Err(AppError::Forbidden(_))
        ));
        uc.change_status(&consultant, ticket.id, TicketStatus::InProgress).unwrap();
        // in-progress tickets can no longer be cancelled
        assert!(matches!(
            uc.change_status(&client, ticket.id, TicketStatus::Cancelled),
            Err(AppError::BusinessRule(_))
        ));
        let done = uc.change_status(&consultant, ticket.id, TicketStatus::Completed).unwrap();
        assert_eq!(done.status, TicketStatus::Completed);

        assert_eq!(uc.list_for(&consultant, None).unwrap().len(), 1);
        assert_eq!(uc.list_for(&client, Some(TicketStatus::Open)).unwrap().len(), 0);
    }

    #[test]
    fn expert_tickets_need_a_practitioner() {
        let (uc, db) = setup();
        let (client, admin, consultant) = (user(Role::Client), user(Role::Admin), user(Role::Consultant));
        let practitioner = user(Role::Practitioner);
        for u in [&client, &admin, &consultant, &practitioner] {
            db.insert_user(u).unwrap();
        }
        let ticket = uc.open(&client, input()).unwrap();
        db.read(|c| {
            c.execute(
                "UPDATE consultation_tickets SET requires_practitioner = 1 WHERE id = ?1",
                [ticket.id.to_string()],
            )?;
            Ok(())
        })
        .unwrap();

        assert!(matches!(
            uc.assign(&admin, ticket.id, consultant.id),
            Err(AppError::Validation { .. })
        ));
        assert!(uc.assign(&admin, ticket.id, practitioner.id).is_ok());
    }

    #[test]
    fn only_admins_assign_and_subject_is_required() {
        let (uc, db) = setup();
        let client = user(Role::Client);
        db.insert_user(&client).unwrap();

        let mut blank = input();
        blank.subject = "  ".into();
        assert!(matches!(uc.open(&client, blank), Err(AppError::Validation { .. })));

        let ticket = uc.open(&client, input()).unwrap();
        assert!(matches!(
            uc.assign(&client, ticket.id, client.id),
            Err(AppError::Forbidden(_))
        ));
    }
}
