use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{get_enum, get_opt_uuid, get_ts, get_uuid, opt_id, ts, Database};
use crate::domain::{ConsultationTicket, TicketStatus};
use crate::error::{AppError, Result};

const COLUMNS: &str = "id, code, client_id, submission_id, subject, description, priority, status, \
     requires_practitioner, consultant_id, is_paid, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<ConsultationTicket> {
    Ok(ConsultationTicket {
        id: get_uuid(row, 0)?,
        code: row.get(1)?,
        client_id: get_uuid(row, 2)?,
        submission_id: get_opt_uuid(row, 3)?,
        subject: row.get(4)?,
        description: row.get(5)?,
        priority: get_enum(row, 6)?,
        status: get_enum(row, 7)?,
        requires_practitioner: row.get(8)?,
        consultant_id: get_opt_uuid(row, 9)?,
        is_paid: row.get(10)?,
        created_at: get_ts(row, 11)?,
        updated_at: get_ts(row, 12)?,
    })
}

pub fn find(conn: &Connection, id: Uuid) -> Result<Option<ConsultationTicket>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM consultation_tickets WHERE id = ?1"),
            params![id.to_string()],
            from_row,
        )
        .optional()?)
}

pub fn insert(conn: &Connection, ticket: &ConsultationTicket) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO consultation_tickets ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            ticket.id.to_string(),
            ticket.code,
            ticket.client_id.to_string(),
            opt_id(&ticket.submission_id),
            ticket.subject,
            ticket.description,
            ticket.priority.as_str(),
            ticket.status.as_str(),
            ticket.requires_practitioner,
            opt_id(&ticket.consultant_id),
            ticket.is_paid,
            ts(&ticket.created_at),
            ts(&ticket.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update(conn: &Connection, ticket: &ConsultationTicket) -> Result<()> {
    conn.execute(
        "UPDATE consultation_tickets SET status = ?2, consultant_id = ?3, is_paid = ?4,
         priority = ?5, updated_at = ?6 WHERE id = ?1",
        params![
            ticket.id.to_string(),
            ticket.status.as_str(),
            opt_id(&ticket.consultant_id),
            ticket.is_paid,
            ticket.priority.as_str(),
            ts(&ticket.updated_at),
        ],
    )?;
    Ok(())
}

#[derive(Debug, Default, Clone)]
pub struct TicketFilter {
    pub client_id: Option<Uuid>,
    pub consultant_id: Option<Uuid>,
    pub status: Option<TicketStatus>,
}

impl Database {
    pub fn get_ticket(&self, id: Uuid) -> Result<ConsultationTicket> {
        self.read(|c| find(c, id))?
            .ok_or_else(|| AppError::not_found("Ticket"))
    }

    pub fn insert_ticket(&self, ticket: &ConsultationTicket) -> Result<()> {
        self.read(|c| insert(c, ticket))
    }

    pub fn update_ticket(&self, ticket: &ConsultationTicket) -> Result<()> {
        self.read(|c| update(c, ticket))
    }

    pub fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<ConsultationTicket>> {
        self.read(|c| {
            let mut stmt = c.prepare(&format!(
                "SELECT {COLUMNS} FROM consultation_tickets
                 WHERE (?1 IS NULL OR client_id = ?1)
                   AND (?2 IS NULL OR consultant_id = ?2)
                   AND (?3 IS NULL OR status = ?3)
                 ORDER BY CASE priority WHEN 'urgent' THEN 0 WHEN 'high' THEN 1
                                        WHEN 'normal' THEN 2 ELSE 3 END,
                          created_at DESC"
            ))?;
            let rows = stmt.query_map(
                params![
                    opt_id(&filter.client_id),
                    opt_id(&filter.consultant_id),
                    filter.status.map(|s| s.as_str()),
                ],
                from_row,
            )?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}
