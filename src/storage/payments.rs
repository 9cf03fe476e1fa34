use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{get_enum, get_opt_ts, get_ts, get_uuid, opt_ts, ts, Database};
use crate::domain::Transaction;
use crate::error::Result;

const COLUMNS: &str = "id, order_id, ticket_id, user_id, amount, currency, status, gateway_status, \
     paid_at, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: get_uuid(row, 0)?,
        order_id: row.get(1)?,
        ticket_id: get_uuid(row, 2)?,
        user_id: get_uuid(row, 3)?,
        amount: row.get(4)?,
        currency: row.get(5)?,
        status: get_enum(row, 6)?,
        gateway_status: row.get(7)?,
        paid_at: get_opt_ts(row, 8)?,
        created_at: get_ts(row, 9)?,
        updated_at: get_ts(row, 10)?,
    })
}

pub fn insert(conn: &Connection, tx: &Transaction) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO transactions ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            tx.id.to_string(),
            tx.order_id,
            tx.ticket_id.to_string(),
            tx.user_id.to_string(),
            tx.amount,
            tx.currency,
            tx.status.as_str(),
            tx.gateway_status,
            opt_ts(&tx.paid_at),
            ts(&tx.created_at),
            ts(&tx.updated_at),
        ],
    )?;
    Ok(())
}

pub fn find_by_order(conn: &Connection, order_id: &str) -> Result<Option<Transaction>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM transactions WHERE order_id = ?1"),
            params![order_id],
            from_row,
        )
        .optional()?)
}

pub fn count_for_ticket(conn: &Connection, ticket_id: Uuid) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE ticket_id = ?1",
        params![ticket_id.to_string()],
        |r| r.get(0),
    )?)
}

pub fn update_status(conn: &Connection, tx: &Transaction) -> Result<()> {
    conn.execute(
        "UPDATE transactions SET status = ?2, gateway_status = ?3, paid_at = ?4, updated_at = ?5
         WHERE id = ?1",
        params![
            tx.id.to_string(),
            tx.status.as_str(),
            tx.gateway_status,
            opt_ts(&tx.paid_at),
            ts(&tx.updated_at),
        ],
    )?;
    Ok(())
}

impl Database {
    pub fn list_transactions_for_ticket(&self, ticket_id: Uuid) -> Result<Vec<Transaction>> {
        self.read(|c| {
            let mut stmt = c.prepare(&format!(
                "SELECT {COLUMNS} FROM transactions WHERE ticket_id = ?1 ORDER BY created_at"
            ))?;
            let rows = stmt.query_map(params![ticket_id.to_string()], from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}
