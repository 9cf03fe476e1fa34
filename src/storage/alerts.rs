use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{get_enum, get_opt_ts, get_opt_uuid, get_ts, get_uuid, opt_id, opt_ts, ts, Database};
use crate::domain::{AlertStatus, CrisisAlert};
use crate::error::{AppError, Result};

const COLUMNS: &str = "id, submission_id, user_id, risk_score, reason, status, acknowledged_by, \
     acknowledged_at, resolved_by, resolved_at, resolution_notes, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<CrisisAlert> {
    Ok(CrisisAlert {
        id: get_uuid(row, 0)?,
        submission_id: get_uuid(row, 1)?,
        user_id: get_opt_uuid(row, 2)?,
        risk_score: row.get(3)?,
        reason: row.get(4)?,
        status: get_enum(row, 5)?,
        acknowledged_by: get_opt_uuid(row, 6)?,
        acknowledged_at: get_opt_ts(row, 7)?,
        resolved_by: get_opt_uuid(row, 8)?,
        resolved_at: get_opt_ts(row, 9)?,
        resolution_notes: row.get(10)?,
        created_at: get_ts(row, 11)?,
    })
}

pub fn insert(conn: &Connection, alert: &CrisisAlert) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO crisis_alerts ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            alert.id.to_string(),
            alert.submission_id.to_string(),
            opt_id(&alert.user_id),
            alert.risk_score,
            alert.reason,
            alert.status.as_str(),
            opt_id(&alert.acknowledged_by),
            opt_ts(&alert.acknowledged_at),
            opt_id(&alert.resolved_by),
            opt_ts(&alert.resolved_at),
            alert.resolution_notes,
            ts(&alert.created_at),
        ],
    )?;
    Ok(())
}

pub fn find(conn: &Connection, id: Uuid) -> Result<Option<CrisisAlert>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM crisis_alerts WHERE id = ?1"),
            params![id.to_string()],
            from_row,
        )
        .optional()?)
}

pub fn find_by_submission(conn: &Connection, submission_id: Uuid) -> Result<Option<CrisisAlert>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM crisis_alerts WHERE submission_id = ?1"),
            params![submission_id.to_string()],
            from_row,
        )
        .optional()?)
}

pub fn update_status(conn: &Connection, alert: &CrisisAlert) -> Result<()> {
    conn.execute(
        "UPDATE crisis_alerts SET status = ?2, acknowledged_by = ?3, acknowledged_at = ?4,
         resolved_by = ?5, resolved_at = ?6, resolution_notes = ?7 WHERE id = ?1",
        params![
            alert.id.to_string(),
            alert.status.as_str(),
            opt_id(&alert.acknowledged_by),
            opt_ts(&alert.acknowledged_at),
            opt_id(&alert.resolved_by),
            opt_ts(&alert.resolved_at),
            alert.resolution_notes,
        ],
    )?;
    Ok(())
}

impl Database {
    pub fn get_alert(&self, id: Uuid) -> Result<CrisisAlert> {
        self.read(|c| find(c, id))?
            .ok_or_else(|| AppError::not_found("Crisis alert"))
    }

    pub fn find_alert_for_submission(&self, submission_id: Uuid) -> Result<Option<CrisisAlert>> {
        self.read(|c| find_by_submission(c, submission_id))
    }

    /// Open alerts first, newest first within a status
    pub fn list_alerts(&self, status: Option<AlertStatus>) -> Result<Vec<CrisisAlert>> {
        self.read(|c| {
            let mut stmt = c.prepare(&format!(
                "SELECT {COLUMNS} FROM crisis_alerts WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY CASE status WHEN 'pending' THEN 0 WHEN 'acknowledged' THEN 1 ELSE 2 END,
                          created_at DESC"
            ))?;
            let rows = stmt.query_map(params![status.map(|s| s.as_str())], from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}
