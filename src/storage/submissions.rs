use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{get_enum, get_json, get_opt_uuid, get_ts, get_uuid, opt_id, ts, Database};
use crate::domain::{FormAnswer, FormSubmission, RiskLevel};
use crate::error::{AppError, Result};

const COLUMNS: &str = "id, template_id, template_version, user_id, total_risk_score, risk_level, \
     urgency, is_critical, needs_expert, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<FormSubmission> {
    Ok(FormSubmission {
        id: get_uuid(row, 0)?,
        template_id: get_uuid(row, 1)?,
        template_version: row.get(2)?,
        user_id: get_opt_uuid(row, 3)?,
        total_risk_score: row.get(4)?,
        risk_level: get_enum(row, 5)?,
        urgency: get_enum(row, 6)?,
        is_critical: row.get(7)?,
        needs_expert: row.get(8)?,
        created_at: get_ts(row, 9)?,
        answers: Vec::new(),
    })
}

fn answer_from_row(row: &Row<'_>) -> rusqlite::Result<FormAnswer> {
    Ok(FormAnswer {
        id: get_uuid(row, 0)?,
        submission_id: get_uuid(row, 1)?,
        field_id: get_uuid(row, 2)?,
        field_key: row.get(3)?,
        field_label: row.get(4)?,
        value: get_json(row, 5)?,
        risk_score: row.get(6)?,
    })
}

/// Insert a submission together with its answers.
pub fn insert(conn: &Connection, submission: &FormSubmission) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO form_submissions ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            submission.id.to_string(),
            submission.template_id.to_string(),
            submission.template_version,
            opt_id(&submission.user_id),
            submission.total_risk_score,
            submission.risk_level.as_str(),
            submission.urgency.as_str(),
            submission.is_critical,
            submission.needs_expert,
            ts(&submission.created_at),
        ],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO form_answers (id, submission_id, field_id, field_key, field_label, value, risk_score)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for answer in &submission.answers {
        stmt.execute(params![
            answer.id.to_string(),
            answer.submission_id.to_string(),
            answer.field_id.to_string(),
            answer.field_key,
            answer.field_label,
            serde_json::to_string(&answer.value)?,
            answer.risk_score,
        ])?;
    }
    Ok(())
}

pub fn find(conn: &Connection, id: Uuid) -> Result<Option<FormSubmission>> {
    let submission = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM form_submissions WHERE id = ?1"),
            params![id.to_string()],
            from_row,
        )
        .optional()?;
    let Some(mut submission) = submission else {
        return Ok(None);
    };
    let mut stmt = conn.prepare(
        "SELECT a.id, a.submission_id, a.field_id, a.field_key, a.field_label, a.value, a.risk_score
         FROM form_answers a
         LEFT JOIN form_fields f ON f.id = a.field_id
         WHERE a.submission_id = ?1
         ORDER BY COALESCE(f.sort_order, 2147483647), a.field_key",
    )?;
    submission.answers = stmt
        .query_map(params![id.to_string()], answer_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Some(submission))
}

#[derive(Debug, Default, Clone)]
pub struct SubmissionFilter {
    pub template_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub risk_level: Option<RiskLevel>,
    pub critical_only: bool,
}

impl Database {
    pub fn get_submission(&self, id: Uuid) -> Result<FormSubmission> {
        self.read(|c| find(c, id))?
            .ok_or_else(|| AppError::not_found("Submission"))
    }

    /// Newest first, without answers
    pub fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Vec<FormSubmission>> {
        self.read(|c| {
            let mut stmt = c.prepare(&format!(
                "SELECT {COLUMNS} FROM form_submissions
                 WHERE (?1 IS NULL OR template_id = ?1)
                   AND (?2 IS NULL OR user_id = ?2)
                   AND (?3 IS NULL OR risk_level = ?3)
                   AND (?4 = 0 OR is_critical = 1)
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(
                params![
                    opt_id(&filter.template_id),
                    opt_id(&filter.user_id),
                    filter.risk_level.map(|l| l.as_str()),
                    filter.critical_only,
                ],
                from_row,
            )?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}
