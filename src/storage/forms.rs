use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{get_enum, get_ts, get_uuid, ts, Database};
use crate::domain::{Conditions, FormField, FormFieldOption, FormTemplate, TemplateCategory};
use crate::error::{AppError, Result};

const TEMPLATE_COLUMNS: &str =
    "id, slug, name, description, category, version, is_active, created_at, updated_at";
const FIELD_COLUMNS: &str = "id, template_id, key, label, field_type, help_text, is_required, \
     is_core, is_critical_indicator, risk_weight, min_value, max_value, conditions, sort_order";

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<FormTemplate> {
    Ok(FormTemplate {
        id: get_uuid(row, 0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        category: get_enum(row, 4)?,
        version: row.get(5)?,
        is_active: row.get(6)?,
        created_at: get_ts(row, 7)?,
        updated_at: get_ts(row, 8)?,
        fields: Vec::new(),
    })
}

fn field_from_row(row: &Row<'_>) -> rusqlite::Result<FormField> {
    let conditions: Option<String> = row.get(12)?;
    let conditions = conditions
        .map(|raw| serde_json::from_str::<Conditions>(&raw))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e))
        })?;
    Ok(FormField {
        id: get_uuid(row, 0)?,
        template_id: get_uuid(row, 1)?,
        key: row.get(2)?,
        label: row.get(3)?,
        field_type: get_enum(row, 4)?,
        help_text: row.get(5)?,
        is_required: row.get(6)?,
        is_core: row.get(7)?,
        is_critical_indicator: row.get(8)?,
        risk_weight: row.get(9)?,
        min_value: row.get(10)?,
        max_value: row.get(11)?,
        conditions,
        sort_order: row.get(13)?,
        options: Vec::new(),
    })
}

fn option_from_row(row: &Row<'_>) -> rusqlite::Result<FormFieldOption> {
    Ok(FormFieldOption {
        id: get_uuid(row, 0)?,
        field_id: get_uuid(row, 1)?,
        value: row.get(2)?,
        label: row.get(3)?,
        risk_score: row.get(4)?,
        sort_order: row.get(5)?,
    })
}

fn load_fields(conn: &Connection, template_id: Uuid) -> Result<Vec<FormField>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FIELD_COLUMNS} FROM form_fields WHERE template_id = ?1 ORDER BY sort_order, key"
    ))?;
    let mut fields = stmt
        .query_map(params![template_id.to_string()], field_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut options = conn.prepare(
        "SELECT id, field_id, value, label, risk_score, sort_order
         FROM form_field_options WHERE field_id = ?1 ORDER BY sort_order",
    )?;
    for field in &mut fields {
        field.options = options
            .query_map(params![field.id.to_string()], option_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
    }
    Ok(fields)
}

fn with_fields(conn: &Connection, template: Option<FormTemplate>) -> Result<Option<FormTemplate>> {
    match template {
        Some(mut t) => {
            t.fields = load_fields(conn, t.id)?;
            Ok(Some(t))
        }
        None => Ok(None),
    }
}

pub fn find_template(conn: &Connection, id: Uuid) -> Result<Option<FormTemplate>> {
    let template = conn
        .query_row(
            &format!("SELECT {TEMPLATE_COLUMNS} FROM form_templates WHERE id = ?1"),
            params![id.to_string()],
            template_from_row,
        )
        .optional()?;
    with_fields(conn, template)
}

/// Highest active version of `slug`
pub fn find_active_by_slug(conn: &Connection, slug: &str) -> Result<Option<FormTemplate>> {
    let template = conn
        .query_row(
            &format!(
                "SELECT {TEMPLATE_COLUMNS} FROM form_templates
                 WHERE slug = ?1 AND is_active = 1 ORDER BY version DESC LIMIT 1"
            ),
            params![slug],
            template_from_row,
        )
        .optional()?;
    with_fields(conn, template)
}

pub fn latest_version(conn: &Connection, slug: &str) -> Result<Option<i64>> {
    Ok(conn.query_row(
        "SELECT MAX(version) FROM form_templates WHERE slug = ?1",
        params![slug],
        |r| r.get(0),
    )?)
}

pub fn insert_template(conn: &Connection, template: &FormTemplate) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO form_templates ({TEMPLATE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            template.id.to_string(),
            template.slug,
            template.name,
            template.description,
            template.category.as_str(),
            template.version,
            template.is_active,
            ts(&template.created_at),
            ts(&template.updated_at),
        ],
    )?;
    for field in &template.fields {
        insert_field(conn, field)?;
    }
    Ok(())
}

pub fn update_template(conn: &Connection, template: &FormTemplate) -> Result<()> {
    conn.execute(
        "UPDATE form_templates SET name = ?2, description = ?3, category = ?4, is_active = ?5,
         updated_at = ?6 WHERE id = ?1",
        params![
            template.id.to_string(),
            template.name,
            template.description,
            template.category.as_str(),
            template.is_active,
            ts(&template.updated_at),
        ],
    )?;
    Ok(())
}

pub fn deactivate_other_versions(conn: &Connection, slug: &str, keep: Uuid) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE form_templates SET is_active = 0 WHERE slug = ?1 AND id != ?2 AND is_active = 1",
        params![slug, keep.to_string()],
    )?)
}

pub fn count_submissions(conn: &Connection, template_id: Uuid) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM form_submissions WHERE template_id = ?1",
        params![template_id.to_string()],
        |r| r.get(0),
    )?)
}

pub fn delete_template(conn: &Connection, id: Uuid) -> Result<()> {
    conn.execute("DELETE FROM form_templates WHERE id = ?1", params![id.to_string()])?;
    Ok(())
}

pub fn insert_field(conn: &Connection, field: &FormField) -> Result<()> {
    let conditions = field
        .conditions
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        &format!(
            "INSERT INTO form_fields ({FIELD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            field.id.to_string(),
            field.template_id.to_string(),
            field.key,
            field.label,
            field.field_type.as_str(),
            field.help_text,
            field.is_required,
            field.is_core,
            field.is_critical_indicator,
            field.risk_weight,
            field.min_value,
            field.max_value,
            conditions,
            field.sort_order,
        ],
    )?;
    insert_options(conn, &field.options)
}

fn insert_options(conn: &Connection, options: &[FormFieldOption]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO form_field_options (id, field_id, value, label, risk_score, sort_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for option in options {
        stmt.execute(params![
            option.id.to_string(),
            option.field_id.to_string(),
            option.value,
            option.label,
            option.risk_score,
            option.sort_order,
        ])?;
    }
    Ok(())
}

/// Update a field row and replace its options.
pub fn update_field(conn: &Connection, field: &FormField) -> Result<()> {
    let conditions = field
        .conditions
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "UPDATE form_fields SET key = ?2, label = ?3, field_type = ?4, help_text = ?5,
         is_required = ?6, is_critical_indicator = ?7, risk_weight = ?8, min_value = ?9,
         max_value = ?10, conditions = ?11 WHERE id = ?1",
        params![
            field.id.to_string(),
            field.key,
            field.label,
            field.field_type.as_str(),
            field.help_text,
            field.is_required,
            field.is_critical_indicator,
            field.risk_weight,
            field.min_value,
            field.max_value,
            conditions,
        ],
    )?;
    conn.execute(
        "DELETE FROM form_field_options WHERE field_id = ?1",
        params![field.id.to_string()],
    )?;
    insert_options(conn, &field.options)
}

pub fn delete_field(conn: &Connection, id: Uuid) -> Result<()> {
    conn.execute("DELETE FROM form_fields WHERE id = ?1", params![id.to_string()])?;
    Ok(())
}

pub fn set_field_order(conn: &Connection, field_id: Uuid, sort_order: i64) -> Result<()> {
    conn.execute(
        "UPDATE form_fields SET sort_order = ?2 WHERE id = ?1",
        params![field_id.to_string(), sort_order],
    )?;
    Ok(())
}

impl Database {
    pub fn get_template(&self, id: Uuid) -> Result<FormTemplate> {
        self.read(|c| find_template(c, id))?
            .ok_or_else(|| AppError::not_found("Form template"))
    }

    pub fn get_active_template(&self, slug: &str) -> Result<FormTemplate> {
        self.read(|c| find_active_by_slug(c, slug))?
            .ok_or_else(|| AppError::not_found("Form template"))
    }

    pub fn list_templates(
        &self,
        category: Option<TemplateCategory>,
        active: Option<bool>,
    ) -> Result<Vec<FormTemplate>> {
        self.read(|c| {
            let mut stmt = c.prepare(&format!(
                "SELECT {TEMPLATE_COLUMNS} FROM form_templates
                 WHERE (?1 IS NULL OR category = ?1) AND (?2 IS NULL OR is_active = ?2)
                 ORDER BY slug, version DESC"
            ))?;
            let templates = stmt
                .query_map(
                    params![category.map(|cat| cat.as_str()), active],
                    template_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let mut loaded = Vec::with_capacity(templates.len());
            for mut template in templates {
                template.fields = load_fields(c, template.id)?;
                loaded.push(template);
            }
            Ok(loaded)
        })
    }
}
