use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{get_enum, get_ts, get_uuid, ts, Database};
use crate::domain::{Role, User};
use crate::error::{AppError, Result};

const COLUMNS: &str = "id, name, email, role, specialization, is_active, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: get_enum(row, 3)?,
        specialization: row.get(4)?,
        is_active: row.get(5)?,
        created_at: get_ts(row, 6)?,
        updated_at: get_ts(row, 7)?,
    })
}

pub fn find(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
            from_row,
        )
        .optional()?)
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"),
            params![email],
            from_row,
        )
        .optional()?)
}

impl Database {
    pub fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        self.read(|c| find(c, id))
    }

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.find_user(id)?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.read(|c| find_by_email(c, email))
    }

    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.read(|c| {
            c.execute(
                &format!("INSERT INTO users ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    user.id.to_string(),
                    user.name,
                    user.email,
                    user.role.as_str(),
                    user.specialization,
                    user.is_active,
                    ts(&user.created_at),
                    ts(&user.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_user(&self, user: &User) -> Result<()> {
        self.read(|c| {
            c.execute(
                "UPDATE users SET name = ?2, email = ?3, role = ?4, specialization = ?5,
                 is_active = ?6, updated_at = ?7 WHERE id = ?1",
                params![
                    user.id.to_string(),
                    user.name,
                    user.email,
                    user.role.as_str(),
                    user.specialization,
                    user.is_active,
                    ts(&user.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Returns `false` when no such user existed.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.read(|c| Ok(c.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])? > 0))
    }

    pub fn list_users(&self, role: Option<Role>) -> Result<Vec<User>> {
        self.read(|c| {
            let mut stmt = c.prepare(&format!(
                "SELECT {COLUMNS} FROM users WHERE (?1 IS NULL OR role = ?1) ORDER BY name"
            ))?;
            let rows = stmt.query_map(params![role.map(|r| r.as_str())], from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}
