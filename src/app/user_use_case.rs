use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Role, User};
use crate::engine::validation::EMAIL;
use crate::error::{AppError, FieldErrors, Result};
use crate::storage::Database;

#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub specialization: Option<String>,
    #[serde(default = "active")]
    pub is_active: bool,
}

fn active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub specialization: Option<String>,
    pub is_active: Option<bool>,
}

/// Account administration and request actor lookup
pub struct UserUseCase {
    db: Arc<Database>,
}

impl UserUseCase {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Resolve the user behind a request; unknown ids are unauthenticated.
    pub fn authenticate(&self, id: Uuid) -> Result<User> {
        let user = self.db.find_user(id)?.ok_or(AppError::Unauthorized)?;
        if !user.is_active {
            return Err(AppError::forbidden("This account has been deactivated."));
        }
        Ok(user)
    }

    pub fn list(&self, role: Option<Role>) -> Result<Vec<User>> {
        self.db.list_users(role)
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.db.find_user_by_email(email.trim())
    }

    pub fn get(&self, id: Uuid) -> Result<User> {
        self.db.get_user(id)
    }

    pub fn create(&self, input: UserInput) -> Result<User> {
        let email = input.email.trim().to_lowercase();
        self.check(&input.name, &email, None)?;
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            email,
            role: input.role,
            specialization: input.specialization.filter(|s| !s.trim().is_empty()),
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_user(&user)?;
        info!(user_id = %user.id, role = %user.role, "Created user");
        Ok(user)
    }

    pub fn update(&self, id: Uuid, update: UserUpdate) -> Result<User> {
        let mut user = self.db.get_user(id)?;
        let name = update.name.unwrap_or_else(|| user.name.clone());
        let email = update
            .email
            .map(|e| e.trim().to_lowercase())
            .unwrap_or_else(|| user.email.clone());
        self.check(&name, &email, Some(id))?;

        user.name = name.trim().to_string();
        user.email = email;
        if let Some(role) = update.role {
            user.role = role;
        }
        if update.specialization.is_some() {
            user.specialization = update.specialization.filter(|s| !s.trim().is_empty());
        }
        if let Some(active) = update.is_active {
            user.is_active = active;
        }
        user.updated_at = Utc::now();
        self.db.update_user(&user)?;
        info!(user_id = %id, "Updated user");
        Ok(user)
    }

    /// Users with history (tickets, submissions, payments) must be deactivated instead.
    pub fn delete(&self, actor: &User, id: Uuid) -> Result<()> {
        if actor.id == id {
            return Err(AppError::rule("You cannot delete your own account."));
        }
        match self.db.delete_user(id) {
            Ok(true) => {
                info!(user_id = %id, "Deleted user");
                Ok(())
            }
            Ok(false) => Err(AppError::not_found("User")),
            Err(AppError::Database(rusqlite::Error::SqliteFailure(e, _)))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(AppError::rule(
                    "This user has consultation history; deactivate the account instead.",
                ))
            }
            Err(e) => Err(e),
        }
    }

    fn check(&self, name: &str, email: &str, except: Option<Uuid>) -> Result<()> {
        let mut errors = FieldErrors::new();
        if name.trim().is_empty() {
            errors.entry("name".into()).or_default().push("The name field is required.".into());
        }
        if !EMAIL.is_match(email) {
            errors
                .entry("email".into())
                .or_default()
                .push("The email must be a valid email address.".into());
        } else if let Some(existing) = self.db.find_user_by_email(email)? {
            if Some(existing.id) != except {
                errors
                    .entry("email".into())
                    .or_default()
                    .push("The email has already been taken.".into());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation { errors })
        }
    }
}
