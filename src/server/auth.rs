//! Request actor extraction.
//!
//! Authentication itself happens upstream; requests carry the acting user's
//! id in the `X-User-Id` header and are resolved against the users table.

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use uuid::Uuid;

use super::AppState;
use crate::domain::User;
use crate::error::AppError;

pub const USER_HEADER: &str = "x-user-id";

fn header_user_id(parts: &Parts) -> Result<Option<Uuid>, AppError> {
    let Some(raw) = parts.headers.get(USER_HEADER) else {
        return Ok(None);
    };
    let id = raw
        .to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or(AppError::Unauthorized)?;
    Ok(Some(id))
}

/// Any signed-in, active user
pub struct Actor(pub User);

/// Signed in or anonymous
pub struct MaybeActor(pub Option<User>);

/// Signed-in administrator
pub struct Admin(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let id = header_user_id(parts)?.ok_or(AppError::Unauthorized)?;
        Ok(Actor(state.users.authenticate(id)?))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeActor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        match header_user_id(parts)? {
            Some(id) => Ok(MaybeActor(Some(state.users.authenticate(id)?))),
            None => Ok(MaybeActor(None)),
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let Actor(user) = Actor::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::forbidden("This action is restricted to administrators."));
        }
        Ok(Admin(user))
    }
}

/// JSON body whose rejections use the API envelope
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| AppError::field("body", e.body_text()))?;
        Ok(Payload(value))
    }
}
