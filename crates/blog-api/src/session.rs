//! Session-backed identity extractors.
//!
//! The session holds a single [`SessionUser`] under [`SESSION_USER_KEY`].
//! Handlers that render for everybody take [`MaybeUser`]; handlers behind
//! a login take [`CurrentUser`], which redirects anonymous visitors to
//! `/user/login`.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use blog_types::SessionUser;
use blog_types::session::SESSION_USER_KEY;

use crate::error::AppError;

pub struct MaybeUser(pub Option<SessionUser>);

pub struct CurrentUser(pub SessionUser);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::NoSession(msg))?;
        let user = session.get::<SessionUser>(SESSION_USER_KEY).await?;
        Ok(MaybeUser(user))
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;
        user.map(CurrentUser).ok_or(AppError::Unauthorized)
    }
}

/// Stores `user` as the signed-in identity, rotating the session id.
pub async fn sign_in(session: &Session, user: &SessionUser) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.insert(SESSION_USER_KEY, user).await?;
    Ok(())
}
