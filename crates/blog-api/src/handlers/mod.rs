pub mod auth;
pub mod comments;
pub mod pages;
pub mod posts;
pub mod user;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use blog_db::models::{CommentRow, PostRow};
use blog_types::{Role, SessionUser};

use crate::error::AppError;
use crate::templates::Viewer;
use crate::{AppState, db_call};

/// Names longer than this are rejected at registration and rename.
pub const MAX_NAME_CHARS: usize = 32;

/// Numeric path segments. A segment that does not parse names no row, so
/// it renders the not-found page like any other missing id.
pub struct IdPath<T>(pub T);

impl<S, T> FromRequestParts<S> for IdPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| IdPath(value))
            .map_err(|_| AppError::NotFound)
    }
}

/// Role-aware identity of a signed-in user. Users deleted since they
/// signed in resolve to `None`.
async fn viewer(state: &AppState, user: &SessionUser) -> Result<Option<Viewer>, AppError> {
    let id = user.id;
    let row = db_call(state, move |db| db.get_user_by_id(id)).await?;
    Ok(row.map(|u| Viewer {
        id: u.id,
        is_admin: Role::from_id(u.role_id).is_admin(),
    }))
}

async fn load_post(state: &AppState, post_id: i64) -> Result<PostRow, AppError> {
    db_call(state, move |db| db.get_post(post_id))
        .await?
        .ok_or(AppError::NotFound)
}

/// A comment that must belong to `post_id`.
async fn load_comment(state: &AppState, post_id: i64, comment_id: i64) -> Result<CommentRow, AppError> {
    db_call(state, move |db| db.get_comment(comment_id))
        .await?
        .filter(|c| c.post_id == post_id)
        .ok_or(AppError::NotFound)
}

/// Ok when `user` is the author or an admin.
async fn ensure_moderator(state: &AppState, user: &SessionUser, author_id: i64) -> Result<(), AppError> {
    match viewer(state, user).await? {
        Some(v) if v.may_moderate(author_id) => Ok(()),
        Some(_) => Err(AppError::Forbidden),
        None => Err(AppError::Unauthorized),
    }
}

fn ensure_author(user: &SessionUser, author_id: i64) -> Result<(), AppError> {
    if user.id == author_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Deletes files the delete transaction found unreferenced.
async fn remove_files(state: &AppState, files: &[String]) {
    for file in files {
        state.uploads.remove(file).await;
    }
}
