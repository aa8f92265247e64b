use axum::{
    Form,
    extract::{Multipart, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::info;

use blog_types::forms::{CommentEditForm, DeleteCommentForm};

use super::{IdPath, ensure_author, ensure_moderator, load_comment, load_post, remove_files};
use crate::error::AppError;
use crate::session::CurrentUser;
use crate::templates::{CommentEditorTemplate, DeleteCommentTemplate, render};
use crate::uploads::MultipartForm;
use crate::{AppState, db_call};

const EXCERPT_CHARS: usize = 140;

fn post_url(post_id: i64) -> String {
    format!("/posts/{}", post_id)
}

/// POST /posts/{post_id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(post_id): IdPath<i64>,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    load_post(&state, post_id).await?;
    let mut form = MultipartForm::read(multipart, "avatar").await?;

    let content = form.text("content").to_string();
    if content.is_empty() {
        return Ok(Redirect::to(&post_url(post_id)));
    }

    let attachment = match form.take_file() {
        Some(file) => state.uploads.save(&file.file_name, &file.data).await?,
        None => None,
    };

    let author_id = user.id;
    let comment_id = db_call(&state, move |db| {
        db.create_comment(post_id, author_id, &content, attachment.as_deref())
    })
    .await?;

    info!("{} commented on post {} ({})", user.name, post_id, comment_id);
    Ok(Redirect::to(&format!("/posts/{}#comment-{}", post_id, comment_id)))
}

/// GET /posts/delete/{post_id}/comments/{comment_id}
pub async fn delete_comment_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath((post_id, comment_id)): IdPath<(i64, i64)>,
) -> Result<Html<String>, AppError> {
    let comment = load_comment(&state, post_id, comment_id).await?;
    ensure_moderator(&state, &user, comment.author_id).await?;

    render(DeleteCommentTemplate {
        user: Some(user),
        post_id,
        comment_id,
        excerpt: comment.content.chars().take(EXCERPT_CHARS).collect(),
    })
}

/// POST /posts/delete/{post_id}/comments/Deleting
pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(post_id): IdPath<i64>,
    Form(form): Form<DeleteCommentForm>,
) -> Result<Redirect, AppError> {
    let comment = load_comment(&state, post_id, form.comment_id).await?;
    ensure_moderator(&state, &user, comment.author_id).await?;

    let comment_id = comment.id;
    let files = db_call(&state, move |db| db.delete_comment(comment_id)).await?;
    remove_files(&state, &files).await;

    info!("{} deleted comment {} on post {}", user.name, comment_id, post_id);
    Ok(Redirect::to(&post_url(post_id)))
}

/// GET /user/posts/CommentEditor/{post_id}/{comment_id}
pub async fn editor_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath((post_id, comment_id)): IdPath<(i64, i64)>,
) -> Result<Html<String>, AppError> {
    let comment = load_comment(&state, post_id, comment_id).await?;
    ensure_author(&user, comment.author_id)?;

    render(CommentEditorTemplate {
        user: Some(user),
        message: None,
        post_id,
        comment_id,
        content: comment.content,
    })
}

/// POST /user/posts/CommentEditor/{post_id}/{comment_id}
pub async fn update_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath((post_id, comment_id)): IdPath<(i64, i64)>,
    Form(form): Form<CommentEditForm>,
) -> Result<Response, AppError> {
    let comment = load_comment(&state, post_id, comment_id).await?;
    ensure_author(&user, comment.author_id)?;

    let content = form.content.trim().to_string();
    if content.is_empty() {
        return Ok(render(CommentEditorTemplate {
            user: Some(user),
            message: Some("A comment cannot be empty".to_string()),
            post_id,
            comment_id,
            content,
        })?
        .into_response());
    }

    db_call(&state, move |db| db.update_comment(comment_id, &content)).await?;
    Ok(Redirect::to(&format!("/posts/{}#comment-{}", post_id, comment_id)).into_response())
}
