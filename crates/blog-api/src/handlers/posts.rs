use axum::{
    Form,
    extract::{Multipart, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::info;

use blog_db::models::{NewPost, PostFilter, PostRow};
use blog_types::forms::{DeletePostForm, PostEditForm, parse_tags};
use blog_types::listing::POSTS_PER_PAGE;
use blog_types::{ListingQuery, Pagination, SessionUser, url_key};

use super::{IdPath, ensure_author, ensure_moderator, load_post, remove_files, viewer};
use crate::error::AppError;
use crate::session::{CurrentUser, MaybeUser};
use crate::templates::{
    self, BuilderTemplate, CommentView, DeletePostTemplate, IndexTemplate, LeadersTemplate,
    PostEditorTemplate, PostTemplate, PostView, render,
};
use crate::uploads::MultipartForm;
use crate::{AppState, db_call};

/// Rows on the karma board.
const LEADERS_LIMIT: i64 = 50;

/// GET / and GET /posts
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<ListingQuery>,
) -> Result<Html<String>, AppError> {
    let filter = PostFilter {
        author_id: query.author,
        search: query.search_term().map(str::to_string),
        tag_id: query.tag,
    };
    let page = query.page();

    let (pagination, rows, tags, all_tags) = db_call(&state, move |db| {
        let total = db.count_posts(&filter)?;
        let pagination = Pagination::new(page, total, POSTS_PER_PAGE);
        let rows = db.list_posts(&filter, pagination.limit(), pagination.offset())?;
        let ids: Vec<i64> = rows.iter().map(|p| p.id).collect();
        let tags = db.tags_for_posts(&ids)?;
        let all_tags = db.all_tags()?;
        Ok((pagination, rows, tags, all_tags))
    })
    .await?;

    let mut tags = tags;
    let posts = rows
        .into_iter()
        .map(|row| {
            let post_tags = tags.remove(&row.id).unwrap_or_default();
            PostView::card(row, post_tags)
        })
        .collect();

    render(IndexTemplate {
        user,
        posts,
        pagination,
        search: query.search_term().unwrap_or_default().to_string(),
        author: query.author,
        tag: query.tag,
        tags: all_tags,
    })
}

/// GET /posts/{post_id}
pub async fn show_post(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    IdPath(post_id): IdPath<i64>,
) -> Result<Response, AppError> {
    match db_call(&state, move |db| db.get_post(post_id)).await? {
        Some(post) => post_page(&state, user, post).await,
        None => Ok(templates::not_found(user)),
    }
}

/// GET /{url_key}
pub async fn show_by_url_key(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    match db_call(&state, move |db| db.get_post_by_url_key(&key)).await? {
        Some(post) => post_page(&state, user, post).await,
        None => Ok(templates::not_found(user)),
    }
}

async fn post_page(
    state: &AppState,
    user: Option<SessionUser>,
    post: PostRow,
) -> Result<Response, AppError> {
    let seen_by = match &user {
        Some(u) => viewer(state, u).await?,
        None => None,
    };

    let post_id = post.id;
    let (tags, attachments, comments, comment_files) = db_call(state, move |db| {
        Ok((
            db.tags_for_post(post_id)?,
            db.post_attachments(post_id)?,
            db.comments_for_post(post_id)?,
            db.comment_attachments(post_id)?,
        ))
    })
    .await?;

    let comments = comments
        .into_iter()
        .map(|c| {
            let files = comment_files
                .iter()
                .filter(|a| a.owner_id == c.id)
                .map(|a| a.name.clone())
                .collect();
            CommentView::new(c, files, seen_by.as_ref())
        })
        .collect();

    let can_edit = seen_by.is_some_and(|v| v.id == post.author_id);
    let can_delete = seen_by.is_some_and(|v| v.may_moderate(post.author_id));

    Ok(render(PostTemplate {
        user,
        post: PostView::new(post, tags),
        attachments: attachments.into_iter().map(|a| a.name).collect(),
        comments,
        can_edit,
        can_delete,
    })?
    .into_response())
}

/// GET /posts/builders
pub async fn builder_page(CurrentUser(user): CurrentUser) -> Result<Html<String>, AppError> {
    render(BuilderTemplate {
        user: Some(user),
        message: None,
        title: String::new(),
        content: String::new(),
        url_key: String::new(),
        tags: String::new(),
    })
}

/// POST /posts
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = MultipartForm::read(multipart, "avatar").await?;

    let title = form.text("title").to_string();
    let content = form.text("content").to_string();
    if title.is_empty() || content.is_empty() {
        return Ok(render(BuilderTemplate {
            user: Some(user),
            message: Some("Title and content are required".to_string()),
            url_key: form.text("url_key").to_string(),
            tags: form.text("tags").to_string(),
            title,
            content,
        })?
        .into_response());
    }

    let key = url_key::normalize(form.text("url_key")).unwrap_or_else(|| url_key::slugify(&title));
    let tags = parse_tags(form.text("tags"));

    let attachment = match form.take_file() {
        Some(file) => state.uploads.save(&file.file_name, &file.data).await?,
        None => None,
    };

    let new_post = NewPost {
        title,
        content,
        author_id: user.id,
        url_key: key,
        tags,
        attachment,
    };
    let post_id = db_call(&state, move |db| db.create_post(&new_post)).await?;

    info!("{} published post {}", user.name, post_id);
    Ok(Redirect::to(&format!("/posts/{}", post_id)).into_response())
}

/// GET /posts/delete/{post_id}
pub async fn delete_post_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(post_id): IdPath<i64>,
) -> Result<Html<String>, AppError> {
    let post = load_post(&state, post_id).await?;
    ensure_moderator(&state, &user, post.author_id).await?;

    render(DeletePostTemplate {
        user: Some(user),
        post_id,
        title: post.title,
    })
}

/// POST /posts/delete/Deleting
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<DeletePostForm>,
) -> Result<Redirect, AppError> {
    let post = load_post(&state, form.post_id).await?;
    ensure_moderator(&state, &user, post.author_id).await?;

    let post_id = post.id;
    let files = db_call(&state, move |db| db.delete_post(post_id)).await?;
    remove_files(&state, &files).await;

    info!("{} deleted post {}", user.name, post_id);
    Ok(Redirect::to("/"))
}

/// GET /posts/leaders
pub async fn leaders(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, AppError> {
    let leaders = db_call(&state, |db| db.karma_leaders(LEADERS_LIMIT)).await?;
    render(LeadersTemplate { user, leaders })
}

/// GET /user/posts/PostEditor/{post_id}
pub async fn editor_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(post_id): IdPath<i64>,
) -> Result<Html<String>, AppError> {
    let post = load_post(&state, post_id).await?;
    ensure_author(&user, post.author_id)?;

    let tags = db_call(&state, move |db| db.tags_for_post(post_id)).await?;
    let tags = tags.into_iter().map(|t| t.name).collect::<Vec<_>>().join(", ");

    render(PostEditorTemplate {
        user: Some(user),
        message: None,
        post_id,
        title: post.title,
        content: post.content,
        tags,
    })
}

/// POST /user/posts/PostEditor/{post_id}
pub async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(post_id): IdPath<i64>,
    Form(form): Form<PostEditForm>,
) -> Result<Response, AppError> {
    let post = load_post(&state, post_id).await?;
    ensure_author(&user, post.author_id)?;

    let title = form.title.trim().to_string();
    let content = form.content.trim().to_string();
    if title.is_empty() || content.is_empty() {
        return Ok(render(PostEditorTemplate {
            user: Some(user),
            message: Some("Title and content are required".to_string()),
            post_id,
            title,
            content,
            tags: form.tags,
        })?
        .into_response());
    }

    let tags = parse_tags(&form.tags);
    db_call(&state, move |db| db.update_post(post_id, &title, &content, &tags)).await?;

    info!("{} edited post {}", user.name, post_id);
    Ok(Redirect::to(&format!("/posts/{}", post_id)).into_response())
}
