//! Compiled page templates and the view models they render.
//!
//! Template sources live in `templates/` and reach their fields through
//! `self`. The header partial reads `self.user` and the message partial
//! reads `self.message`, so every page struct carries the fields its
//! partials need.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::NaiveDateTime;
use sailfish::TemplateOnce;

use blog_db::migrations::DEFAULT_AVATAR;
use blog_db::models::{CommentRow, IconRow, PostRow, ReportRow, TagRow, UserInfoRow};
use blog_types::{Pagination, SessionUser};

use crate::error::AppError;

const EXCERPT_CHARS: usize = 300;

/// Renders a template into an HTML response body.
pub fn render<T: TemplateOnce>(template: T) -> Result<Html<String>, AppError> {
    Ok(Html(template.render_once()?))
}

/// The 404 page. Falls back to plain text if the template itself fails.
pub fn not_found(user: Option<SessionUser>) -> Response {
    match (NotFoundTemplate { user }).render_once() {
        Ok(body) => (StatusCode::NOT_FOUND, Html(body)).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// `2024-03-01 18:05:00` → `01.03.2024 18:05`. Unparseable input is
/// shown as stored.
pub fn display_date(raw: &str) -> String {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.format("%d.%m.%Y %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn icon_or_default(icon: Option<String>) -> String {
    icon.unwrap_or_else(|| DEFAULT_AVATAR.to_string())
}

fn excerpt(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head.trim_end())
    } else {
        head
    }
}

// -- View models --

pub struct PostView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub published: String,
    pub url_key: String,
    pub author_id: i64,
    pub author_name: String,
    pub author_icon: String,
    pub tags: Vec<TagRow>,
}

impl PostView {
    pub fn new(row: PostRow, tags: Vec<TagRow>) -> Self {
        Self {
            id: row.id,
            title: row.title,
            published: display_date(&row.published_date),
            content: row.content,
            url_key: row.url_key,
            author_id: row.author_id,
            author_name: row.author_name,
            author_icon: icon_or_default(row.author_icon_name),
            tags,
        }
    }

    /// Same post with the body cut down for a listing card.
    pub fn card(row: PostRow, tags: Vec<TagRow>) -> Self {
        let mut view = Self::new(row, tags);
        view.content = excerpt(&view.content);
        view
    }
}

pub struct CommentView {
    pub id: i64,
    pub content: String,
    pub published: String,
    pub author_name: String,
    pub author_icon: String,
    pub attachments: Vec<String>,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl CommentView {
    pub fn new(row: CommentRow, attachments: Vec<String>, viewer: Option<&Viewer>) -> Self {
        let can_edit = viewer.is_some_and(|v| v.id == row.author_id);
        let can_delete = viewer.is_some_and(|v| v.may_moderate(row.author_id));
        Self {
            id: row.id,
            published: display_date(&row.published_date),
            content: row.content,
            author_name: row.author_name,
            author_icon: icon_or_default(row.author_icon_name),
            attachments,
            can_edit,
            can_delete,
        }
    }
}

/// Who is looking at a page, for deciding which controls to show.
#[derive(Debug, Clone, Copy)]
pub struct Viewer {
    pub id: i64,
    pub is_admin: bool,
}

impl Viewer {
    /// Authors moderate their own content; admins moderate everything.
    pub fn may_moderate(&self, author_id: i64) -> bool {
        self.is_admin || self.id == author_id
    }
}

pub struct ProfileView {
    pub name: String,
    pub role: String,
    pub registered: String,
    pub last_visit: String,
    pub moto: String,
    pub total: i64,
    pub comment_total: i64,
    pub icon: String,
}

impl ProfileView {
    pub fn new(info: UserInfoRow, icon: Option<IconRow>) -> Self {
        Self {
            name: info.name,
            role: info.role_name,
            registered: display_date(&info.registration_date),
            last_visit: info
                .last_visit_date
                .as_deref()
                .map(display_date)
                .unwrap_or_else(|| "never".to_string()),
            moto: info.moto,
            total: info.total,
            comment_total: info.comment_total,
            icon: icon_or_default(icon.map(|i| i.name)),
        }
    }
}

pub struct ReportView {
    pub subject: String,
    pub body: String,
    pub author: String,
    pub created: String,
}

impl ReportView {
    pub fn new(row: ReportRow) -> Self {
        Self {
            subject: row.subject,
            body: row.body,
            author: row.author_name.unwrap_or_else(|| "anonymous".to_string()),
            created: display_date(&row.created_at),
        }
    }
}

// -- Pages --

#[derive(TemplateOnce)]
#[template(path = "index.stpl")]
pub struct IndexTemplate {
    pub user: Option<SessionUser>,
    pub posts: Vec<PostView>,
    pub pagination: Pagination,
    pub search: String,
    pub author: Option<i64>,
    pub tag: Option<i64>,
    pub tags: Vec<TagRow>,
}

#[derive(TemplateOnce)]
#[template(path = "post.stpl")]
pub struct PostTemplate {
    pub user: Option<SessionUser>,
    pub post: PostView,
    pub attachments: Vec<String>,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub can_delete: bool,
}

#[derive(TemplateOnce)]
#[template(path = "builder.stpl")]
pub struct BuilderTemplate {
    pub user: Option<SessionUser>,
    pub message: Option<String>,
    pub title: String,
    pub content: String,
    pub url_key: String,
    pub tags: String,
}

#[derive(TemplateOnce)]
#[template(path = "post_editor.stpl")]
pub struct PostEditorTemplate {
    pub user: Option<SessionUser>,
    pub message: Option<String>,
    pub post_id: i64,
    pub title: String,
    pub content: String,
    pub tags: String,
}

#[derive(TemplateOnce)]
#[template(path = "comment_editor.stpl")]
pub struct CommentEditorTemplate {
    pub user: Option<SessionUser>,
    pub message: Option<String>,
    pub post_id: i64,
    pub comment_id: i64,
    pub content: String,
}

#[derive(TemplateOnce)]
#[template(path = "delete_post.stpl")]
pub struct DeletePostTemplate {
    pub user: Option<SessionUser>,
    pub post_id: i64,
    pub title: String,
}

#[derive(TemplateOnce)]
#[template(path = "delete_comment.stpl")]
pub struct DeleteCommentTemplate {
    pub user: Option<SessionUser>,
    pub post_id: i64,
    pub comment_id: i64,
    pub excerpt: String,
}

#[derive(TemplateOnce)]
#[template(path = "leaders.stpl")]
pub struct LeadersTemplate {
    pub user: Option<SessionUser>,
    pub leaders: Vec<UserInfoRow>,
}

#[derive(TemplateOnce)]
#[template(path = "login.stpl")]
pub struct LoginTemplate {
    pub user: Option<SessionUser>,
    pub message: Option<String>,
    pub login: String,
}

#[derive(TemplateOnce)]
#[template(path = "registration.stpl")]
pub struct RegistrationTemplate {
    pub user: Option<SessionUser>,
    pub message: Option<String>,
    pub login: String,
}

#[derive(TemplateOnce)]
#[template(path = "cabinet.stpl")]
pub struct CabinetTemplate {
    pub user: Option<SessionUser>,
    pub profile: ProfileView,
    pub posts: Vec<PostView>,
}

#[derive(TemplateOnce)]
#[template(path = "user_editor.stpl")]
pub struct UserEditorTemplate {
    pub user: Option<SessionUser>,
    pub message: Option<String>,
    pub name: String,
    pub moto: String,
}

#[derive(TemplateOnce)]
#[template(path = "icons.stpl")]
pub struct IconsTemplate {
    pub user: Option<SessionUser>,
    pub icons: Vec<IconRow>,
    pub current: Option<i64>,
}

#[derive(TemplateOnce)]
#[template(path = "report.stpl")]
pub struct ReportTemplate {
    pub user: Option<SessionUser>,
    pub message: Option<String>,
    pub sent: bool,
}

#[derive(TemplateOnce)]
#[template(path = "about.stpl")]
pub struct AboutTemplate {
    pub user: Option<SessionUser>,
}

#[derive(TemplateOnce)]
#[template(path = "admin.stpl")]
pub struct AdminTemplate {
    pub user: Option<SessionUser>,
    pub reports: Vec<ReportView>,
}

#[derive(TemplateOnce)]
#[template(path = "not_found.stpl")]
pub struct NotFoundTemplate {
    pub user: Option<SessionUser>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_are_shown_day_first() {
        assert_eq!(display_date("2024-03-01 18:05:00"), "01.03.2024 18:05");
        assert_eq!(display_date("yesterday"), "yesterday");
    }

    #[test]
    fn long_posts_are_cut_for_cards() {
        let long = "a".repeat(EXCERPT_CHARS + 10);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 1);
        assert!(cut.ends_with('…'));
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn moderation_rights() {
        let author = Viewer { id: 1, is_admin: false };
        let admin = Viewer { id: 2, is_admin: true };
        let other = Viewer { id: 3, is_admin: false };
        assert!(author.may_moderate(1));
        assert!(admin.may_moderate(1));
        assert!(!other.may_moderate(1));
    }

    #[test]
    fn pages_render_their_own_fields() {
        let page = DeleteCommentTemplate {
            user: Some(SessionUser { id: 7, name: "anna".to_string() }),
            post_id: 3,
            comment_id: 11,
            excerpt: "first words".to_string(),
        }
        .render_once()
        .unwrap();
        assert!(page.contains("<blockquote>first words</blockquote>"));
        assert!(page.contains("/posts/delete/3/comments/Deleting"));
        assert!(page.contains("value=\"11\""));
        assert!(page.contains("anna"));
        assert!(page.contains("/user/logout"));
    }

    #[test]
    fn message_partial_shows_the_message() {
        let page = LoginTemplate {
            user: None,
            message: Some("Wrong login or password".to_string()),
            login: "anna".to_string(),
        }
        .render_once()
        .unwrap();
        assert!(page.contains("<p class=\"message\">Wrong login or password</p>"));
        assert!(page.contains("value=\"anna\""));
        assert!(page.contains("/user/registration"));
    }

    #[test]
    fn not_found_page_renders_with_404() {
        let response = not_found(None);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
