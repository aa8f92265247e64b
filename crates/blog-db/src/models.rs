//! Database row types: these map directly to SQLite rows and views.
//! Timestamps stay as SQLite's "YYYY-MM-DD HH:MM:SS" text.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub password_hash: String,
    pub password_salt: String,
    pub role_id: i64,
    pub icon_id: Option<i64>,
    pub registration_date: String,
    pub last_visit_date: Option<String>,
    pub moto: String,
}

/// Row of `user_info_view`: profile data plus post/comment totals.
#[derive(Debug, Clone)]
pub struct UserInfoRow {
    pub user_id: i64,
    pub name: String,
    pub role_id: i64,
    pub role_name: String,
    pub registration_date: String,
    pub last_visit_date: Option<String>,
    pub moto: String,
    /// Posts authored; this is the user's karma.
    pub total: i64,
    pub comment_total: i64,
}

/// Row of `user_post_view`.
#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub published_date: String,
    pub url_key: String,
    pub author_id: i64,
    pub author_name: String,
    pub author_icon_name: Option<String>,
}

/// Row of `user_comment_view`.
#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: i64,
    pub content: String,
    pub published_date: String,
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub author_icon_name: Option<String>,
}

/// A bug report with its author's name, if the author was signed in.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub id: i64,
    pub author_name: Option<String>,
    pub subject: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct AttachmentRow {
    pub id: i64,
    pub name: String,
    /// Post or comment the file hangs off.
    pub owner_id: i64,
}

/// Row of `user_icon_view`.
#[derive(Debug, Clone)]
pub struct IconRow {
    pub id: i64,
    pub name: String,
    pub is_default: bool,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRow {
    pub id: i64,
    pub name: String,
}

/// Filters of the post listing. All present filters must match.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub author_id: Option<i64>,
    pub search: Option<String>,
    pub tag_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub url_key: String,
    pub tags: Vec<String>,
    /// Public path of an uploaded file to attach.
    pub attachment: Option<String>,
}
