//! Urlencoded form bodies. Multipart forms (posts, comments, profile)
//! are parsed field by field in the handlers.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeletePostForm {
    pub post_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCommentForm {
    pub comment_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PostEditForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Comma separated tag names.
    #[serde(default)]
    pub tags: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentEditForm {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectIconForm {
    pub icon_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReportForm {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

/// Splits a comma separated tag field into trimmed, de-duplicated names.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let name = name.to_lowercase();
        if !tags.contains(&name) {
            tags.push(name);
        }
    }
    tags
}
