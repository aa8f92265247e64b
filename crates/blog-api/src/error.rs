use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::templates;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Login required")]
    Unauthorized,

    #[error("Not allowed")]
    Forbidden,

    #[error("Malformed form: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Render error: {0}")]
    Render(#[from] sailfish::RenderError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Session layer missing: {0}")]
    NoSession(&'static str),

    #[error("Password hashing failed: {0}")]
    Password(String),

    #[error("Upload error: {0}")]
    Upload(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => templates::not_found(None),
            AppError::Unauthorized => Redirect::to("/user/login").into_response(),
            AppError::Forbidden => Redirect::to("/").into_response(),
            AppError::Multipart(e) => {
                warn!("Rejected multipart body: {}", e);
                (e.status(), e.body_text()).into_response()
            }
            other => {
                error!("{}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html("<h1>Internal server error</h1><p><a href=\"/\">Back to the blog</a></p>"),
                )
                    .into_response()
            }
        }
    }
}
