pub mod error;
pub mod handlers;
pub mod session;
pub mod templates;
pub mod uploads;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::time::Duration};

use blog_db::Database;

use crate::error::AppError;
use crate::handlers::{auth, comments, pages, posts, user};
use crate::uploads::{MAX_UPLOAD_SIZE, Uploads};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub uploads: Uploads,
}

/// Settings of the HTTP layer that are not request state.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Directory served under `/public`.
    pub public_dir: PathBuf,
    pub session_hours: i64,
    pub secure_cookies: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("public"),
            session_hours: 24,
            secure_cookies: false,
        }
    }
}

/// Runs a blocking repository call off the async runtime.
pub(crate) async fn db_call<F, T>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await?
        .map_err(AppError::Database)
}

/// The whole site: pages, static files, sessions and request tracing.
pub fn app(state: AppState, config: &WebConfig) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::hours(config.session_hours)));

    let post_routes = Router::new()
        .route("/", get(posts::index))
        .route("/posts", get(posts::index).post(posts::create_post))
        .route("/posts/builders", get(posts::builder_page))
        .route("/posts/leaders", get(posts::leaders))
        .route("/posts/{post_id}", get(posts::show_post))
        .route("/posts/{post_id}/comments", post(comments::create_comment))
        .route("/posts/delete/Deleting", post(posts::delete_post))
        .route("/posts/delete/{post_id}", get(posts::delete_post_page))
        .route(
            "/posts/delete/{post_id}/comments/Deleting",
            post(comments::delete_comment),
        )
        .route(
            "/posts/delete/{post_id}/comments/{comment_id}",
            get(comments::delete_comment_page),
        );

    let user_routes = Router::new()
        .route("/user", get(user::cabinet))
        .route("/user/login", get(auth::login_page).post(auth::login))
        .route("/user/registration", get(auth::registration_page).post(auth::register))
        .route("/user/logout", get(auth::logout))
        .route("/user/UserEditor", get(user::editor_page))
        .route("/user/UserEditor/debug", post(user::update_profile))
        .route("/user/icons/default", get(user::icons_page))
        .route("/user/icons/debug", post(user::select_icon))
        .route("/user/report", get(user::report_page))
        .route("/user/report/debug", post(user::submit_report))
        .route(
            "/user/posts/PostEditor/{post_id}",
            get(posts::editor_page).post(posts::update_post),
        )
        .route(
            "/user/posts/CommentEditor/{post_id}/{comment_id}",
            get(comments::editor_page).post(comments::update_comment),
        );

    let page_routes = Router::new()
        .route("/about", get(pages::about))
        .route("/admin", get(pages::admin))
        .route("/{url_key}", get(posts::show_by_url_key));

    Router::new()
        .merge(post_routes)
        .merge(user_routes)
        .merge(page_routes)
        .nest_service("/public", ServeDir::new(&config.public_dir))
        .fallback(pages::not_found)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
