use axum::{
    extract::State,
    response::{Html, Response},
};

use super::viewer;
use crate::error::AppError;
use crate::session::{CurrentUser, MaybeUser};
use crate::templates::{self, AboutTemplate, AdminTemplate, ReportView, render};
use crate::{AppState, db_call};

/// Reports listed on the admin panel.
const ADMIN_REPORTS: i64 = 50;

/// GET /about
pub async fn about(MaybeUser(user): MaybeUser) -> Result<Html<String>, AppError> {
    render(AboutTemplate { user })
}

/// GET /admin
pub async fn admin(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    match viewer(&state, &user).await? {
        Some(v) if v.is_admin => {}
        Some(_) => return Err(AppError::Forbidden),
        None => return Err(AppError::Unauthorized),
    }

    let reports = db_call(&state, |db| db.recent_reports(ADMIN_REPORTS)).await?;
    render(AdminTemplate {
        user: Some(user),
        reports: reports.into_iter().map(ReportView::new).collect(),
    })
}

/// Fallback for every unmatched path.
pub async fn not_found(MaybeUser(user): MaybeUser) -> Response {
    templates::not_found(user)
}
