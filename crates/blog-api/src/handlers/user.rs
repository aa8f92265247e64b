use axum::{
    Form,
    extract::{Multipart, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::info;

use blog_db::queries::ProfileUpdate;
use blog_types::forms::{ReportForm, SelectIconForm};
use blog_types::session::SESSION_USER_KEY;
use blog_types::SessionUser;

use super::MAX_NAME_CHARS;
use super::auth::hash_password;
use crate::error::AppError;
use crate::session::{CurrentUser, MaybeUser};
use crate::templates::{
    CabinetTemplate, IconsTemplate, PostView, ProfileView, ReportTemplate, UserEditorTemplate,
    render,
};
use crate::uploads::MultipartForm;
use crate::{AppState, db_call};

/// GET /user
pub async fn cabinet(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    let id = user.id;
    let (info, icon, posts, tags) = db_call(&state, move |db| {
        let posts = db.posts_by_author(id)?;
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        Ok((
            db.get_user_info(id)?,
            db.user_icon(id)?,
            posts,
            db.tags_for_posts(&ids)?,
        ))
    })
    .await?;

    // Account removed while the session lived on.
    let Some(info) = info else {
        session.flush().await?;
        return Ok(Redirect::to("/user/login").into_response());
    };

    let mut tags = tags;
    let posts = posts
        .into_iter()
        .map(|p| {
            let post_tags = tags.remove(&p.id).unwrap_or_default();
            PostView::card(p, post_tags)
        })
        .collect();

    Ok(render(CabinetTemplate {
        user: Some(user),
        profile: ProfileView::new(info, icon),
        posts,
    })?
    .into_response())
}

/// GET /user/UserEditor
pub async fn editor_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    let id = user.id;
    let row = db_call(&state, move |db| db.get_user_by_id(id))
        .await?
        .ok_or(AppError::Unauthorized)?;

    render(UserEditorTemplate {
        user: Some(user),
        message: None,
        name: row.name,
        moto: row.moto,
    })
}

/// POST /user/UserEditor/debug
///
/// Blank fields keep their current value; an uploaded file becomes the
/// user's icon.
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = MultipartForm::read(multipart, "avatar").await?;

    let name = form.non_empty("name").filter(|n| *n != user.name).map(str::to_string);
    let password = form.non_empty("password").map(str::to_string);
    let moto = form.non_empty("moto").map(str::to_string);

    if name.as_ref().is_some_and(|n| n.chars().count() > MAX_NAME_CHARS) {
        let message = format!("Login must be at most {} characters", MAX_NAME_CHARS);
        return editor_with_message(&state, user, message).await;
    }

    let hashed = match &password {
        Some(p) => Some(hash_password(p)?),
        None => None,
    };

    let id = user.id;
    let new_name = name.clone();
    let updated = db_call(&state, move |db| {
        let update = ProfileUpdate {
            name: new_name.as_deref(),
            password: hashed.as_ref().map(|(h, s)| (h.as_str(), s.as_str())),
            moto: moto.as_deref(),
        };
        db.update_profile(id, &update)
    })
    .await?;

    if !updated {
        return editor_with_message(&state, user, "This login is already taken".to_string()).await;
    }

    if let Some(file) = form.take_file() {
        if let Some(public) = state.uploads.save(&file.file_name, &file.data).await? {
            db_call(&state, move |db| db.add_user_icon(id, &public)).await?;
        }
    }

    if let Some(name) = name {
        info!("User {} renamed to {}", user.name, name);
        session
            .insert(SESSION_USER_KEY, &SessionUser { id, name })
            .await?;
    }

    Ok(Redirect::to("/user").into_response())
}

async fn editor_with_message(
    state: &AppState,
    user: SessionUser,
    message: String,
) -> Result<Response, AppError> {
    let id = user.id;
    let row = db_call(state, move |db| db.get_user_by_id(id))
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(render(UserEditorTemplate {
        user: Some(user),
        message: Some(message),
        name: row.name,
        moto: row.moto,
    })?
    .into_response())
}

/// GET /user/icons/default
pub async fn icons_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    let id = user.id;
    let (icons, current) =
        db_call(&state, move |db| Ok((db.default_icons()?, db.user_icon(id)?))).await?;

    render(IconsTemplate {
        user: Some(user),
        icons,
        current: current.map(|i| i.id),
    })
}

/// POST /user/icons/debug
pub async fn select_icon(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<SelectIconForm>,
) -> Result<Redirect, AppError> {
    let icon_id = form.icon_id;
    if !db_call(&state, move |db| db.is_default_icon(icon_id)).await? {
        return Err(AppError::Forbidden);
    }

    let id = user.id;
    db_call(&state, move |db| db.set_user_icon(id, icon_id)).await?;
    Ok(Redirect::to("/user"))
}

/// GET /user/report
pub async fn report_page(MaybeUser(user): MaybeUser) -> Result<Html<String>, AppError> {
    render(ReportTemplate {
        user,
        message: None,
        sent: false,
    })
}

/// POST /user/report/debug
pub async fn submit_report(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Form(form): Form<ReportForm>,
) -> Result<Html<String>, AppError> {
    let subject = form.subject.trim().to_string();
    let body = form.body.trim().to_string();
    if subject.is_empty() || body.is_empty() {
        return render(ReportTemplate {
            user,
            message: Some("Fill in all fields".to_string()),
            sent: false,
        });
    }

    let author_id = user.as_ref().map(|u| u.id);
    db_call(&state, move |db| db.create_report(author_id, &subject, &body)).await?;

    render(ReportTemplate {
        user,
        message: None,
        sent: true,
    })
}
