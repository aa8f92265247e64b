use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{info, warn};

use blog_types::forms::{LoginForm, RegisterForm};
use blog_types::{Role, SessionUser};

use super::MAX_NAME_CHARS;
use crate::error::AppError;
use crate::session::{MaybeUser, sign_in};
use crate::templates::{LoginTemplate, RegistrationTemplate, render};
use crate::{AppState, db_call};

const FILL_ALL_FIELDS: &str = "Fill in all fields";

/// Hashes a password with Argon2id. Returns the PHC string and its salt.
pub(crate) fn hash_password(password: &str) -> Result<(String, String), AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Password(e.to_string()))?
        .to_string();
    Ok((hash, salt.as_str().to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

pub async fn login_page(MaybeUser(user): MaybeUser) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/user").into_response());
    }
    Ok(login_form(None, String::new())?.into_response())
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let login = form.login.trim().to_string();
    if login.is_empty() || form.password.is_empty() {
        return Ok(login_form(Some(FILL_ALL_FIELDS), login)?.into_response());
    }

    let name = login.clone();
    let Some(user) = db_call(&state, move |db| db.get_user_by_name(&name)).await? else {
        return Ok(login_form(Some("Wrong login or password"), login)?.into_response());
    };

    if !verify_password(&form.password, &user.password_hash) {
        warn!("Failed login for {}", user.name);
        return Ok(login_form(Some("Wrong login or password"), login)?.into_response());
    }

    let id = user.id;
    db_call(&state, move |db| db.touch_last_visit(id)).await?;

    sign_in(&session, &SessionUser { id, name: user.name.clone() }).await?;
    info!("User {} logged in", user.name);
    Ok(Redirect::to("/user").into_response())
}

fn login_form(message: Option<&str>, login: String) -> Result<impl IntoResponse, AppError> {
    render(LoginTemplate {
        user: None,
        message: message.map(str::to_string),
        login,
    })
}

pub async fn registration_page(MaybeUser(user): MaybeUser) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/user").into_response());
    }
    Ok(registration_form(None, String::new())?.into_response())
}

pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let login = form.login.trim().to_string();
    if login.is_empty() || form.password.is_empty() {
        return Ok(registration_form(Some(FILL_ALL_FIELDS), login)?.into_response());
    }
    if login.chars().count() > MAX_NAME_CHARS {
        let message = format!("Login must be at most {} characters", MAX_NAME_CHARS);
        return Ok(registration_form(Some(&message), login)?.into_response());
    }

    let (hash, salt) = hash_password(&form.password)?;

    let name = login.clone();
    let created =
        db_call(&state, move |db| db.create_user(&name, &hash, &salt, Role::User)).await?;
    let Some(id) = created else {
        return Ok(registration_form(Some("This login is already taken"), login)?.into_response());
    };

    sign_in(&session, &SessionUser { id, name: login.clone() }).await?;
    info!("User {} registered", login);
    Ok(Redirect::to("/user").into_response())
}

fn registration_form(message: Option<&str>, login: String) -> Result<impl IntoResponse, AppError> {
    render(RegistrationTemplate {
        user: None,
        message: message.map(str::to_string),
        login,
    })
}

pub async fn logout(session: Session) -> Result<Redirect, AppError> {
    session.flush().await?;
    Ok(Redirect::to("/user/login"))
}
