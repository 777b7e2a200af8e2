//! Account handlers: registration, login and logout

use axum::{
    extract::{Multipart, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};

use super::rango::{page_context, render};
use super::session::{CurrentUser, MaybeUser, SessionHandle};
use super::{AppError, AppState};
use crate::forms::{self, FormErrors, UploadedPicture, UserForm, UserProfileForm};
use crate::models::User;
use crate::services::{RegisterInput, UserServiceError};

pub const ACCOUNT_DISABLED: &str = "Your Rango account is disabled.";
pub const INVALID_LOGIN: &str = "Invalid login details supplied.";

/// Values echoed back into the registration form
#[derive(Debug, Default, Serialize)]
struct RegisterEcho<'a> {
    #[serde(flatten)]
    user: Option<&'a UserForm>,
    website: &'a str,
}

fn register_page(
    state: &AppState,
    user: Option<&User>,
    registered: bool,
    echo: &RegisterEcho<'_>,
    errors: &FormErrors,
) -> Result<Html<String>, AppError> {
    let mut ctx = page_context(user);
    ctx.insert("registered", &registered);
    ctx.insert("form", echo);
    ctx.insert("errors", errors);
    render(state, "rango/register.html", &ctx)
}

pub async fn register_form(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, AppError> {
    register_page(
        &state,
        user.as_ref(),
        false,
        &RegisterEcho::default(),
        &FormErrors::default(),
    )
}

/// Split the multipart body into the account and profile forms
async fn read_register_forms(
    mut multipart: Multipart,
) -> Result<(UserForm, UserProfileForm), AppError> {
    let mut user_form = UserForm::default();
    let mut profile_form = UserProfileForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "picture" {
            let has_file = field.file_name().map_or(false, |f| !f.is_empty());
            let content_type = field.content_type().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read picture: {}", e)))?;
            if has_file && !data.is_empty() {
                profile_form.picture = Some(UploadedPicture {
                    content_type,
                    data: data.to_vec(),
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid form field {}: {}", name, e)))?;
        match name.as_str() {
            "username" => user_form.username = value,
            "email" => user_form.email = value,
            "password" => user_form.password = value,
            "website" => profile_form.website = value,
            _ => {}
        }
    }

    Ok((user_form, profile_form))
}

pub async fn register(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let (user_form, profile_form) = read_register_forms(multipart).await?;
    let echo = RegisterEcho {
        user: Some(&user_form),
        website: &profile_form.website,
    };

    let mut errors = user_form.validate();
    errors.merge(profile_form.validate(&state.media_config));
    if !errors.is_empty() {
        return register_page(&state, current.as_ref(), false, &echo, &errors);
    }

    let picture = match &profile_form.picture {
        Some(picture) => Some(forms::store_picture(&state.media_config, picture).await?),
        None => None,
    };

    let input = RegisterInput {
        username: user_form.username.clone(),
        email: user_form.email.clone(),
        password: user_form.password.clone(),
        website: Some(profile_form.website.clone()),
        picture: picture.clone(),
    };

    let result = state.user_service.register(input).await;
    if let (Err(_), Some(path)) = (&result, &picture) {
        forms::remove_picture(&state.media_config.path, path).await;
    }

    match result {
        Ok(_) => return register_page(&state, current.as_ref(), true, &echo, &errors),
        Err(UserServiceError::ValidationError { field, message }) => errors.add(field, message),
        Err(e @ UserServiceError::UserExists(_)) => errors.add("username", e.to_string()),
        Err(UserServiceError::InternalError(e)) => return Err(AppError::Internal(e)),
    }
    register_page(&state, current.as_ref(), false, &echo, &errors)
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

pub async fn login_form(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<LoginQuery>,
) -> Result<Html<String>, AppError> {
    let mut ctx = page_context(user.as_ref());
    ctx.insert("next", &query.next.unwrap_or_default());
    render(&state, "rango/login.html", &ctx)
}

pub async fn login(
    State(state): State<AppState>,
    session: SessionHandle,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let user = match state
        .user_service
        .authenticate(&form.username, &form.password)
        .await?
    {
        Some(user) => user,
        None => {
            tracing::info!("Invalid login details for {:?}", form.username);
            return Ok(INVALID_LOGIN.into_response());
        }
    };

    if !user.is_active {
        tracing::info!("Login refused for disabled account {}", user.username);
        return Ok(ACCOUNT_DISABLED.into_response());
    }

    let mut current = session.snapshot();
    state.session_service.login(&mut current, user.id).await?;
    session.replace(current);

    tracing::info!("User {} logged in", user.username);
    Ok(Redirect::to(safe_next(form.next.as_deref())).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    session: SessionHandle,
    CurrentUser(user): CurrentUser,
) -> Result<Redirect, AppError> {
    let mut current = session.snapshot();
    state.session_service.flush(&mut current).await?;
    session.reset(current);

    tracing::info!("User {} logged out", user.username);
    Ok(Redirect::to("/rango/"))
}

/// Local path to continue to after login; anything else goes to the index.
/// The path must also be usable as a `Location` header value.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && path.bytes().all(|b| b > 0x20 && b != 0x7f) =>
        {
            path
        }
        _ => "/rango/",
    }
}
