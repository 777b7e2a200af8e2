//! Error responses
//!
//! Handlers return [`AppError`]; its response carries an [`ErrorPage`]
//! extension that [`render_error_pages`] turns into the HTML error template.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use tera::Context;

use super::session::CurrentUser;
use super::AppState;
use crate::services::{CategoryServiceError, PageServiceError, UserServiceError};

/// Error returned by request handlers
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Status and message to render as an error page
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong on our side.".to_string(),
                )
            }
        };

        let mut response = (status, message.clone()).into_response();
        response
            .extensions_mut()
            .insert(ErrorPage { status, message });
        response
    }
}

impl From<CategoryServiceError> for AppError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::InternalError(e) => AppError::Internal(e),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<PageServiceError> for AppError {
    fn from(e: PageServiceError) -> Self {
        match e {
            PageServiceError::InternalError(e) => AppError::Internal(e),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<UserServiceError> for AppError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::InternalError(e) => AppError::Internal(e),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

/// Fallback for unknown paths
pub async fn not_found() -> AppError {
    AppError::NotFound("The requested page could not be found.".to_string())
}

/// Replace the plain-text body of error responses with the error template
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let user = request.extensions().get::<CurrentUser>().map(|u| u.0.clone());
    let response = next.run(request).await;

    let page = match response.extensions().get::<ErrorPage>() {
        Some(page) => page.clone(),
        None => return response,
    };

    let mut ctx = Context::new();
    ctx.insert("user", &user);
    ctx.insert("status", &page.status.as_u16());
    ctx.insert("message", &page.message);

    match state.templates.render("rango/error.html", &ctx) {
        Ok(html) => (page.status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Failed to render error page: {:#}", e);
            let (mut parts, body) = response.into_parts();
            parts.headers.insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            Response::from_parts(parts, body)
        }
    }
}
