//! Session middleware
//!
//! Loads the session named by the session cookie (or starts an empty one),
//! exposes it to handlers as a [`SessionHandle`] request extension, and
//! persists it after the handler ran if anything changed. A logged-in, active
//! user is resolved once per request and stored as [`CurrentUser`].

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{AppError, AppState};
use crate::config::SessionConfig;
use crate::models::{Session, User};

/// Per-request access to the current session.
///
/// The lock is only held inside the closures passed to [`SessionHandle::update`]
/// and [`SessionHandle::read`], never across an await point.
#[derive(Clone)]
pub struct SessionHandle(Arc<Mutex<SessionSlot>>);

struct SessionSlot {
    session: Session,
    modified: bool,
    flushed: bool,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(SessionSlot {
            session,
            modified: false,
            flushed: false,
        })))
    }

    fn lock(&self) -> MutexGuard<'_, SessionSlot> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mutate the session; it will be saved when the response is sent
    pub fn update<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut slot = self.lock();
        slot.modified = true;
        f(&mut slot.session)
    }

    pub fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.lock().session)
    }

    /// Copy of the session, for async work that must not hold the lock
    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    /// Install a session that was changed (e.g. logged in) outside the handle
    pub fn replace(&self, session: Session) {
        let mut slot = self.lock();
        slot.session = session;
        slot.modified = true;
    }

    /// Install the empty session left behind by a flush. Unless something is
    /// stored in it later, the cookie is cleared instead of saving it.
    pub fn reset(&self, session: Session) {
        let mut slot = self.lock();
        slot.session = session;
        slot.modified = false;
        slot.flushed = true;
    }

    fn finish(&self) -> (Session, bool, bool) {
        let slot = self.lock();
        (slot.session.clone(), slot.modified, slot.flushed)
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Session middleware not installed")))
    }
}

/// Logged-in, active user of the current request
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// The current user, if anyone is logged in
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts.extensions.get::<CurrentUser>().map(|u| u.0.clone()),
        ))
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| login_redirect(parts.uri.path_and_query().map(|pq| pq.as_str())))
    }
}

/// Session middleware
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let config = &state.session_config;

    let loaded = match read_cookie(request.headers(), &config.cookie_name) {
        Some(id) => match state.session_service.load(&id).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Failed to load session: {:#}", e);
                None
            }
        },
        None => None,
    };
    let session = loaded.unwrap_or_else(|| state.session_service.new_session());

    if let Some(user) = resolve_user(&state, &session).await {
        request.extensions_mut().insert(CurrentUser(user));
    }

    let handle = SessionHandle::new(session);
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    let (mut session, modified, flushed) = handle.finish();
    if modified {
        match state.session_service.save(&mut session).await {
            Ok(()) => {
                let cookie =
                    session_cookie(config, &session.id, state.session_service.max_age());
                set_cookie(response.headers_mut(), &cookie)
            }
            Err(e) => tracing::error!("Failed to save session: {:#}", e),
        }
    } else if flushed {
        set_cookie(response.headers_mut(), &clear_cookie(config));
    }

    response
}

/// Send anonymous visitors to the login page, remembering where they were going
pub async fn require_login(request: Request, next: Next) -> Response {
    if request.extensions().get::<CurrentUser>().is_some() {
        return next.run(request).await;
    }
    login_redirect(request.uri().path_and_query().map(|pq| pq.as_str()))
}

fn login_redirect(target: Option<&str>) -> Response {
    let target = target.unwrap_or("/rango/");
    Redirect::to(&format!("/rango/login/?next={}", urlencoding::encode(target))).into_response()
}

async fn resolve_user(state: &AppState, session: &Session) -> Option<User> {
    let user_id = session.user_id?;
    match state.user_service.get_by_id(user_id).await {
        Ok(Some(user)) if user.is_active => Some(user),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Failed to load session user {}: {}", user_id, e);
            None
        }
    }
}

/// Value of the cookie called `name`
fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn session_cookie(config: &SessionConfig, id: &str, max_age: chrono::Duration) -> String {
    let secure = if config.secure_cookie { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        config.cookie_name,
        id,
        max_age.num_seconds(),
        secure
    )
}

fn clear_cookie(config: &SessionConfig) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", config.cookie_name)
}

fn set_cookie(headers: &mut HeaderMap, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Invalid session cookie header: {}", e),
    }
}
