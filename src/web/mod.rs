//! Web layer - HTTP handlers and routing
//!
//! Server-rendered HTML under `/rango/`:
//! - Public pages (index, about, category) in `rango`
//! - Account pages (register, login, logout) in `auth`
//! - Session cookie and login-required middleware in `session`
//! - Error pages in `error`

pub mod auth;
pub mod error;
pub mod rango;
pub mod session;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    response::Redirect,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::cache::MemoryCache;
use crate::config::{Config, MediaConfig, SessionConfig};
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxPageRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{CategoryService, PageService, SessionService, UserService};
use crate::templates::TemplateEngine;

pub use error::AppError;
pub use session::{CurrentUser, MaybeUser, SessionHandle};

/// Multipart overhead allowed on top of the picture size limit
const FORM_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub category_service: Arc<CategoryService>,
    pub page_service: Arc<PageService>,
    pub user_service: Arc<UserService>,
    pub session_service: Arc<SessionService>,
    pub templates: Arc<TemplateEngine>,
    pub session_config: Arc<SessionConfig>,
    pub media_config: Arc<MediaConfig>,
}

impl AppState {
    /// Wire repositories and services over a migrated pool
    pub fn new(pool: DynDatabasePool, config: &Config) -> Result<Self> {
        let cache = Arc::new(MemoryCache::new());
        let templates = TemplateEngine::from_config(&config.templates)?;

        Ok(Self {
            category_service: Arc::new(CategoryService::new(
                SqlxCategoryRepository::boxed(pool.clone()),
                cache,
            )),
            page_service: Arc::new(PageService::new(SqlxPageRepository::boxed(pool.clone()))),
            user_service: Arc::new(UserService::new(SqlxUserRepository::boxed(pool.clone()))),
            session_service: Arc::new(SessionService::new(
                SqlxSessionRepository::boxed(pool),
                config.session.max_age_days,
            )),
            templates: Arc::new(templates),
            session_config: Arc::new(config.session.clone()),
            media_config: Arc::new(config.media.clone()),
        })
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let body_limit = (state.media_config.max_file_size + FORM_OVERHEAD_BYTES) as usize;

    // Routes that need a logged-in user
    let protected_routes = Router::new()
        .route(
            "/rango/add_category/",
            get(rango::add_category_form).post(rango::add_category),
        )
        .route(
            "/rango/category/{slug}/add_page/",
            get(rango::add_page_form).post(rango::add_page),
        )
        .route("/rango/restricted/", get(rango::restricted))
        .route("/rango/logout/", get(auth::logout))
        .route_layer(axum_middleware::from_fn(session::require_login));

    Router::new()
        .route("/", get(|| async { Redirect::to("/rango/") }))
        .route("/rango/", get(rango::index))
        .route("/rango/about/", get(rango::about))
        .route("/rango/category/{slug}/", get(rango::show_category))
        .route(
            "/rango/register/",
            get(auth::register_form)
                .post(auth::register)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/rango/login/", get(auth::login_form).post(auth::login))
        .merge(protected_routes)
        .nest_service("/media", ServeDir::new(&state.media_config.path))
        .fallback(error::not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            error::render_error_pages,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session::session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
