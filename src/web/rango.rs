//! Category and page handlers

use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Serialize;
use tera::Context;

use super::session::{CurrentUser, MaybeUser, SessionHandle};
use super::{AppError, AppState};
use crate::forms::{CategoryForm, FormErrors, PageForm};
use crate::models::{Category, Page, User};
use crate::services::{CategoryServiceError, PageServiceError, VisitTracker};

pub const BOLD_MESSAGE: &str = "Crunchy, creamy, cookie, candy, cupcake!";

/// How many categories and pages the index lists
const TOP_LIMIT: i64 = 5;

/// Template context shared by every page
pub(crate) fn page_context(user: Option<&User>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("user", &user);
    ctx
}

pub(crate) fn render(state: &AppState, template: &str, ctx: &Context) -> Result<Html<String>, AppError> {
    Ok(Html(state.templates.render(template, ctx)?))
}

/// A most-viewed page with the category it is filed under
#[derive(Serialize)]
struct TopPage {
    #[serde(flatten)]
    page: Page,
    category: Option<Category>,
}

/// Count this visit and return the session's visit total
fn track_visit(session: &SessionHandle) -> u32 {
    session.update(|s| VisitTracker::handle(s)).visits
}

pub async fn index(
    State(state): State<AppState>,
    session: SessionHandle,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, AppError> {
    let categories = state.category_service.top_by_likes(TOP_LIMIT).await?;
    let mut pages = Vec::new();
    for page in state.page_service.top_by_views(TOP_LIMIT).await? {
        let category = state.category_service.get_by_id(page.category_id).await?;
        pages.push(TopPage { page, category });
    }
    let visits = track_visit(&session);

    let mut ctx = page_context(user.as_ref());
    ctx.insert("boldmessage", BOLD_MESSAGE);
    ctx.insert("categories", &categories);
    ctx.insert("pages", &pages);
    ctx.insert("visits", &visits);
    render(&state, "rango/index.html", &ctx)
}

pub async fn about(
    State(state): State<AppState>,
    session: SessionHandle,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, AppError> {
    let visits = track_visit(&session);

    let mut ctx = page_context(user.as_ref());
    ctx.insert("boldmessage", BOLD_MESSAGE);
    ctx.insert("visits", &visits);
    render(&state, "rango/about.html", &ctx)
}

/// A category and its pages. An unknown slug still renders, without a category.
pub async fn show_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, AppError> {
    let category = state.category_service.get_by_slug(&slug).await?;
    let pages = match &category {
        Some(category) => state.page_service.list_by_category(category.id).await?,
        None => Vec::new(),
    };

    let mut ctx = page_context(user.as_ref());
    ctx.insert("category", &category);
    ctx.insert("pages", &pages);
    render(&state, "rango/category.html", &ctx)
}

fn category_form_page(
    state: &AppState,
    user: &User,
    form: &CategoryForm,
    errors: &FormErrors,
) -> Result<Html<String>, AppError> {
    let mut ctx = page_context(Some(user));
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    render(state, "rango/add_category.html", &ctx)
}

pub async fn add_category_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    category_form_page(&state, &user, &CategoryForm::default(), &FormErrors::default())
}

pub async fn add_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<CategoryForm>,
) -> Result<Response, AppError> {
    let mut errors = form.validate();
    if errors.is_empty() {
        match state.category_service.create(&form.name).await {
            Ok(_) => return Ok(Redirect::to("/rango/").into_response()),
            Err(CategoryServiceError::InternalError(e)) => return Err(AppError::Internal(e)),
            Err(e) => errors.add("name", e.to_string()),
        }
    }

    Ok(category_form_page(&state, &user, &form, &errors)?.into_response())
}

fn page_form_page(
    state: &AppState,
    user: &User,
    category: &Category,
    form: &PageForm,
    errors: &FormErrors,
) -> Result<Html<String>, AppError> {
    let mut ctx = page_context(Some(user));
    ctx.insert("category", category);
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    render(state, "rango/add_page.html", &ctx)
}

pub async fn add_page_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let Some(category) = state.category_service.get_by_slug(&slug).await? else {
        return Ok(Redirect::to("/rango/").into_response());
    };

    Ok(page_form_page(&state, &user, &category, &PageForm::default(), &FormErrors::default())?
        .into_response())
}

pub async fn add_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Form(form): Form<PageForm>,
) -> Result<Response, AppError> {
    let Some(category) = state.category_service.get_by_slug(&slug).await? else {
        return Ok(Redirect::to("/rango/").into_response());
    };

    let mut errors = form.validate();
    if errors.is_empty() {
        match state
            .page_service
            .create(category.id, &form.title, &form.url)
            .await
        {
            Ok(_) => return Ok(Redirect::to(&category.url()).into_response()),
            Err(PageServiceError::ValidationError { field, message }) => errors.add(field, message),
            Err(PageServiceError::InternalError(e)) => return Err(AppError::Internal(e)),
        }
    }

    Ok(page_form_page(&state, &user, &category, &form, &errors)?.into_response())
}

pub async fn restricted(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    let profile = state.user_service.get_profile(user.id).await?;

    let mut ctx = page_context(Some(&user));
    ctx.insert("profile", &profile);
    render(&state, "rango/restricted.html", &ctx)
}
