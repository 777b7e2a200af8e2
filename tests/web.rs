//! End-to-end HTTP tests against the full router

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use chrono::{Duration, Local};
use tempfile::TempDir;

use rango::config::Config;
use rango::db::{create_test_pool, migrations};
use rango::models::SessionData;
use rango::services::visits::format_timestamp;
use rango::services::RegisterInput;
use rango::web::{build_router, AppState};

struct TestApp {
    server: TestServer,
    state: AppState,
    media: TempDir,
}

async fn spawn_app() -> TestApp {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let media = TempDir::new().unwrap();
    let mut config = Config::default();
    config.media.path = media.path().to_path_buf();

    let state = AppState::new(pool, &config).unwrap();
    let server = TestServer::builder()
        .save_cookies()
        .build(build_router(state.clone()))
        .unwrap();

    TestApp {
        server,
        state,
        media,
    }
}

fn location(response: &TestResponse) -> String {
    response.header("location").to_str().unwrap().to_string()
}

impl TestApp {
    async fn create_user(&self, username: &str, password: &str) -> i64 {
        let (user, _) = self
            .state
            .user_service
            .register(RegisterInput::new(username, "", password))
            .await
            .unwrap();
        user.id
    }

    async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.server
            .post("/rango/login/")
            .form(&[("username", username), ("password", password)])
            .await
    }

    async fn logged_in(username: &str) -> Self {
        let app = spawn_app().await;
        app.create_user(username, "secret").await;
        let response = app.login(username, "secret").await;
        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
        app
    }
}

#[tokio::test]
async fn test_root_redirects_to_index() {
    let app = spawn_app().await;

    let response = app.server.get("/").await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/rango/");
}

#[tokio::test]
async fn test_index_on_empty_database() {
    let app = spawn_app().await;

    let response = app.server.get("/rango/").await;

    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains("Crunchy, creamy, cookie, candy, cupcake!"));
    assert!(html.contains("There are no categories present."));
    assert!(html.contains("There are no pages present."));
    assert!(html.contains("hey there partner!"));
    assert!(html.contains("Visits: 1"));
}

#[tokio::test]
async fn test_visits_do_not_increase_within_a_day() {
    let app = spawn_app().await;

    app.server.get("/rango/").await.assert_status_ok();
    app.server.get("/rango/about/").await.assert_status_ok();
    let response = app.server.get("/rango/").await;

    assert!(response.text().contains("Visits: 1"));
}

#[tokio::test]
async fn test_visits_increase_after_a_day() {
    let app = spawn_app().await;

    let first = app.server.get("/rango/about/").await;
    assert!(first.text().contains("Visits: 1"));
    let session_id = first.cookie("sessionid").value().to_string();

    // Pretend the last visit happened two days ago
    let mut session = app
        .state
        .session_service
        .load(&session_id)
        .await
        .unwrap()
        .unwrap();
    session.set(
        "last_visit",
        format_timestamp((Local::now() - Duration::days(2)).naive_local()),
    );
    app.state.session_service.save(&mut session).await.unwrap();

    let second = app.server.get("/rango/about/").await;
    assert!(second.text().contains("Visits: 2"));

    let third = app.server.get("/rango/").await;
    assert!(third.text().contains("Visits: 2"));
}

#[tokio::test]
async fn test_malformed_visit_state_is_reset() {
    let app = spawn_app().await;

    let first = app.server.get("/rango/").await;
    let session_id = first.cookie("sessionid").value().to_string();

    let mut session = app
        .state
        .session_service
        .load(&session_id)
        .await
        .unwrap()
        .unwrap();
    session.set("visits", "lots".to_string());
    app.state.session_service.save(&mut session).await.unwrap();

    let response = app.server.get("/rango/").await;
    response.assert_status_ok();
    assert!(response.text().contains("Visits: 1"));
}

#[tokio::test]
async fn test_index_lists_top_categories_and_pages() {
    let app = spawn_app().await;
    let categories = &app.state.category_service;
    let pages = &app.state.page_service;

    for (i, name) in ["A", "B", "C", "D", "E", "F"].iter().enumerate() {
        let category = categories.create(name).await.unwrap();
        categories
            .set_counters(category.id, 0, i as i64)
            .await
            .unwrap();
        let page = pages
            .create(category.id, &format!("Page {}", name), "example.com")
            .await
            .unwrap();
        pages.set_views(page.id, i as i64).await.unwrap();
    }

    let html = app.server.get("/rango/").await.text();

    assert!(html.contains("/rango/category/f/"));
    assert!(html.contains("/rango/category/b/"));
    assert!(!html.contains("/rango/category/a/"));
    assert!(html.contains("Page F"));
    assert!(!html.contains("Page A"));
    assert!(html.find("/rango/category/f/").unwrap() < html.find("/rango/category/e/").unwrap());
}

#[tokio::test]
async fn test_index_links_top_pages_to_their_category() {
    let app = spawn_app().await;
    let categories = &app.state.category_service;
    let pages = &app.state.page_service;

    let mut quiet = None;
    for (i, name) in ["Quiet", "B", "C", "D", "E", "F"].iter().enumerate() {
        let category = categories.create(name).await.unwrap();
        categories
            .set_counters(category.id, 0, i as i64)
            .await
            .unwrap();
        quiet.get_or_insert(category);
    }
    let quiet = quiet.unwrap();
    let page = pages
        .create(quiet.id, "Hidden Gem", "example.com")
        .await
        .unwrap();
    pages.set_views(page.id, 99).await.unwrap();

    let html = app.server.get("/rango/").await.text();

    assert!(html.contains("Hidden Gem"));
    assert!(html.contains(r#"in <a href="/rango/category/quiet/">Quiet</a>"#));
}

#[tokio::test]
async fn test_show_category() {
    let app = spawn_app().await;
    let category = app.state.category_service.create("Python").await.unwrap();
    app.state
        .page_service
        .create(category.id, "Official Tutorial", "docs.python.org")
        .await
        .unwrap();

    let response = app.server.get("/rango/category/python/").await;

    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains("<h1>Python</h1>"));
    assert!(html.contains("docs.python.org"));
    assert!(!html.contains("Add Page"));
}

#[tokio::test]
async fn test_show_unknown_category() {
    let app = spawn_app().await;

    let response = app.server.get("/rango/category/nothing-here/").await;

    response.assert_status_ok();
    assert!(response.text().contains("The specified category does not exist."));
}

#[tokio::test]
async fn test_login_required_redirects_with_next() {
    let app = spawn_app().await;

    for path in [
        "/rango/restricted/",
        "/rango/add_category/",
        "/rango/logout/",
        "/rango/category/python/add_page/",
    ] {
        let response = app.server.get(path).await;
        assert_eq!(response.status_code(), StatusCode::SEE_OTHER, "{}", path);
        assert_eq!(
            location(&response),
            format!("/rango/login/?next={}", urlencoding::encode(path))
        );
    }
}

#[tokio::test]
async fn test_login_page_keeps_next() {
    let app = spawn_app().await;

    let response = app.server.get("/rango/login/?next=/rango/restricted/").await;

    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains(r#"name="next" value=""#));
    assert!(html.contains("restricted"));
}

#[tokio::test]
async fn test_login_with_bad_credentials() {
    let app = spawn_app().await;
    app.create_user("leifos", "secret").await;

    let wrong_password = app.login("leifos", "nope").await;
    wrong_password.assert_status_ok();
    assert_eq!(wrong_password.text(), "Invalid login details supplied.");

    let unknown_user = app.login("nobody", "secret").await;
    assert_eq!(unknown_user.text(), "Invalid login details supplied.");
}

#[tokio::test]
async fn test_login_with_disabled_account() {
    let app = spawn_app().await;
    let id = app.create_user("leifos", "secret").await;
    app.state.user_service.set_active(id, false).await.unwrap();

    let response = app.login("leifos", "secret").await;

    response.assert_status_ok();
    assert_eq!(response.text(), "Your Rango account is disabled.");
    let restricted = app.server.get("/rango/restricted/").await;
    assert_eq!(restricted.status_code(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_login_and_restricted() {
    let app = TestApp::logged_in("leifos").await;

    let restricted = app.server.get("/rango/restricted/").await;
    restricted.assert_status_ok();
    assert!(restricted.text().contains("Since you're logged in"));

    let index = app.server.get("/rango/").await.text();
    assert!(index.contains("howdy leifos!"));
    assert!(index.contains("/rango/logout/"));
}

#[tokio::test]
async fn test_login_redirects_to_next() {
    let app = spawn_app().await;
    app.create_user("leifos", "secret").await;

    let response = app
        .server
        .post("/rango/login/")
        .form(&[
            ("username", "leifos"),
            ("password", "secret"),
            ("next", "/rango/add_category/"),
        ])
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/rango/add_category/");
}

#[tokio::test]
async fn test_login_with_unusable_next_goes_to_index() {
    let app = spawn_app().await;
    app.create_user("leifos", "secret").await;

    let response = app
        .server
        .post("/rango/login/")
        .form(&[
            ("username", "leifos"),
            ("password", "secret"),
            ("next", "/rango/\nX"),
        ])
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/rango/");

    let restricted = app.server.get("/rango/restricted/").await;
    assert_eq!(restricted.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_keeps_visit_count() {
    let app = spawn_app().await;
    app.create_user("leifos", "secret").await;

    let before = app.server.get("/rango/").await;
    let anonymous_id = before.cookie("sessionid").value().to_string();

    let login = app.login("leifos", "secret").await;
    let logged_in_id = login.cookie("sessionid").value().to_string();
    assert_ne!(anonymous_id, logged_in_id);

    assert!(app.server.get("/rango/").await.text().contains("Visits: 1"));
    assert!(app
        .state
        .session_service
        .load(&anonymous_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_logout() {
    let app = TestApp::logged_in("leifos").await;

    let response = app.server.get("/rango/logout/").await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/rango/");

    let restricted = app.server.get("/rango/restricted/").await;
    assert_eq!(restricted.status_code(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_add_category() {
    let app = TestApp::logged_in("leifos").await;

    let form = app.server.get("/rango/add_category/").await;
    form.assert_status_ok();
    assert!(form.text().contains("category_form"));

    let response = app
        .server
        .post("/rango/add_category/")
        .form(&[("name", "Other Frameworks")])
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/rango/");

    let category = app
        .state
        .category_service
        .get_by_slug("other-frameworks")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(category.views, 0);
    assert_eq!(category.likes, 0);
}

#[tokio::test]
async fn test_add_category_rejects_duplicates_and_blanks() {
    let app = TestApp::logged_in("leifos").await;
    app.state.category_service.create("Python").await.unwrap();

    let duplicate = app
        .server
        .post("/rango/add_category/")
        .form(&[("name", "python")])
        .await;
    duplicate.assert_status_ok();
    let html = duplicate.text();
    assert!(html.contains("Category with this Name already exists."));
    assert!(html.contains(r#"value="python""#));

    let blank = app
        .server
        .post("/rango/add_category/")
        .form(&[("name", "   ")])
        .await;
    blank.assert_status_ok();
    assert!(blank.text().contains("This field is required."));
}

#[tokio::test]
async fn test_add_page() {
    let app = TestApp::logged_in("leifos").await;
    let category = app.state.category_service.create("Python").await.unwrap();

    let form = app.server.get("/rango/category/python/add_page/").await;
    form.assert_status_ok();
    assert!(form.text().contains("Add a Page to Python"));

    let response = app
        .server
        .post("/rango/category/python/add_page/")
        .form(&[("title", "Official Tutorial"), ("url", "docs.python.org/3/tutorial/")])
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/rango/category/python/");

    let pages = app
        .state
        .page_service
        .list_by_category(category.id)
        .await
        .unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].views, 0);
    assert_eq!(pages[0].url, "http://docs.python.org/3/tutorial/");

    let html = app.server.get("/rango/category/python/").await.text();
    assert!(html.contains("Official Tutorial"));
    assert!(html.contains("Add Page"));
}

#[tokio::test]
async fn test_add_page_invalid_form_rerenders() {
    let app = TestApp::logged_in("leifos").await;
    app.state.category_service.create("Python").await.unwrap();

    let response = app
        .server
        .post("/rango/category/python/add_page/")
        .form(&[("title", "Only a title"), ("url", "")])
        .await;

    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains("This field is required."));
    assert!(html.contains(r#"value="Only a title""#));
}

#[tokio::test]
async fn test_add_page_to_unknown_category_redirects() {
    let app = TestApp::logged_in("leifos").await;

    let get = app.server.get("/rango/category/missing/add_page/").await;
    assert_eq!(get.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&get), "/rango/");

    let post = app
        .server
        .post("/rango/category/missing/add_page/")
        .form(&[("title", "t"), ("url", "example.com")])
        .await;
    assert_eq!(post.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&post), "/rango/");
}

#[tokio::test]
async fn test_register_with_picture() {
    let app = spawn_app().await;

    let form = app.server.get("/rango/register/").await;
    form.assert_status_ok();
    assert!(form.text().contains("register here!"));

    let multipart = MultipartForm::new()
        .add_text("username", "leifos")
        .add_text("email", "leifos@example.com")
        .add_text("password", "secret")
        .add_text("website", "www.tangowithdjango.com")
        .add_part(
            "picture",
            Part::bytes(b"\x89PNG fake".to_vec())
                .file_name("me.png")
                .mime_type("image/png"),
        );
    let response = app.server.post("/rango/register/").multipart(multipart).await;

    response.assert_status_ok();
    assert!(response.text().contains("thank you for registering!"));

    let user = app.state.user_service.authenticate("leifos", "secret").await.unwrap().unwrap();
    let profile = app.state.user_service.get_profile(user.id).await.unwrap().unwrap();
    assert_eq!(profile.website.as_deref(), Some("http://www.tangowithdjango.com"));
    let picture = profile.picture.unwrap();
    assert!(picture.starts_with("profile_images/"));
    assert!(app.media.path().join(&picture).exists());

    let served = app.server.get(&format!("/media/{}", picture)).await;
    served.assert_status_ok();
    assert_eq!(served.as_bytes().as_ref(), b"\x89PNG fake");

    app.login("leifos", "secret").await;
    let restricted = app.server.get("/rango/restricted/").await.text();
    assert!(restricted.contains("tangowithdjango.com"));
    assert!(restricted.contains("profile_images"));
}

#[tokio::test]
async fn test_register_without_picture_then_login() {
    let app = spawn_app().await;

    let multipart = MultipartForm::new()
        .add_text("username", "leifos")
        .add_text("email", "")
        .add_text("password", "secret")
        .add_text("website", "")
        .add_part("picture", Part::bytes(Vec::new()).file_name(""));
    let response = app.server.post("/rango/register/").multipart(multipart).await;

    assert!(response.text().contains("thank you for registering!"));
    let login = app.login("leifos", "secret").await;
    assert_eq!(login.status_code(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_register_errors_rerender_form() {
    let app = spawn_app().await;
    app.create_user("taken", "secret").await;

    let multipart = MultipartForm::new()
        .add_text("username", "taken")
        .add_text("password", "secret");
    let duplicate = app.server.post("/rango/register/").multipart(multipart).await;
    duplicate.assert_status_ok();
    let html = duplicate.text();
    assert!(html.contains("A user with that username already exists."));
    assert!(html.contains("register here!"));

    let multipart = MultipartForm::new()
        .add_text("username", "new user!")
        .add_text("password", "")
        .add_part(
            "picture",
            Part::bytes(b"hello".to_vec())
                .file_name("notes.txt")
                .mime_type("text/plain"),
        );
    let invalid = app.server.post("/rango/register/").multipart(multipart).await;
    let html = invalid.text();
    assert!(html.contains("Enter a valid username."));
    assert!(html.contains("This field is required."));
    assert!(html.contains("Upload a valid image."));
    assert!(!app.media.path().join("profile_images").exists());
}

#[tokio::test]
async fn test_unknown_path_renders_error_page() {
    let app = spawn_app().await;

    let response = app.server.get("/rango/nowhere/").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let html = response.text();
    assert!(html.contains("<h1>404</h1>"));
    assert!(html.contains("The requested page could not be found."));
}
