use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use blog_api::uploads::Uploads;
use blog_api::{AppState, AppStateInner, WebConfig, app};
use blog_db::Database;
use blog_db::models::NewPost;

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

const BOUNDARY: &str = "XBOUNDARYX";

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    async fn new() -> Self {
        let dir = std::env::temp_dir().join(format!(
            "blog-routes-{}-{}",
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::SeqCst)
        ));
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            uploads: Uploads::new(dir, "/public/images").await.unwrap(),
        });
        let router = app(state.clone(), &WebConfig::default());
        Self { router, state }
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    /// Registers through the form and returns the session cookie.
    async fn register(&self, login: &str) -> String {
        let response = self
            .post_form(
                "/user/registration",
                &format!("login={}&password=secret", login),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response)
    }

    async fn post_multipart(&self, uri: &str, body: String, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::post(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    fn user_id(&self, name: &str) -> i64 {
        self.state.db.get_user_by_name(name).unwrap().unwrap().id
    }

    fn post(&self, author_id: i64, title: &str) -> i64 {
        self.state
            .db
            .create_post(&NewPost {
                title: title.to_string(),
                content: format!("{} body", title),
                author_id,
                url_key: blog_types::url_key::slugify(title),
                tags: vec![],
                attachment: None,
            })
            .unwrap()
    }

    fn user_count(&self) -> i64 {
        self.state
            .db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM user", [], |r| r.get(0))?))
            .unwrap()
    }
}

fn session_cookie(response: &Response<Body>) -> String {
    let raw = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    raw.split(';').next().unwrap().to_string()
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect")
        .to_str()
        .unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn multipart(boundary: &str, fields: &[(&str, &str)]) -> String {
    multipart_with_file(boundary, fields, None)
}

/// `file` is `(field, file name, content)`.
fn multipart_with_file(boundary: &str, fields: &[(&str, &str)], file: Option<(&str, &str, &str)>) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    if let Some((name, file_name, content)) = file {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
             Content-Type: image/png\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    body
}

#[tokio::test]
async fn registration_creates_one_user_and_redirects_to_cabinet() {
    let app = TestApp::new().await;

    let response = app
        .post_form("/user/registration", "login=nikita&password=secret", None)
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/user");
    assert_eq!(app.user_count(), 1);

    let user = app.state.db.get_user_by_name("nikita").unwrap().unwrap();
    assert!(user.password_hash.starts_with("$argon2"));
    assert!(user.password_hash.contains(&user.password_salt));

    let cabinet = app.get("/user", Some(&session_cookie(&response))).await;
    assert_eq!(cabinet.status(), StatusCode::OK);
    assert!(body_text(cabinet).await.contains("nikita"));
}

#[tokio::test]
async fn registration_rejects_blank_long_and_duplicate_logins() {
    let app = TestApp::new().await;
    app.register("anna").await;

    let blank = app.post_form("/user/registration", "login=&password=x", None).await;
    assert_eq!(blank.status(), StatusCode::OK);
    assert!(body_text(blank).await.contains("Fill in all fields"));

    let long = "a".repeat(33);
    let too_long = app
        .post_form("/user/registration", &format!("login={}&password=x", long), None)
        .await;
    assert!(body_text(too_long).await.contains("at most 32"));

    let taken = app.post_form("/user/registration", "login=anna&password=x", None).await;
    assert_eq!(taken.status(), StatusCode::OK);
    assert!(body_text(taken).await.contains("already taken"));

    assert_eq!(app.user_count(), 1);
}

#[tokio::test]
async fn login_checks_password_and_records_visit() {
    let app = TestApp::new().await;
    app.register("anna").await;

    let wrong = app.post_form("/user/login", "login=anna&password=nope", None).await;
    assert_eq!(wrong.status(), StatusCode::OK);
    assert!(body_text(wrong).await.contains("Wrong login or password"));

    let unknown = app.post_form("/user/login", "login=ghost&password=secret", None).await;
    assert!(body_text(unknown).await.contains("Wrong login or password"));

    let ok = app.post_form("/user/login", "login=anna&password=secret", None).await;
    assert_eq!(ok.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&ok), "/user");

    let id = app.user_id("anna");
    let user = app.state.db.get_user_by_id(id).unwrap().unwrap();
    assert!(user.last_visit_date.is_some());
}

#[tokio::test]
async fn protected_pages_redirect_anonymous_visitors() {
    let app = TestApp::new().await;

    for uri in ["/user", "/posts/builders", "/user/UserEditor", "/user/icons/default"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/user/login", "{uri}");
    }
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new().await;
    let cookie = app.register("anna").await;

    let response = app.get("/user/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/user/login");

    let cabinet = app.get("/user", Some(&cookie)).await;
    assert_eq!(location(&cabinet), "/user/login");
}

#[tokio::test]
async fn missing_post_renders_not_found_page() {
    let app = TestApp::new().await;

    let response = app.get("/posts/999", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Page not found"));

    let by_key = app.get("/no-such-post", None).await;
    assert_eq!(by_key.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn second_page_shows_posts_four_to_six() {
    let app = TestApp::new().await;
    app.register("anna").await;
    let anna = app.user_id("anna");
    for title in ["post-one", "post-two", "post-three", "post-four", "post-five"] {
        app.post(anna, title);
    }

    let page = body_text(app.get("/?page=2", None).await).await;
    assert!(page.contains("post-two"));
    assert!(page.contains("post-one"));
    assert!(!page.contains("post-five"));
    assert!(!page.contains("post-three"));

    let first = body_text(app.get("/posts", None).await).await;
    assert!(first.contains("post-five"));
    assert!(first.contains("post-three"));
    assert!(!first.contains("post-two"));
}

#[tokio::test]
async fn listing_filters_by_search_and_author() {
    let app = TestApp::new().await;
    app.register("anna").await;
    app.register("boris").await;
    let anna = app.user_id("anna");
    let boris = app.user_id("boris");
    app.post(anna, "Rust ownership");
    app.post(boris, "Rust macros");
    app.post(boris, "Cooking pasta");

    let search = body_text(app.get("/posts?search=rust&tag=", None).await).await;
    assert!(search.contains("Rust ownership"));
    assert!(search.contains("Rust macros"));
    assert!(!search.contains("Cooking pasta"));

    let by_boris = body_text(app.get(&format!("/posts?author={}", boris), None).await).await;
    assert!(by_boris.contains("Cooking pasta"));
    assert!(!by_boris.contains("Rust ownership"));
}

#[tokio::test]
async fn creating_a_post_redirects_to_it() {
    let app = TestApp::new().await;
    let cookie = app.register("anna").await;

    let body = multipart(
        BOUNDARY,
        &[
            ("title", "Hello World"),
            ("content", "First post"),
            ("url_key", ""),
            ("tags", "rust, web"),
        ],
    );
    let response = app.post_multipart("/posts", body, Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response).to_string();
    assert!(target.starts_with("/posts/"));

    let page = app.get(&target, None).await;
    assert_eq!(page.status(), StatusCode::OK);
    let page = body_text(page).await;
    assert!(page.contains("Hello World"));
    assert!(page.contains("#rust"));

    let by_key = app.get("/hello-world", None).await;
    assert_eq!(by_key.status(), StatusCode::OK);
}

#[tokio::test]
async fn deleting_a_post_removes_its_comments() {
    let app = TestApp::new().await;
    let cookie = app.register("anna").await;
    let anna = app.user_id("anna");
    let post = app.post(anna, "Doomed");
    app.state.db.create_comment(post, anna, "one", None).unwrap();
    app.state.db.create_comment(post, anna, "two", None).unwrap();

    let confirm = app.get(&format!("/posts/delete/{}", post), Some(&cookie)).await;
    assert_eq!(confirm.status(), StatusCode::OK);

    let response = app
        .post_form("/posts/delete/Deleting", &format!("post_id={}", post), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    assert!(app.state.db.get_post(post).unwrap().is_none());
    assert!(app.state.db.comments_for_post(post).unwrap().is_empty());
}

#[tokio::test]
async fn strangers_cannot_delete_or_edit() {
    let app = TestApp::new().await;
    app.register("anna").await;
    let intruder = app.register("boris").await;
    let anna = app.user_id("anna");
    let post = app.post(anna, "Mine");

    let response = app
        .post_form("/posts/delete/Deleting", &format!("post_id={}", post), Some(&intruder))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(app.state.db.get_post(post).unwrap().is_some());

    let editor = app
        .get(&format!("/user/posts/PostEditor/{}", post), Some(&intruder))
        .await;
    assert_eq!(location(&editor), "/");
}

#[tokio::test]
async fn admins_may_delete_other_peoples_comments() {
    let app = TestApp::new().await;
    app.register("anna").await;
    let admin = app.register("root").await;
    app.state.db.promote_admins(&["root".to_string()]).unwrap();

    let anna = app.user_id("anna");
    let post = app.post(anna, "Post");
    let comment = app.state.db.create_comment(post, anna, "spam", None).unwrap();

    let response = app
        .post_form(
            &format!("/posts/delete/{}/comments/Deleting", post),
            &format!("comment_id={}", comment),
            Some(&admin),
        )
        .await;
    assert_eq!(location(&response), format!("/posts/{}", post));
    assert!(app.state.db.get_comment(comment).unwrap().is_none());
    assert!(app.state.db.get_post(post).unwrap().is_some());
}

#[tokio::test]
async fn authors_edit_their_posts() {
    let app = TestApp::new().await;
    let cookie = app.register("anna").await;
    let anna = app.user_id("anna");
    let post = app.post(anna, "Draft");

    let response = app
        .post_form(
            &format!("/user/posts/PostEditor/{}", post),
            "title=Final&content=Done&tags=news",
            Some(&cookie),
        )
        .await;
    assert_eq!(location(&response), format!("/posts/{}", post));

    let row = app.state.db.get_post(post).unwrap().unwrap();
    assert_eq!(row.title, "Final");
    assert_eq!(app.state.db.tags_for_post(post).unwrap()[0].name, "news");
}

#[tokio::test]
async fn karma_board_ranks_by_post_count() {
    let app = TestApp::new().await;
    app.register("anna").await;
    app.register("boris").await;
    let boris = app.user_id("boris");
    app.post(boris, "one");
    app.post(boris, "two");

    let page = body_text(app.get("/posts/leaders", None).await).await;
    let boris_at = page.find("boris").unwrap();
    let anna_at = page.find("anna").unwrap();
    assert!(boris_at < anna_at);
}

#[tokio::test]
async fn bug_reports_are_stored() {
    let app = TestApp::new().await;

    let response = app
        .post_form("/user/report/debug", "subject=Broken&body=The+pager", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("report was sent"));

    let stored: i64 = app
        .state
        .db
        .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM report", [], |r| r.get(0))?))
        .unwrap();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn unknown_paths_fall_back_to_not_found() {
    let app = TestApp::new().await;
    let response = app.get("/nested/unknown/path", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn huge_page_numbers_render_an_empty_page() {
    let app = TestApp::new().await;
    app.register("anna").await;
    let anna = app.user_id("anna");
    app.post(anna, "only-post");

    let response = app.get("/?page=9223372036854775807", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!body_text(response).await.contains("only-post"));
}

#[tokio::test]
async fn posts_titled_like_routes_stay_reachable() {
    let app = TestApp::new().await;
    app.register("anna").await;
    let anna = app.user_id("anna");
    app.post(anna, "About");

    let listing = body_text(app.get("/posts", None).await).await;
    assert!(listing.contains("href=\"/about-2\""));

    let by_key = app.get("/about-2", None).await;
    assert_eq!(by_key.status(), StatusCode::OK);
    assert!(body_text(by_key).await.contains("About body"));

    let about = body_text(app.get("/about", None).await).await;
    assert!(!about.contains("About body"));
}

#[tokio::test]
async fn malformed_ids_render_not_found_page() {
    let app = TestApp::new().await;
    let cookie = app.register("anna").await;

    let response = app.get("/posts/abc", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Page not found"));

    for uri in [
        "/posts/delete/abc",
        "/user/posts/PostEditor/1x",
        "/posts/delete/1/comments/nope",
        "/user/posts/CommentEditor/one/2",
    ] {
        let response = app.get(uri, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn comments_are_posted_with_attachments() {
    let app = TestApp::new().await;
    let cookie = app.register("anna").await;
    let anna = app.user_id("anna");
    let post = app.post(anna, "Pictures");
    let uri = format!("/posts/{}/comments", post);

    let body = multipart_with_file(
        BOUNDARY,
        &[("content", "Look at this")],
        Some(("avatar", "shot.png", "not really a png")),
    );
    let response = app.post_multipart(&uri, body, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let comments = app.state.db.comments_for_post(post).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].content, "Look at this");
    assert_eq!(location(&response), format!("/posts/{}#comment-{}", post, comments[0].id));

    let files = app.state.db.comment_attachments(post).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].owner_id, comments[0].id);
    assert!(files[0].name.starts_with("/public/images/"));
    assert!(files[0].name.ends_with("_shot.png"));

    let page = body_text(app.get(&format!("/posts/{}", post), None).await).await;
    assert!(page.contains("Look at this"));
    assert!(page.contains(&files[0].name));

    let anonymous = app
        .post_multipart(&uri, multipart(BOUNDARY, &[("content", "drive-by")]), None)
        .await;
    assert_eq!(location(&anonymous), "/user/login");
    assert_eq!(app.state.db.comments_for_post(post).unwrap().len(), 1);

    let missing = app
        .post_multipart("/posts/999/comments", multipart(BOUNDARY, &[("content", "x")]), Some(&cookie))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_update_renames_and_rehashes() {
    let app = TestApp::new().await;
    let cookie = app.register("anna").await;
    let id = app.user_id("anna");
    let old_hash = app.state.db.get_user_by_id(id).unwrap().unwrap().password_hash;

    let body = multipart(
        BOUNDARY,
        &[("name", "anna2"), ("password", "fresh"), ("moto", "hello there")],
    );
    let response = app.post_multipart("/user/UserEditor/debug", body, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/user");

    let user = app.state.db.get_user_by_id(id).unwrap().unwrap();
    assert_eq!(user.name, "anna2");
    assert_eq!(user.moto, "hello there");
    assert_ne!(user.password_hash, old_hash);
    assert!(app.state.db.get_user_by_name("anna").unwrap().is_none());

    // The header reads the name from the session.
    let about = body_text(app.get("/about", Some(&cookie)).await).await;
    assert!(about.contains("<a href=\"/user\">anna2</a>"));

    let old = app.post_form("/user/login", "login=anna2&password=secret", None).await;
    assert!(body_text(old).await.contains("Wrong login or password"));
    let new = app.post_form("/user/login", "login=anna2&password=fresh", None).await;
    assert_eq!(location(&new), "/user");
}

#[tokio::test]
async fn profile_update_keeps_names_unique() {
    let app = TestApp::new().await;
    app.register("boris").await;
    let cookie = app.register("anna").await;

    let body = multipart(BOUNDARY, &[("name", "boris")]);
    let response = app.post_multipart("/user/UserEditor/debug", body, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("already taken"));
    assert!(app.state.db.get_user_by_name("anna").unwrap().is_some());
}

#[tokio::test]
async fn only_default_icons_can_be_picked() {
    let app = TestApp::new().await;
    app.register("boris").await;
    let cookie = app.register("anna").await;
    let anna = app.user_id("anna");
    let boris = app.user_id("boris");

    let cat = app.state.db.default_icons().unwrap()[1].clone();
    let response = app
        .post_form("/user/icons/debug", &format!("icon_id={}", cat.id), Some(&cookie))
        .await;
    assert_eq!(location(&response), "/user");
    assert_eq!(app.state.db.user_icon(anna).unwrap().unwrap().id, cat.id);

    let private = app.state.db.add_user_icon(boris, "/public/images/boris.png").unwrap();
    let response = app
        .post_form("/user/icons/debug", &format!("icon_id={}", private), Some(&cookie))
        .await;
    assert_eq!(location(&response), "/");
    assert_eq!(app.state.db.user_icon(anna).unwrap().unwrap().id, cat.id);
}

#[tokio::test]
async fn admin_panel_is_for_admins_only() {
    let app = TestApp::new().await;
    let user = app.register("anna").await;
    let admin = app.register("root").await;
    app.state.db.promote_admins(&["root".to_string()]).unwrap();
    app.post_form("/user/report/debug", "subject=Pager+broken&body=Page+two", Some(&user))
        .await;

    let anonymous = app.get("/admin", None).await;
    assert_eq!(location(&anonymous), "/user/login");

    let regular = app.get("/admin", Some(&user)).await;
    assert_eq!(location(&regular), "/");

    let panel = app.get("/admin", Some(&admin)).await;
    assert_eq!(panel.status(), StatusCode::OK);
    let panel = body_text(panel).await;
    assert!(panel.contains("Pager broken"));
    assert!(panel.contains("anna"));
}
