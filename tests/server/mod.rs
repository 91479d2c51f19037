#![allow(dead_code)]

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn origin(req: &HttpRequest) -> String {
    let info = req.connection_info();
    format!("{}://{}", info.scheme(), info.host())
}

fn html(body: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(format!("<!DOCTYPE html><html>{}</html>", body))
}

fn xml(body: String) -> HttpResponse {
    HttpResponse::Ok().content_type("application/xml").body(body)
}

fn urlset(origin: &str, paths: &[&str]) -> String {
    let urls: String = paths
        .iter()
        .map(|p| format!("<url><loc>{}{}</loc></url>", origin, p))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        urls
    )
}

async fn home() -> HttpResponse {
    html(
        r##"<head><title>Agency Home</title></head><body>
        <a href="/services">SEO services</a>
        <a href="/blog/first#intro">Read more</a>
        <a href="https://partner.example/" rel="nofollow noopener">Partner</a>
        <a href="mailto:hello@example.com">Email us</a>
        <a href="#top">Back to top</a>
        </body>"##,
    )
}

async fn about() -> HttpResponse {
    html(
        r#"<head><title>About</title></head><body>
        <a href="/services">SEO services</a>
        <a href="/"><img src="/logo.png" alt="Agency logo"></a>
        <a href="/contact"></a>
        </body>"#,
    )
}

async fn blog_first() -> HttpResponse {
    html("<head><title>First post</title></head><body><p>No links here.</p></body>")
}

async fn services() -> HttpResponse {
    html(r#"<body><a href="/">Home</a></body>"#)
}

/// Plain text that happens to contain markup
async fn notes() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(r#"Draft: <a href="/services">SEO services</a>"#)
}

/// Answers well after any timeout a test configures
async fn slow() -> HttpResponse {
    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
    html("<body><a href=\"/\">Home</a></body>")
}

async fn robots(req: HttpRequest) -> HttpResponse {
    HttpResponse::Ok().body(format!(
        "User-agent: *\nDisallow: /admin\nSitemap: {}/sitemap-posts.xml\n",
        origin(&req)
    ))
}

async fn sitemap_posts(req: HttpRequest) -> HttpResponse {
    xml(urlset(&origin(&req), &["/", "/about", "/blog/first", "/missing"]))
}

async fn sitemap_index(req: HttpRequest) -> HttpResponse {
    xml(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"><sitemap><loc>{}/sitemap-posts.xml</loc></sitemap></sitemapindex>"#,
        origin(&req)
    ))
}

async fn sitemap_empty(req: HttpRequest) -> HttpResponse {
    xml(urlset(&origin(&req), &[]))
}

fn site_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(home))
        .route("/about", web::get().to(about))
        .route("/blog/first", web::get().to(blog_first))
        .route("/services", web::get().to(services))
        .route("/notes.txt", web::get().to(notes))
        .route("/slow", web::get().to(slow));
}

async fn spawn(server: actix_web::dev::Server) {
    tokio::spawn(async move {
        if let Err(e) = server.await {
            eprintln!("Test server error: {}", e);
        }
    });
}

/// A small site whose robots.txt points at `/sitemap-posts.xml`. The
/// sitemap lists three pages plus `/missing`, which answers 404.
pub async fn start_site_server() -> String {
    let http_server = HttpServer::new(|| {
        App::new()
            .configure(site_routes)
            .route("/robots.txt", web::get().to(robots))
            .route("/sitemap-posts.xml", web::get().to(sitemap_posts))
            .route("/sitemap-index.xml", web::get().to(sitemap_index))
            .route("/sitemap-empty.xml", web::get().to(sitemap_empty))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("Failed to bind test server");

    let addr = http_server
        .addrs()
        .first()
        .cloned()
        .expect("No address bound");

    spawn(http_server.run()).await;
    format!("http://{}", addr)
}

/// The same pages with no robots.txt and no sitemap anywhere
pub async fn start_bare_site_server() -> String {
    let http_server = HttpServer::new(|| App::new().configure(site_routes))
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("Failed to bind test server");

    let addr = http_server
        .addrs()
        .first()
        .cloned()
        .expect("No address bound");

    spawn(http_server.run()).await;
    format!("http://{}", addr)
}

/// Counts every request the fake CMS receives
#[derive(Clone, Default)]
pub struct CmsRequests(Arc<AtomicUsize>);

impl CmsRequests {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

fn story_json(full_slug: &str) -> serde_json::Value {
    serde_json::json!({
        "story": {
            "id": 42,
            "name": "Link building in 2025",
            "slug": "link-building",
            "full_slug": full_slug,
            "published_at": "2025-01-10T09:00:00.000Z",
            "tag_list": ["links"],
            "content": {
                "component": "blog_post",
                "title": "Link building in 2025",
                "excerpt": "What still works.",
                "body": "<p>Earn links.</p>"
            }
        }
    })
}

/// 103 blog posts: a full first page of 100, then 3
async fn list_stories(query: web::Query<std::collections::HashMap<String, String>>) -> HttpResponse {
    const TOTAL: usize = 103;
    let per_page: usize = query
        .get("per_page")
        .and_then(|v| v.parse().ok())
        .unwrap_or(25);
    let page: usize = query.get("page").and_then(|v| v.parse().ok()).unwrap_or(1);

    let start = (page - 1) * per_page;
    let stories: Vec<_> = (start..TOTAL.min(start + per_page))
        .map(|i| {
            serde_json::json!({
                "id": i,
                "name": format!("Post {}", i),
                "slug": format!("post-{}", i),
                "full_slug": format!("blog/post-{}", i),
                "content": { "component": "blog_post", "title": format!("Post {}", i) }
            })
        })
        .collect();

    HttpResponse::Ok().json(serde_json::json!({ "stories": stories }))
}

/// Fake Storyblok delivery API. `blog/link-building` is missing, so the
/// story is only found under the bare slug `link-building`. Requests
/// without `token=test-token` get a 401.
pub async fn start_cms_server() -> (String, CmsRequests) {
    let requests = CmsRequests::default();
    let counter = requests.clone();

    let http_server = HttpServer::new(move || {
        let counter = counter.clone();
        App::new()
            .route("/v2/cdn/stories", web::get().to(list_stories))
            .route(
                "/v2/cdn/stories/{slug:.*}",
                web::get().to(move |req: HttpRequest, slug: web::Path<String>| {
                    let counter = counter.clone();
                    async move {
                        counter.0.fetch_add(1, Ordering::SeqCst);
                        if !req.query_string().contains("token=test-token") {
                            return HttpResponse::Unauthorized().finish();
                        }
                        match slug.as_str() {
                            "link-building" => HttpResponse::Ok().json(story_json("link-building")),
                            "broken" => HttpResponse::InternalServerError().finish(),
                            _ => HttpResponse::NotFound().json(serde_json::json!({})),
                        }
                    }
                }),
            )
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("Failed to bind CMS test server");

    let addr = http_server
        .addrs()
        .first()
        .cloned()
        .expect("No address bound");

    spawn(http_server.run()).await;
    (format!("http://{}/v2", addr), requests)
}

/// Fake reCAPTCHA siteverify endpoint. The response depends on the token:
/// `human` scores 0.9, `bot` scores 0.1, `v2` has no score, `outage`
/// answers 500 and anything else is unsuccessful.
pub async fn start_recaptcha_server() -> String {
    let http_server = HttpServer::new(|| {
        App::new().route(
            "/siteverify",
            web::post().to(|form: web::Form<std::collections::HashMap<String, String>>| async move {
                if form.get("secret").map(String::as_str) != Some("test-secret") {
                    return HttpResponse::Ok().json(serde_json::json!({
                        "success": false,
                        "error-codes": ["invalid-input-secret"]
                    }));
                }
                match form.get("response").map(String::as_str) {
                    Some("human") => HttpResponse::Ok().json(serde_json::json!({
                        "success": true, "score": 0.9, "action": "subscribe"
                    })),
                    Some("bot") => HttpResponse::Ok().json(serde_json::json!({
                        "success": true, "score": 0.1, "action": "subscribe"
                    })),
                    Some("v2") => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
                    Some("outage") => HttpResponse::InternalServerError().finish(),
                    _ => HttpResponse::Ok().json(serde_json::json!({
                        "success": false,
                        "error-codes": ["invalid-input-response"]
                    })),
                }
            }),
        )
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("Failed to bind reCAPTCHA test server");

    let addr = http_server
        .addrs()
        .first()
        .cloned()
        .expect("No address bound");

    spawn(http_server.run()).await;
    format!("http://{}/siteverify", addr)
}
