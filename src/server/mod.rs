//! The actix-web application: public API, admin API and redirect fallback.

mod admin;
mod public;

use std::time::Duration;

use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};
use tracing::info;

use crate::auth::{self, JwtSessions};
use crate::cms::StoryblokClient;
use crate::config::{AuthEnv, Settings, SiteSettings};
use crate::db::{Database, seed};
use crate::error::ApiError;
use crate::recaptcha::RecaptchaVerifier;
use crate::redirects::RedirectionCache;
use crate::workflow::Analyzer;

pub use admin::AdminSession;

/// Everything request handlers share. Built once at startup and handed to
/// actix as `web::Data`.
pub struct AppState {
    pub db: Database,
    pub sessions: JwtSessions,
    pub redirects: RedirectionCache,
    pub analyzer: Analyzer,
    pub cms: Option<StoryblokClient>,
    pub recaptcha: RecaptchaVerifier,
    pub site: SiteSettings,
    pub analysis_timeout: Duration,
}

impl AppState {
    pub fn new(db: Database, settings: &Settings, jwt_secret: &str) -> Result<Self> {
        Ok(Self {
            db,
            sessions: JwtSessions::new(jwt_secret),
            redirects: RedirectionCache::new(&settings.redirects_cache_path),
            analyzer: Analyzer::new(settings.analyzer.clone())?,
            cms: StoryblokClient::from_settings(&settings.storyblok)?,
            recaptcha: RecaptchaVerifier::new(&settings.recaptcha)?,
            site: settings.site.clone(),
            analysis_timeout: Duration::from_secs(settings.analyzer.analysis_timeout_secs),
        })
    }

    /// Opens the database, creates the admin account and default content
    /// when missing, and refreshes the redirection cache
    pub fn bootstrap(settings: &Settings, auth_env: &AuthEnv) -> Result<Self> {
        let db = Database::open(&settings.database_path).with_context(|| {
            format!("Failed to open database {}", settings.database_path.display())
        })?;

        auth::ensure_admin_user(&db, auth_env).context("Failed to create admin user")?;
        db.with_conn(seed::seed_defaults)
            .context("Failed to seed default content")?;

        let state = Self::new(db, settings, &auth_env.jwt_secret)?;
        state.redirects.update(&state.db)?;
        Ok(state)
    }

    /// Rewrites the redirection cache after an admin change. A failure is
    /// logged; the database write already succeeded.
    pub(crate) fn refresh_redirects(&self) -> bool {
        match self.redirects.update(&self.db) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to refresh redirection cache");
                false
            }
        }
    }
}

/// Registers every route plus the redirect fallback
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .route("/anchor-cloud-analyzer", web::post().to(public::analyze))
            .route("/newsletter-subscribe", web::post().to(public::newsletter_subscribe))
            .route("/authors/{slug}", web::get().to(public::author))
            .route("/blog", web::get().to(public::blog_index))
            .route("/blog/{slug}", web::get().to(public::blog_post))
            .route("/blog/{slug}/view", web::post().to(public::track_view))
            .route("/categories/{slug}", web::get().to(public::category))
            .service(
                web::scope("/admin")
                    .route("/login", web::post().to(admin::login))
                    .route("/logout", web::post().to(admin::logout))
                    .route("/session", web::get().to(admin::session))
                    .route("/change-password", web::post().to(admin::change_password))
                    .route("/redirections", web::get().to(admin::list_redirections))
                    .route("/redirections", web::post().to(admin::save_redirection))
                    .route("/redirections/{id}", web::delete().to(admin::delete_redirection))
                    .route("/articles", web::post().to(admin::create_article))
                    .route("/articles/{id}", web::put().to(admin::update_article))
                    .route("/articles/{id}/status", web::put().to(admin::update_article_status))
                    .route("/authors", web::post().to(admin::create_author))
                    .route("/authors/{id}", web::put().to(admin::update_author))
                    .route("/categories", web::post().to(admin::create_category)),
            ),
    )
    .default_service(web::to(public::fallback));
}

pub async fn run_server(state: AppState, host: &str, port: u16) -> Result<()> {
    let state = web::Data::new(state);

    let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
        .bind((host, port))
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;

    for addr in server.addrs() {
        info!(%addr, "Listening");
    }

    server.run().await.context("Server error")?;
    Ok(())
}
