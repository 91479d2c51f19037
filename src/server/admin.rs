use std::future::{Ready, ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, HttpResponse, web};
use anyhow::anyhow;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::AppState;
use crate::auth::session::{clear_session_cookie, session_cookie, session_token};
use crate::auth::{self, PasswordChangeError, SessionClaims};
use crate::db::admin::get_admin_by_id;
use crate::db::articles::{self, ArticleStatus, NewArticle};
use crate::db::authors::{self, NewAuthor};
use crate::db::categories::{self, NewCategory};
use crate::db::redirections::{self, NewRedirection};
use crate::error::ApiError;

/// A request carrying a valid `admin-auth` session cookie
#[derive(Debug, Clone)]
pub struct AdminSession(pub SessionClaims);

impl FromRequest for AdminSession {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AdminSession, ApiError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError::Internal(anyhow!("Application state is not configured")))?;
    let token = session_token(req).ok_or(ApiError::Unauthorized)?;

    state
        .sessions
        .verify_token(&token)
        .map(AdminSession)
        .ok_or(ApiError::Unauthorized)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let Some(user) = auth::validate_admin_credentials(&state.db, &body.email, &body.password) else {
        info!("Rejected admin login");
        return Ok(HttpResponse::Unauthorized().json(json!({ "error": "Invalid email or password" })));
    };

    let token = state
        .sessions
        .create_token(&user)
        .map_err(|e| ApiError::Internal(e.into()))?;
    info!(user_id = user.id, "Admin logged in");

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&token, state.site.is_https()))
        .json(json!({ "success": true, "user": user })))
}

pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(clear_session_cookie(state.site.is_https()))
        .json(json!({ "success": true }))
}

pub async fn session(
    state: web::Data<AppState>,
    AdminSession(claims): AdminSession,
) -> Result<HttpResponse, ApiError> {
    let user = state
        .db
        .with_conn(|conn| get_admin_by_id(conn, claims.user_id))?
        .ok_or(ApiError::Unauthorized)?;
    Ok(HttpResponse::Ok().json(json!({ "authenticated": true, "user": user })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

pub async fn change_password(
    state: web::Data<AppState>,
    AdminSession(claims): AdminSession,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    match auth::change_admin_password(
        &state.db,
        claims.user_id,
        &body.current_password,
        &body.new_password,
    ) {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
        Err(
            e @ (PasswordChangeError::IncorrectCurrentPassword
            | PasswordChangeError::WeakPassword(_)
            | PasswordChangeError::Unchanged),
        ) => Err(ApiError::BadRequest(e.to_string())),
        Err(PasswordChangeError::UserNotFound) => Err(ApiError::Unauthorized),
        Err(PasswordChangeError::Storage(e)) => Err(e.into()),
        Err(PasswordChangeError::Auth(e)) => Err(ApiError::Internal(e.into())),
    }
}

pub async fn list_redirections(
    state: web::Data<AppState>,
    _session: AdminSession,
) -> Result<HttpResponse, ApiError> {
    let redirections = state.db.with_conn(redirections::list_redirections)?;
    Ok(HttpResponse::Ok().json(json!({ "redirections": redirections })))
}

pub async fn save_redirection(
    state: web::Data<AppState>,
    _session: AdminSession,
    body: web::Json<NewRedirection>,
) -> Result<HttpResponse, ApiError> {
    let redirection = state
        .db
        .with_conn(|conn| redirections::upsert_redirection(conn, &body))?;
    let cache_updated = state.refresh_redirects();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "redirection": redirection,
        "cacheUpdated": cache_updated,
    })))
}

pub async fn delete_redirection(
    state: web::Data<AppState>,
    _session: AdminSession,
    id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    if !state
        .db
        .with_conn(|conn| redirections::delete_redirection(conn, id))?
    {
        return Err(ApiError::not_found("Redirection Not Found"));
    }
    let cache_updated = state.refresh_redirects();

    Ok(HttpResponse::Ok().json(json!({ "success": true, "cacheUpdated": cache_updated })))
}

pub async fn create_article(
    state: web::Data<AppState>,
    _session: AdminSession,
    body: web::Json<NewArticle>,
) -> Result<HttpResponse, ApiError> {
    let article = state
        .db
        .with_conn(|conn| articles::create_article(conn, &body))?;
    Ok(HttpResponse::Created().json(article))
}

pub async fn update_article(
    state: web::Data<AppState>,
    _session: AdminSession,
    id: web::Path<i64>,
    body: web::Json<NewArticle>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let article = state
        .db
        .with_conn(|conn| articles::update_article(conn, id, &body))?;
    Ok(HttpResponse::Ok().json(article))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn update_article_status(
    state: web::Data<AppState>,
    _session: AdminSession,
    id: web::Path<i64>,
    body: web::Json<StatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let next: ArticleStatus = body.status.parse()?;
    let id = id.into_inner();
    let article = state
        .db
        .with_conn(|conn| articles::transition_status(conn, id, next))?;
    Ok(HttpResponse::Ok().json(article))
}

pub async fn create_author(
    state: web::Data<AppState>,
    _session: AdminSession,
    body: web::Json<NewAuthor>,
) -> Result<HttpResponse, ApiError> {
    let author = state
        .db
        .with_conn(|conn| authors::create_author(conn, &body))?;
    Ok(HttpResponse::Created().json(author))
}

pub async fn update_author(
    state: web::Data<AppState>,
    _session: AdminSession,
    id: web::Path<i64>,
    body: web::Json<NewAuthor>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let author = state
        .db
        .with_conn(|conn| authors::update_author(conn, id, &body))?;
    Ok(HttpResponse::Ok().json(author))
}

pub async fn create_category(
    state: web::Data<AppState>,
    _session: AdminSession,
    body: web::Json<NewCategory>,
) -> Result<HttpResponse, ApiError> {
    let category = state
        .db
        .with_conn(|conn| categories::create_category(conn, &body))?;
    Ok(HttpResponse::Created().json(category))
}
