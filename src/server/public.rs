use actix_web::http::StatusCode;
use actix_web::http::header::LOCATION;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::AppState;
use crate::db::articles::increment_view_count;
use crate::error::ApiError;
use crate::newsletter::{self, SubscribeError, SubscribeRequest, SubscribeResponse};
use crate::pages;
use crate::redirects;
use crate::workflow::{AnalysisError, AnalysisRequest};

fn client_ip(req: &HttpRequest) -> Option<String> {
    req.peer_addr().map(|addr| addr.ip().to_string())
}

/// A fresh captcha token must pass before the request does any work
async fn require_captcha(
    state: &AppState,
    req: &HttpRequest,
    token: Option<&str>,
) -> Result<(), ApiError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Captcha("reCAPTCHA verification required".to_string()))?;

    let verification = state
        .recaptcha
        .verify(token, client_ip(req).as_deref())
        .await?;
    if !verification.is_accepted() {
        return Err(ApiError::Captcha("reCAPTCHA verification failed".to_string()));
    }
    Ok(())
}

/// Runs one step of the anchor-cloud workflow. Every step crawls, so every
/// step carries its own captcha token.
pub async fn analyze(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<AnalysisRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    require_captcha(&state, &req, request.recaptcha_token.as_deref()).await?;

    info!(url = %request.url, step = ?request.step, "Anchor cloud analysis requested");

    let outcome = tokio::time::timeout(state.analysis_timeout, state.analyzer.run(&request))
        .await
        .map_err(|_| {
            warn!(url = %request.url, "Analysis timed out");
            ApiError::Timeout
        })?;

    match outcome {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(AnalysisError::InvalidRequest(message)) => Err(ApiError::BadRequest(message)),
        Err(AnalysisError::Internal(e)) => {
            tracing::error!(url = %request.url, error = %e, "Analysis failed");
            Ok(HttpResponse::InternalServerError().json(json!({ "error": e.to_string() })))
        }
    }
}

pub async fn newsletter_subscribe(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<SubscribeRequest>,
) -> HttpResponse {
    let result = newsletter::subscribe(
        &state.db,
        &state.recaptcha,
        &body,
        client_ip(&req).as_deref(),
    )
    .await;

    let status = match &result {
        Ok(()) => StatusCode::OK,
        Err(SubscribeError::MissingCaptcha | SubscribeError::InvalidEmail) => StatusCode::BAD_REQUEST,
        Err(SubscribeError::CaptchaRejected) => StatusCode::FORBIDDEN,
        Err(e @ (SubscribeError::CaptchaUnavailable(_) | SubscribeError::Storage(_))) => {
            tracing::error!(error = ?e, "Newsletter subscription failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    HttpResponse::build(status).json(SubscribeResponse {
        success: result.is_ok(),
        error: result.err().map(|e| e.to_string()),
    })
}

pub async fn author(
    state: web::Data<AppState>,
    slug: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let page = pages::author_page(&state.db, &state.site, &slug)
        .ok_or_else(|| ApiError::not_found("Author Not Found"))?;
    Ok(HttpResponse::Ok().json(page))
}

#[derive(Debug, Deserialize)]
pub struct BlogQuery {
    pub category: Option<String>,
}

pub async fn blog_index(
    state: web::Data<AppState>,
    query: web::Query<BlogQuery>,
) -> Result<HttpResponse, ApiError> {
    let index = pages::blog_index(&state.db, &state.site, query.category.as_deref())
        .ok_or_else(|| ApiError::not_found("Category Not Found"))?;
    Ok(HttpResponse::Ok().json(index))
}

pub async fn blog_post(
    state: web::Data<AppState>,
    slug: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let page = pages::blog_post_page(state.cms.as_ref(), &state.db, &state.site, &slug)
        .await
        .ok_or_else(|| ApiError::not_found("Article Not Found"))?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn track_view(
    state: web::Data<AppState>,
    slug: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let views = state
        .db
        .with_conn(|conn| increment_view_count(conn, &slug))?
        .ok_or_else(|| ApiError::not_found("Article Not Found"))?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "views": views })))
}

pub async fn category(
    state: web::Data<AppState>,
    slug: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let page = pages::category_page(&state.db, &state.site, &slug)
        .ok_or_else(|| ApiError::not_found("Category Not Found"))?;
    Ok(HttpResponse::Ok().json(page))
}

/// Unknown paths: a cached redirect when one matches, otherwise 404
pub async fn fallback(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let map = state.redirects.load();
    let Some(target) = redirects::lookup(&map, req.path()) else {
        return Err(ApiError::not_found("Not Found"));
    };

    let status = StatusCode::from_u16(target.status_code).unwrap_or(StatusCode::MOVED_PERMANENTLY);
    tracing::debug!(from = %req.path(), to = %target.to, status = status.as_u16(), "Redirecting");
    Ok(HttpResponse::build(status)
        .insert_header((LOCATION, target.to))
        .finish())
}
