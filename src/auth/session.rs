use actix_web::HttpRequest;
use actix_web::cookie::{Cookie, SameSite, time::Duration};

use super::jwt::SESSION_TTL_SECS;

pub const SESSION_COOKIE: &str = "admin-auth";

/// The session cookie carrying a signed token
pub fn session_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(Duration::seconds(SESSION_TTL_SECS))
        .finish()
}

/// An expired, empty session cookie that makes the browser drop it
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(Duration::ZERO)
        .finish()
}

pub fn session_token(req: &HttpRequest) -> Option<String> {
    req.cookie(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc", true);
        assert_eq!(cookie.name(), "admin-auth");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(86_400)));

        assert_eq!(session_cookie("abc", false).secure(), Some(false));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(false);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }

    #[test]
    fn test_session_token_from_request() {
        let req = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE, "token-value"))
            .to_http_request();
        assert_eq!(session_token(&req).as_deref(), Some("token-value"));

        let req = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE, ""))
            .to_http_request();
        assert!(session_token(&req).is_none());

        assert!(session_token(&TestRequest::default().to_http_request()).is_none());
    }
}
