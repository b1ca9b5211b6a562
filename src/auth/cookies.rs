use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

pub const ACCESS_COOKIE_NAME: &str = "accessToken";
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Cookie attributes shared by both token cookies.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    pub secure: bool,
    pub access_max_age: Duration,
    pub refresh_max_age: Duration,
}

/// Token values read from an incoming request.
#[derive(Debug, Default, Clone)]
pub struct TokenCookies {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

fn token_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .path("/")
        .max_age(max_age)
        .build()
}

pub fn emit_token_pair(
    jar: CookieJar,
    settings: &CookieSettings,
    access: String,
    refresh: String,
) -> CookieJar {
    let jar = emit_access_only(jar, settings, access);
    jar.add(token_cookie(
        REFRESH_COOKIE_NAME,
        refresh,
        settings.refresh_max_age,
        settings.secure,
    ))
}

pub fn emit_access_only(jar: CookieJar, settings: &CookieSettings, access: String) -> CookieJar {
    jar.add(token_cookie(
        ACCESS_COOKIE_NAME,
        access,
        settings.access_max_age,
        settings.secure,
    ))
}

pub fn extract(jar: &CookieJar) -> TokenCookies {
    let value = |name: &str| {
        jar.get(name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    };
    TokenCookies {
        access: value(ACCESS_COOKIE_NAME),
        refresh: value(REFRESH_COOKIE_NAME),
    }
}

pub fn clear(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE_NAME).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE_NAME).path("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, response::IntoResponse};

    fn settings(secure: bool) -> CookieSettings {
        CookieSettings {
            secure,
            access_max_age: Duration::seconds(900),
            refresh_max_age: Duration::seconds(2_592_000),
        }
    }

    fn set_cookie_headers(jar: CookieJar) -> Vec<String> {
        let res = jar.into_response();
        res.headers()
            .get_all(axum::http::header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn token_pair_cookies_carry_security_attributes() {
        let jar = emit_token_pair(CookieJar::new(), &settings(false), "a".into(), "r".into());
        let headers = set_cookie_headers(jar);
        assert_eq!(headers.len(), 2);
        let access = headers.iter().find(|h| h.starts_with("accessToken=a")).unwrap();
        let refresh = headers.iter().find(|h| h.starts_with("refreshToken=r")).unwrap();
        for h in [access, refresh] {
            assert!(h.contains("HttpOnly"));
            assert!(h.contains("SameSite=Strict"));
            assert!(!h.contains("Secure"));
        }
        assert!(access.contains("Max-Age=900"));
        assert!(refresh.contains("Max-Age=2592000"));
    }

    #[test]
    fn production_cookies_are_secure() {
        let jar = emit_access_only(CookieJar::new(), &settings(true), "a".into());
        let headers = set_cookie_headers(jar);
        assert_eq!(headers.len(), 1);
        assert!(headers[0].contains("Secure"));
    }

    #[test]
    fn extract_reads_both_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            "accessToken=aaa; refreshToken=rrr; other=x".parse().unwrap(),
        );
        let tokens = extract(&CookieJar::from_headers(&headers));
        assert_eq!(tokens.access.as_deref(), Some("aaa"));
        assert_eq!(tokens.refresh.as_deref(), Some("rrr"));

        let empty = extract(&CookieJar::new());
        assert!(empty.access.is_none() && empty.refresh.is_none());
    }

    #[test]
    fn clear_expires_both_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            "accessToken=aaa; refreshToken=rrr".parse().unwrap(),
        );
        let jar = clear(CookieJar::from_headers(&headers));
        let out = set_cookie_headers(jar);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|h| h.contains("Max-Age=0")));
    }
}
