//! Cookie-backed browser capabilities
//!
//! The library's [`Platform`] and [`Horizon`] seams, implemented over the
//! request's cookie jar. Each wrapper starts from a clone of the incoming
//! jar and only its own changes are emitted as `Set-Cookie`, so a handler
//! can return several jars side by side.
//!
//! The cache horizon lives in the participant's `sessionStorage`, which the
//! server cannot read. [`HandOffHorizon`] records what should happen to it
//! and [`hand_off_page`] carries that out in the browser.

use std::time::Duration;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use common::Secret;
use spotify_auth::{
    ACCESS_TOKEN_COOKIE, Horizon, PENDING_AUTH_COOKIE, PENDING_AUTH_MAX_AGE_SECS,
    PendingAuthorization, Platform,
};

/// Path the pending-attempt cookie is scoped to. Covers the login and
/// callback routes and nothing else.
pub const PENDING_AUTH_PATH: &str = "/api/auth";

/// Cookie attributes that depend on deployment.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookiePolicy {
    /// Add `Secure` (production, served over https)
    pub secure: bool,
}

impl CookiePolicy {
    fn build(
        &self,
        name: &'static str,
        value: String,
        path: &'static str,
        max_age: Duration,
    ) -> Cookie<'static> {
        Cookie::build((name, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path(path)
            .max_age(time::Duration::seconds(
                i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX),
            ))
            .build()
    }

    fn removal(&self, name: &'static str, path: &'static str) -> Cookie<'static> {
        Cookie::build((name, "")).path(path).build()
    }
}

/// [`Platform`] over the pending-attempt cookie and an HTTP redirect.
pub struct CookiePlatform {
    jar: CookieJar,
    policy: CookiePolicy,
    location: Option<String>,
}

impl CookiePlatform {
    pub fn new(jar: CookieJar, policy: CookiePolicy) -> Self {
        Self {
            jar,
            policy,
            location: None,
        }
    }

    /// Cookie changes and the last navigation target.
    pub fn into_parts(self) -> (CookieJar, Option<String>) {
        (self.jar, self.location)
    }
}

impl Platform for CookiePlatform {
    fn persist_pending(&mut self, pending: &PendingAuthorization) {
        let cookie = self.policy.build(
            PENDING_AUTH_COOKIE,
            pending.encode(),
            PENDING_AUTH_PATH,
            Duration::from_secs(PENDING_AUTH_MAX_AGE_SECS),
        );
        self.jar = self.jar.clone().add(cookie);
    }

    fn read_pending(&self) -> Option<PendingAuthorization> {
        self.jar
            .get(PENDING_AUTH_COOKIE)
            .and_then(|c| PendingAuthorization::decode(c.value()))
    }

    fn clear_pending(&mut self) {
        let removal = self.policy.removal(PENDING_AUTH_COOKIE, PENDING_AUTH_PATH);
        self.jar = self.jar.clone().remove(removal);
    }

    fn navigate(&mut self, location: &str) {
        self.location = Some(location.to_string());
    }
}

/// Cookie horizon: the httpOnly `spotify_access_token` cookie on `path=/`.
pub struct CookieHorizon {
    jar: CookieJar,
    policy: CookiePolicy,
}

impl CookieHorizon {
    pub fn new(jar: CookieJar, policy: CookiePolicy) -> Self {
        Self { jar, policy }
    }

    pub fn into_jar(self) -> CookieJar {
        self.jar
    }
}

impl Horizon for CookieHorizon {
    fn read(&self, name: &str) -> Option<String> {
        self.jar.get(name).map(|c| c.value().to_string())
    }

    fn write(&mut self, name: &str, value: &str, max_age: Duration) {
        debug_assert_eq!(name, ACCESS_TOKEN_COOKIE);
        let cookie = self
            .policy
            .build(ACCESS_TOKEN_COOKIE, value.to_string(), "/", max_age);
        self.jar = self.jar.clone().add(cookie);
    }

    fn remove(&mut self, name: &str) {
        debug_assert_eq!(name, ACCESS_TOKEN_COOKIE);
        let removal = self.policy.removal(ACCESS_TOKEN_COOKIE, "/");
        self.jar = self.jar.clone().remove(removal);
    }
}

/// Server-side view of the browser's `sessionStorage` cache.
///
/// Reads always miss. Writes and removals are remembered and replayed in
/// the browser by [`hand_off_page`].
#[derive(Debug, Default)]
pub struct HandOffHorizon {
    seed: Option<Secret<String>>,
    cleared: bool,
}

impl HandOffHorizon {
    fn script(&self) -> String {
        let key = js_string(ACCESS_TOKEN_COOKIE);
        match &self.seed {
            Some(token) => format!(
                "sessionStorage.setItem({key}, {});",
                js_string(token.expose())
            ),
            None if self.cleared => format!("sessionStorage.removeItem({key});"),
            None => String::new(),
        }
    }
}

impl Horizon for HandOffHorizon {
    fn read(&self, _name: &str) -> Option<String> {
        None
    }

    fn write(&mut self, _name: &str, value: &str, _max_age: Duration) {
        self.seed = Some(Secret::new(value.to_string()));
    }

    fn remove(&mut self, _name: &str) {
        self.seed = None;
        self.cleared = true;
    }
}

/// Page that applies the hand-off to `sessionStorage`, then replaces the
/// current history entry with `location`. The only place token material
/// appears in page source.
pub fn hand_off_page(hand_off: &HandOffHorizon, location: &str) -> Response {
    let html = format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>Mood Study</title></head>\
         <body><script>{}window.location.replace({});</script></body></html>\n",
        hand_off.script(),
        js_string(location),
    );
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store"),
            (header::REFERRER_POLICY, "no-referrer"),
        ],
        html,
    )
        .into_response()
}

/// JSON string literal that is also safe inside an inline `<script>`.
fn js_string(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| String::from("\"\""))
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    fn jar_with(cookies: &[(&'static str, &str)]) -> CookieJar {
        let mut headers = HeaderMap::new();
        let line = cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        headers.insert(header::COOKIE, line.parse().unwrap());
        CookieJar::from_headers(&headers)
    }

    fn set_cookie_headers(jar: CookieJar) -> Vec<String> {
        let response = (jar, "").into_response();
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    fn pending() -> PendingAuthorization {
        PendingAuthorization {
            verifier: "v".repeat(128),
            state: "s".repeat(32),
        }
    }

    #[test]
    fn pending_cookie_is_scoped_and_short_lived() {
        let mut platform = CookiePlatform::new(CookieJar::new(), CookiePolicy { secure: true });
        platform.persist_pending(&pending());
        let (jar, _) = platform.into_parts();

        let headers = set_cookie_headers(jar);
        assert_eq!(headers.len(), 1);
        let cookie = &headers[0];
        assert!(cookie.starts_with("spotify_pending_auth="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/api/auth"));
        assert!(cookie.contains("Max-Age=600"));
    }

    #[test]
    fn pending_cookie_roundtrips_through_request() {
        let encoded = pending().encode();
        let platform = CookiePlatform::new(
            jar_with(&[(PENDING_AUTH_COOKIE, &encoded)]),
            CookiePolicy::default(),
        );
        assert_eq!(platform.read_pending(), Some(pending()));
    }

    #[test]
    fn garbled_pending_cookie_reads_as_absent() {
        let platform = CookiePlatform::new(
            jar_with(&[(PENDING_AUTH_COOKIE, "garbage")]),
            CookiePolicy::default(),
        );
        assert!(platform.read_pending().is_none());
    }

    #[test]
    fn clearing_existing_pending_cookie_emits_removal() {
        let encoded = pending().encode();
        let mut platform = CookiePlatform::new(
            jar_with(&[(PENDING_AUTH_COOKIE, &encoded)]),
            CookiePolicy::default(),
        );
        platform.clear_pending();
        assert!(platform.read_pending().is_none());

        let (jar, _) = platform.into_parts();
        let headers = set_cookie_headers(jar);
        assert_eq!(headers.len(), 1);
        assert!(headers[0].starts_with("spotify_pending_auth=;"));
        assert!(headers[0].contains("Path=/api/auth"));
    }

    #[test]
    fn token_cookie_attributes() {
        let mut horizon = CookieHorizon::new(CookieJar::new(), CookiePolicy { secure: false });
        horizon.write(ACCESS_TOKEN_COOKIE, "BQD", Duration::from_secs(3600));
        assert_eq!(horizon.read(ACCESS_TOKEN_COOKIE).as_deref(), Some("BQD"));

        let headers = set_cookie_headers(horizon.into_jar());
        let cookie = &headers[0];
        assert!(cookie.starts_with("spotify_access_token=BQD"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=3600"));
    }

    #[test]
    fn hand_off_seeds_cache_and_navigates() {
        let mut hand_off = HandOffHorizon::default();
        hand_off.write(ACCESS_TOKEN_COOKIE, "BQD-token", Duration::from_secs(3600));
        assert!(hand_off.read(ACCESS_TOKEN_COOKIE).is_none());

        let script = hand_off.script();
        assert_eq!(
            script,
            r#"sessionStorage.setItem("spotify_access_token", "BQD-token");"#
        );
    }

    #[test]
    fn hand_off_after_clear_removes_cache_entry() {
        let mut hand_off = HandOffHorizon::default();
        hand_off.remove(ACCESS_TOKEN_COOKIE);
        assert_eq!(
            hand_off.script(),
            r#"sessionStorage.removeItem("spotify_access_token");"#
        );
    }

    #[test]
    fn js_string_cannot_close_the_script_element() {
        let escaped = js_string("</script><script>alert(1)</script>");
        assert!(!escaped.contains('<'));
        assert!(!escaped.contains('>'));
    }

    #[tokio::test]
    async fn hand_off_page_is_not_cached() {
        let response = hand_off_page(&HandOffHorizon::default(), "/mood");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[header::REFERRER_POLICY], "no-referrer");

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains(r#"window.location.replace("/mood");"#));
        assert!(!html.contains("sessionStorage"));
    }
}
