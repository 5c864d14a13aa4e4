use axum::http::{header, HeaderMap};
use std::time::Duration;

/// Cookie carrying the bearer token between the browser and the API.
pub const AUTH_COOKIE: &str = "x-auth-token";

/// Extracts the bearer token from the request's `Cookie` headers.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers.get_all(header::COOKIE).iter().find_map(|header| {
        header.to_str().ok()?.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == AUTH_COOKIE).then(|| value.to_string())
        })
    })
}

/// Builds the `Set-Cookie` value for a freshly admitted participant.
///
/// HTTP-only so page scripts never see the credential; the max-age matches
/// the room's remaining lifetime, after which the cookie is as dead as the
/// room it belonged to.
pub fn auth_cookie(token: &str, max_age: Duration) -> String {
    format!(
        "{AUTH_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        max_age.as_secs()
    )
}
