//! Cache-state cookie handling.

use cookie::{Cookie, SameSite};
use http::header::COOKIE;
use http::HeaderMap;

/// Read the cache token from the request's `cookie` headers.
///
/// HTTP/2 clients may split cookies over several header fields; all are
/// searched. Unparseable pairs are skipped.
pub fn read_token(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

/// `set-cookie` value carrying `token`. An empty token clears the cookie.
pub fn token_cookie(name: &str, token: &str) -> String {
    let mut builder = Cookie::build((name, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    if token.is_empty() {
        builder = builder.max_age(cookie::time::Duration::ZERO);
    }
    builder.build().to_string()
}
