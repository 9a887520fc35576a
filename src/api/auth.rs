// Key checks for the admin API and validator devices.
// Both compare in constant time and never log the expected key.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

pub const VALIDATOR_COOKIE: &str = "validator_key";
pub const VALIDATOR_HEADER: &str = "x-validator-key";
/// Five years, same lifetime the kiosk devices were provisioned with.
pub const VALIDATOR_COOKIE_MAX_AGE: u64 = 60 * 60 * 24 * 365 * 5;

pub fn keys_match(provided: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
}

/// A request comes from a validator device if it carries the validator key
/// in the `validator_key` cookie or the `X-Validator-Key` header.
pub fn is_validator(headers: &HeaderMap, validator_key: &str) -> bool {
    let from_header = headers
        .get(VALIDATOR_HEADER)
        .and_then(|v| v.to_str().ok());
    let from_cookie = cookie_value(headers, VALIDATOR_COOKIE);

    [from_header, from_cookie]
        .into_iter()
        .flatten()
        .any(|k| keys_match(k, validator_key))
}

/// Admin key from `X-Admin-Key` or `Authorization: Bearer`.
pub fn admin_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim())
        })
}

pub fn validator_cookie(key: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        VALIDATOR_COOKIE, key, VALIDATOR_COOKIE_MAX_AGE
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_validator_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", VALIDATOR_COOKIE)
}

/// `abcd…wxyz` for keys longer than 8 characters, `****` otherwise.
pub fn mask_key(k: &str) -> String {
    if k.len() > 8 && k.is_char_boundary(4) && k.is_char_boundary(k.len() - 4) {
        format!("{}…{}", &k[..4], &k[k.len() - 4..])
    } else {
        "****".to_string()
    }
}
