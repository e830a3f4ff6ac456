//! Account profile and session-cookie identity helpers

use serde::{Deserialize, Serialize};

/// Account profile returned by `GET /api/auth/me`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountProfile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    /// Stable account identifier (`user_...`).
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Derive the dashboard user id from the session cookie.
///
/// The cookie value is URL-encoded `name=<id>::<token>`; the id is the
/// right-hand side of the first `=`, up to the `::` separator.
pub fn user_id_from_cookie(cookie: &str) -> Option<String> {
    let decoded = percent_decode(cookie);
    let (_, value) = decoded.split_once('=')?;
    let id = value.split("::").next().unwrap_or(value).trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Minimal percent-decoding for cookie values (`%3A` -> `:` etc.).
/// Invalid escapes pass through untouched.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = &input[i + 1..i + 3];
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_from_plain_cookie() {
        assert_eq!(
            user_id_from_cookie("WorkosCursorSessionToken=user_123::eyJhbGci"),
            Some("user_123".to_string())
        );
    }

    #[test]
    fn test_user_id_from_encoded_cookie() {
        assert_eq!(
            user_id_from_cookie("WorkosCursorSessionToken=user_123%3A%3AeyJhbGci"),
            Some("user_123".to_string())
        );
    }

    #[test]
    fn test_user_id_missing_separator() {
        assert_eq!(user_id_from_cookie("no-equals-here"), None);
        assert_eq!(user_id_from_cookie("token="), None);
        assert_eq!(user_id_from_cookie(""), None);
    }

    #[test]
    fn test_percent_decode_passes_invalid_escapes() {
        assert_eq!(percent_decode("a%zzb"), "a%zzb");
        assert_eq!(percent_decode("trailing%2"), "trailing%2");
        assert_eq!(percent_decode("%3D"), "=");
    }

    #[test]
    fn test_account_profile_parses_auth_me_body() {
        let body = r#"{
            "email": "user@example.com",
            "email_verified": true,
            "name": "",
            "sub": "user_xxxxxxxxxxxxxxxxxxxxxxxxxx",
            "updated_at": "2024-01-01T01:02:03.000Z",
            "picture": null
        }"#;
        let profile: AccountProfile = serde_json::from_str(body).unwrap();
        assert_eq!(profile.email.as_deref(), Some("user@example.com"));
        assert_eq!(profile.sub.as_deref(), Some("user_xxxxxxxxxxxxxxxxxxxxxxxxxx"));
        assert!(profile.picture.is_none());
    }
}
