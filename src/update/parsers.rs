//! Version extraction from remote update manifests
//!
//! The update source has changed shape over time: a line-oriented manifest
//! with a `version:` field, a JSON body whose `downloadUrl` embeds the
//! version in the filename, and a JSON body with a top-level `version`.
//! Each shape gets its own strategy; the first one that yields wins.

use regex_lite::Regex;
use std::sync::LazyLock;

static DOWNLOAD_URL_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Cursor-([0-9]+\.[0-9]+\.[0-9]+)").expect("static pattern")
});

/// Run the strategy chain over a response body.
pub fn extract_version(body: &str) -> Option<String> {
    json_version(body)
        .or_else(|| download_url_version(body))
        .or_else(|| manifest_version(body))
}

/// Top-level `version` field of a JSON body.
fn json_version(body: &str) -> Option<String> {
    let payload: serde_json::Value = serde_json::from_str(body).ok()?;
    payload
        .get("version")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// `Cursor-X.Y.Z` filename pattern inside a JSON `downloadUrl`.
fn download_url_version(body: &str) -> Option<String> {
    let payload: serde_json::Value = serde_json::from_str(body).ok()?;
    let url = payload.get("downloadUrl").and_then(|v| v.as_str())?;
    DOWNLOAD_URL_VERSION
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// `version:` line of a YAML-like manifest.
fn manifest_version(body: &str) -> Option<String> {
    for line in body.lines() {
        if let Some(rest) = line.trim().strip_prefix("version:") {
            let value = rest.trim().trim_matches(|c| c == '"' || c == '\'');
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_version_field_wins() {
        let body = r#"{"version":"0.47.1","downloadUrl":"https://downloads/Cursor-0.46.9-x.AppImage"}"#;
        assert_eq!(extract_version(body).as_deref(), Some("0.47.1"));
    }

    #[test]
    fn test_download_url_fallback() {
        let body = r#"{"downloadUrl":"https://anysphere-binaries.s3.us-east-1.amazonaws.com/production/client/linux/x64/appimage/Cursor-0.46.9-3395357a4ee2975d5d03595e7607ee84e3db0f2c.deb.glibc2.25-x86_64.AppImage"}"#;
        assert_eq!(extract_version(body).as_deref(), Some("0.46.9"));
    }

    #[test]
    fn test_manifest_line_fallback() {
        let body = "name: cursor\nversion: 0.45.2\nfiles:\n  - url: Cursor.AppImage";
        assert_eq!(extract_version(body).as_deref(), Some("0.45.2"));
    }

    #[test]
    fn test_quoted_manifest_value() {
        assert_eq!(
            extract_version("version: \"0.45.2\"").as_deref(),
            Some("0.45.2")
        );
    }

    #[test]
    fn test_no_version_anywhere() {
        assert_eq!(extract_version(r#"{"downloadUrl":"https://x/y.zip"}"#), None);
        assert_eq!(extract_version("nothing here"), None);
        assert_eq!(extract_version("version:"), None);
    }
}
