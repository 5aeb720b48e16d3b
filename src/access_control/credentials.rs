//! Credential extraction
//!
//! Scans the header, query string, JSON body and literal path of a request
//! for the four raw credential fields. Later sources override earlier ones
//! for the same field; the path is the most authoritative indicator of the
//! resource being acted on and always wins for `groupId`/`editId`.

use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use regex::Regex;
use std::sync::OnceLock;

/// Header carrying the operator admin secret
pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Wire names for the resource identifiers in query strings and JSON bodies
const GROUP_ID_KEY: &str = "groupId";
const EDIT_ID_KEY: &str = "editId";

/// Raw per-request credentials, before any verification
///
/// All fields optional; absence is distinct from an empty string. Produced
/// once per request and handed to the role resolver unchanged.
#[derive(Debug, Clone, Default)]
pub struct RawCredentials {
    /// Verbatim admin-secret header value
    pub admin_secret: Option<String>,
    /// Bearer token with the scheme prefix stripped
    pub bearer_token: Option<String>,
    /// Group the request acts on
    pub group_id: Option<String>,
    /// Edit the request acts on, already coerced to an integer
    pub edit_id: Option<i64>,
}

fn group_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|/)group/([^/]+)").expect("static regex"))
}

fn edit_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|/)edit/([^/]+)").expect("static regex"))
}

/// Extract raw credentials from the pieces of a request.
///
/// `body` carries the buffered request body bytes, or `None` when the body
/// was not buffered (multipart uploads are never buffered upstream). The
/// body is only consulted for a `application/json` content type and only
/// for fields the query string left unset.
pub fn extract(
    headers: &HeaderMap,
    path: &str,
    query: Option<&str>,
    body: Option<&[u8]>,
) -> RawCredentials {
    let mut credentials = RawCredentials::default();

    // 1. Headers
    credentials.admin_secret = headers
        .get(ADMIN_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    credentials.bearer_token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(strip_bearer_scheme)
        .map(str::to_owned);

    // 2. Query parameters
    let mut group_id = query.and_then(|q| query_value(q, GROUP_ID_KEY));
    let mut edit_id = query.and_then(|q| query_value(q, EDIT_ID_KEY));

    // 3. JSON body, only for fields the query left unset
    if (group_id.is_none() || edit_id.is_none()) && is_json(headers) {
        if let Some(value) = body.and_then(|bytes| serde_json::from_slice::<serde_json::Value>(bytes).ok()) {
            if group_id.is_none() {
                group_id = json_field(&value, GROUP_ID_KEY);
            }
            if edit_id.is_none() {
                edit_id = json_field(&value, EDIT_ID_KEY);
            }
        }
    }

    // 4. Path segments overwrite unconditionally
    if let Some(captures) = group_path_regex().captures(path) {
        group_id = Some(captures[1].to_string());
    }
    if let Some(captures) = edit_path_regex().captures(path) {
        edit_id = Some(captures[1].to_string());
    }

    credentials.group_id = group_id;
    // 5. Coercion failure is absence, not an error
    credentials.edit_id = edit_id.and_then(|raw| raw.parse::<i64>().ok());

    credentials
}

/// Strip a leading `Bearer ` scheme, case-insensitively.
fn strip_bearer_scheme(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed
        .split_once(' ')
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .unwrap_or(trimmed)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("application/json"))
}

/// First occurrence of `key` in a query string, with standard
/// `application/x-www-form-urlencoded` decoding applied to the value.
fn query_value(query: &str, key: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find_map(|(k, v)| (k == key && !v.is_empty()).then(|| v.into_owned()))
}

/// Read a top-level string or integer field from a JSON body.
fn json_field(value: &serde_json::Value, key: &str) -> Option<String> {
    match value.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::try_from(*name).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_admin_secret_header_verbatim() {
        let headers = headers(&[(ADMIN_SECRET_HEADER, "s3cret")]);
        let creds = extract(&headers, "/status", None, None);
        assert_eq!(creds.admin_secret.as_deref(), Some("s3cret"));
        assert!(creds.bearer_token.is_none());
    }

    #[test]
    fn test_bearer_scheme_stripped() {
        let headers = headers(&[("authorization", "Bearer abc.def.ghi")]);
        let creds = extract(&headers, "/status", None, None);
        assert_eq!(creds.bearer_token.as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_bearer_scheme_case_insensitive_and_optional() {
        let headers = headers(&[("authorization", "bearer tok")]);
        let creds = extract(&headers, "/", None, None);
        assert_eq!(creds.bearer_token.as_deref(), Some("tok"));

        // No scheme prefix: value taken as-is
        let headers = self::headers(&[("authorization", "raw-token")]);
        let creds = extract(&headers, "/", None, None);
        assert_eq!(creds.bearer_token.as_deref(), Some("raw-token"));
    }

    #[test]
    fn test_query_parameters() {
        let creds = extract(&HeaderMap::new(), "/songs", Some("groupId=g1&editId=7"), None);
        assert_eq!(creds.group_id.as_deref(), Some("g1"));
        assert_eq!(creds.edit_id, Some(7));
    }

    #[test]
    fn test_body_fills_only_unset_fields() {
        let headers = headers(&[("content-type", "application/json")]);
        let body = br#"{"groupId": "from-body", "editId": 9}"#;
        let creds = extract(&headers, "/songs", Some("groupId=from-query"), Some(body));
        // Query wins over body for groupId; body fills editId
        assert_eq!(creds.group_id.as_deref(), Some("from-query"));
        assert_eq!(creds.edit_id, Some(9));
    }

    #[test]
    fn test_body_ignored_without_json_content_type() {
        let body = br#"{"groupId": "from-body"}"#;
        let creds = extract(&HeaderMap::new(), "/songs", None, Some(body));
        assert!(creds.group_id.is_none());
    }

    #[test]
    fn test_path_overwrites_query_and_body() {
        let headers = headers(&[("content-type", "application/json")]);
        let body = br#"{"groupId": "g-body", "editId": 1}"#;
        let creds = extract(
            &headers,
            "/group/g-path/edit/42",
            Some("groupId=g-query&editId=2"),
            Some(body),
        );
        assert_eq!(creds.group_id.as_deref(), Some("g-path"));
        assert_eq!(creds.edit_id, Some(42));
    }

    #[test]
    fn test_non_numeric_edit_id_is_absent() {
        let creds = extract(&HeaderMap::new(), "/edit/not-a-number", None, None);
        assert!(creds.edit_id.is_none());

        let creds = extract(&HeaderMap::new(), "/songs", Some("editId=abc"), None);
        assert!(creds.edit_id.is_none());
    }

    #[test]
    fn test_malformed_body_yields_nothing() {
        let headers = headers(&[("content-type", "application/json")]);
        let creds = extract(&headers, "/songs", None, Some(b"{not json"));
        assert!(creds.group_id.is_none());
        assert!(creds.edit_id.is_none());
    }

    #[test]
    fn test_numeric_json_edit_id() {
        let headers = headers(&[("content-type", "application/json")]);
        let creds = extract(&headers, "/songs", None, Some(br#"{"editId": "12"}"#));
        assert_eq!(creds.edit_id, Some(12));
    }

    #[test]
    fn test_query_values_are_percent_decoded() {
        let creds = extract(
            &HeaderMap::new(),
            "/songs",
            Some("groupId=my%20group&editId=7"),
            None,
        );
        assert_eq!(creds.group_id.as_deref(), Some("my group"));
        assert_eq!(creds.edit_id, Some(7));

        // `+` is a space in form encoding
        let creds = extract(&HeaderMap::new(), "/songs", Some("groupId=my+group"), None);
        assert_eq!(creds.group_id.as_deref(), Some("my group"));
    }

    #[test]
    fn test_empty_query_value_is_absent() {
        let creds = extract(&HeaderMap::new(), "/songs", Some("groupId="), None);
        assert!(creds.group_id.is_none());
    }
}
