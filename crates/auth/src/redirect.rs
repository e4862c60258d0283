//! Same-origin return URLs.
//!
//! The login redirect carries the originally requested location so the
//! visitor can be sent back after authenticating. Only the path, query and
//! nothing else survives: scheme, host, port and user-info are dropped so
//! the parameter can never point at another origin.

use url::Url;

const PLACEHOLDER_ORIGIN: &str = "http://localhost/";

/// Reduce `requested` to a path on the current origin.
///
/// `////evil.com/x`, `https://user:pw@evil.com:8443/x` and `/\evil.com/x`
/// all become `/x`. Input that cannot be interpreted becomes `/`.
pub fn same_origin_path(requested: &str) -> String {
    let Ok(base) = Url::parse(PLACEHOLDER_ORIGIN) else {
        return "/".to_string();
    };
    let Ok(resolved) = base.join(&collapse_authority_slashes(requested)) else {
        return "/".to_string();
    };

    // A path starting with `//` would be read as protocol-relative.
    let mut path = format!("/{}", resolved.path().trim_start_matches('/'));
    if let Some(query) = resolved.query() {
        path.push('?');
        path.push_str(query);
    }
    path
}

/// Any run of two or more leading `/` or `\` becomes `//`, so the host that
/// follows is parsed as an authority (and dropped) instead of failing to
/// parse as an empty one.
fn collapse_authority_slashes(requested: &str) -> String {
    let rest = requested.trim_start_matches(['/', '\\']);
    match requested.len() - rest.len() {
        0 | 1 => requested.to_string(),
        _ => format!("//{rest}"),
    }
}

/// Append `name=value` to `location`, percent-encoding the value.
pub fn with_query_param(location: &str, name: &str, value: &str) -> String {
    let separator = if location.contains('?') { '&' } else { '?' };
    format!(
        "{location}{separator}{}={}",
        urlencoding::encode(name),
        urlencoding::encode(value)
    )
}
