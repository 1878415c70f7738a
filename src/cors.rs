use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const ALLOW_METHODS: &str = "GET,POST,OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type,Authorization";

/// Echo the request origin when its host ends with `trusted_suffix`, else `*`.
pub fn allow_origin(origin: Option<&HeaderValue>, trusted_suffix: &str) -> HeaderValue {
    let wildcard = HeaderValue::from_static("*");
    let Some(origin) = origin else { return wildcard };
    let Ok(text) = origin.to_str() else { return wildcard };
    let Ok(uri) = text.parse::<Uri>() else { return wildcard };
    // hostnames compare case-insensitively
    let suffix = trusted_suffix.to_ascii_lowercase();
    match uri.host().map(str::to_ascii_lowercase) {
        Some(host) if uri.scheme().is_some() && host.ends_with(&suffix) => origin.clone(),
        _ => wildcard,
    }
}

fn apply(headers: &mut HeaderMap, origin: HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
}

/// Answers preflight requests directly and stamps CORS headers on everything else.
pub async fn cors(State(trusted_suffix): State<Arc<str>>, req: Request, next: Next) -> Response {
    let origin = allow_origin(req.headers().get(header::ORIGIN), &trusted_suffix);

    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };
    apply(response.headers_mut(), origin);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn check(origin: &str) -> HeaderValue {
        allow_origin(Some(&HeaderValue::from_str(origin).unwrap()), ".github.io")
    }

    #[test]
    fn trusted_origin_is_reflected() {
        assert_eq!(check("https://foo.github.io"), "https://foo.github.io");
        assert_eq!(check("https://foo.github.io:8443"), "https://foo.github.io:8443");
        assert_eq!(check("https://Foo.GitHub.IO"), "https://Foo.GitHub.IO");
        let origin = HeaderValue::from_static("https://foo.github.io");
        assert_eq!(allow_origin(Some(&origin), ".GitHub.io"), "https://foo.github.io");
    }

    #[test]
    fn untrusted_origin_gets_wildcard() {
        assert_eq!(check("https://evil.example.com"), "*");
        assert_eq!(check("https://github.io.evil.com"), "*");
        assert_eq!(check("https://github.io"), "*");
    }

    #[test]
    fn missing_or_malformed_origin_gets_wildcard() {
        assert_eq!(allow_origin(None, ".github.io"), "*");
        assert_eq!(check("not a url"), "*");
        assert_eq!(check("null"), "*");
        assert_eq!(check(""), "*");
    }
}
