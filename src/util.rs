use std::time::Duration;

use reqwest::StatusCode;

const MAX_BACKOFF: Duration = Duration::from_secs(10);

pub(crate) fn retriable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 500 | 502 | 503 | 504)
}

pub(crate) fn backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// `Authorization` value for a personal access token. Values that already
/// carry a scheme are sent unchanged.
pub(crate) fn token_header(token: &str) -> String {
    let token = token.trim();
    if token.starts_with("ApiToken ") || token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("ApiToken {token}")
    }
}
