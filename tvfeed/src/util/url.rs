use url::Url;

/// Resolve a possibly-relative URL against `base`.
///
/// Absolute URLs (anything with a scheme) come back untouched, so resolving
/// an already-resolved value is a no-op. Empty input yields `None`.
pub fn resolve_url(base: &Url, candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    if Url::parse(candidate).is_ok() {
        return Some(candidate.to_string());
    }

    match base.join(candidate) {
        Ok(joined) => Some(joined.to_string()),
        Err(e) => {
            tracing::warn!(url = candidate, error = %e, "Could not resolve URL");
            None
        }
    }
}

/// Whether the URL uses an http(s) scheme.
pub fn is_http(candidate: &str) -> bool {
    candidate.starts_with("http://") || candidate.starts_with("https://")
}
