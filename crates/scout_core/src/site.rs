use url::Url;

/// Normalizes a website for duplicate detection: lowercase scheme and host,
/// path without trailing slash, no query or fragment. Bare hosts get `http://`.
pub fn normalize_site_for_dedupe(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    match Url::parse(&candidate) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
            let path = url.path().trim_end_matches('/');
            let path = if path.is_empty() { "/" } else { path };
            format!("{}://{}{}", url.scheme(), host, path)
        }
        Err(_) => trimmed.trim_end_matches('/').to_ascii_lowercase(),
    }
}
