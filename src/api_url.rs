use crate::error::ApiError;
use reqwest::Url;
use std::collections::HashMap;

pub const API_URL_KEY: &str = "STRATENV_API_URL";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const LOCAL_HOST_PREFIXES: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

fn is_local_host(value: &str) -> bool {
    let lower = value.to_lowercase();
    LOCAL_HOST_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Normalizes a configured server origin. Bare hosts get `http` when local
/// and `https` otherwise; trailing slashes are dropped.
pub fn normalize_api_base_url(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains('?') || trimmed.contains('#') || trimmed.contains(char::is_whitespace) {
        return None;
    }

    let with_scheme = match trimmed.split_once("://") {
        Some((scheme, rest)) => {
            let scheme = scheme.to_ascii_lowercase();
            let rest = rest.trim_end_matches('/');
            if (scheme != "http" && scheme != "https") || rest.is_empty() {
                return None;
            }
            format!("{}://{}", scheme, rest)
        }
        None => {
            let host = trimmed.trim_end_matches('/');
            // "http:" or "http:/" is a mangled scheme, not a host.
            if host.is_empty() || host.ends_with(':') {
                return None;
            }
            let scheme = if is_local_host(host) { "http" } else { "https" };
            format!("{}://{}", scheme, host)
        }
    };
    Some(with_scheme)
}

pub fn resolve_api_base_url(settings: &HashMap<String, String>) -> Result<String, ApiError> {
    match settings.get(API_URL_KEY) {
        Some(raw) if !raw.trim().is_empty() => normalize_api_base_url(Some(raw))
            .ok_or_else(|| ApiError::InvalidUrl(format!("{}={}", API_URL_KEY, raw))),
        _ => Ok(DEFAULT_API_URL.to_string()),
    }
}

pub fn parse_api_base_url(base: &str) -> Result<Url, ApiError> {
    let normalized = normalize_api_base_url(Some(base))
        .ok_or_else(|| ApiError::InvalidUrl(base.to_string()))?;
    let url = Url::parse(&normalized).map_err(|err| ApiError::InvalidUrl(format!("{}: {}", base, err)))?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ApiError::InvalidUrl(base.to_string()));
    }
    Ok(url)
}

/// Appends percent-encoded path segments to the base URL, keeping any path
/// prefix the base already carries.
pub fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(base.to_string()))?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hosts_get_a_scheme() {
        assert_eq!(
            normalize_api_base_url(Some("localhost:8000/")).as_deref(),
            Some("http://localhost:8000")
        );
        assert_eq!(
            normalize_api_base_url(Some("api.example.com")).as_deref(),
            Some("https://api.example.com")
        );
        assert_eq!(
            normalize_api_base_url(Some(" HTTP://127.0.0.1:8000 ")).as_deref(),
            Some("http://127.0.0.1:8000")
        );
    }

    #[test]
    fn rejects_odd_values() {
        assert_eq!(normalize_api_base_url(None), None);
        assert_eq!(normalize_api_base_url(Some("  ")), None);
        assert_eq!(normalize_api_base_url(Some("ftp://host")), None);
        assert_eq!(normalize_api_base_url(Some("http://host?x=1")), None);
        assert_eq!(normalize_api_base_url(Some("http://")), None);
        assert_eq!(normalize_api_base_url(Some("https:///")), None);
        assert_eq!(normalize_api_base_url(Some("http:/")), None);
        assert_eq!(normalize_api_base_url(Some("/")), None);
    }

    #[test]
    fn settings_fall_back_to_default() {
        let mut settings = HashMap::new();
        assert_eq!(resolve_api_base_url(&settings).unwrap(), DEFAULT_API_URL);
        settings.insert(API_URL_KEY.to_string(), "backtest.example.com/api/".to_string());
        assert_eq!(
            resolve_api_base_url(&settings).unwrap(),
            "https://backtest.example.com/api"
        );
        settings.insert(API_URL_KEY.to_string(), "gopher://x".to_string());
        assert!(resolve_api_base_url(&settings).is_err());
        settings.insert(API_URL_KEY.to_string(), "http://".to_string());
        assert!(resolve_api_base_url(&settings).is_err());
    }

    #[test]
    fn segments_are_encoded_under_base_path() {
        let base = parse_api_base_url("http://127.0.0.1:8000/api").unwrap();
        let url = endpoint_url(&base, &["My Env", "strategies", "a/b"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8000/api/My%20Env/strategies/a%2Fb"
        );

        let root = parse_api_base_url("http://127.0.0.1:8000").unwrap();
        assert_eq!(
            endpoint_url(&root, &["envs"]).unwrap().as_str(),
            "http://127.0.0.1:8000/envs"
        );
    }
}
