use reqwest::Url;

/// Parse "true"/"false"/"1"/"0" (also yes/no, on/off).
pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Returns true for localhost, loopback IPv4/IPv6, and 0.0.0.0 URLs.
pub fn is_local_endpoint_url(url: &str) -> bool {
    let parsed = match Url::parse(url.trim()) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    match parsed.host_str() {
        Some(host) => {
            let normalized = host
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_ascii_lowercase();
            normalized == "localhost"
                || normalized == "::1"
                || normalized == "0.0.0.0"
                || normalized.starts_with("127.")
        }
        None => false,
    }
}

/// Joins a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_helpers() {
        assert_eq!(parse_bool_str("true"), Some(true));
        assert_eq!(parse_bool_str("0"), Some(false));
        assert_eq!(parse_bool_str(" YES "), Some(true));
        assert_eq!(parse_bool_str("off"), Some(false));
        assert_eq!(parse_bool_str("maybe"), None);
    }

    #[test]
    fn test_is_local_endpoint_url_normalizes_case_and_space() {
        assert!(is_local_endpoint_url(" HTTP://LOCALHOST:8283/v1 "));
        assert!(is_local_endpoint_url("https://127.0.0.1/v1"));
        assert!(is_local_endpoint_url("http://[::1]:8283"));
        assert!(is_local_endpoint_url("https://0.0.0.0/v1"));
        assert!(!is_local_endpoint_url("https://evil-localhost.com/v1"));
        assert!(!is_local_endpoint_url("https://api.letta.com/v1"));
    }

    #[test]
    fn test_join_url_collapses_slashes() {
        assert_eq!(
            join_url("http://localhost:8283/", "/v1/agents"),
            "http://localhost:8283/v1/agents"
        );
        assert_eq!(join_url("http://h", "v1"), "http://h/v1");
    }
}
