//! Target normalisation.
//!
//! Scanners disagree on what a target looks like: subfinder and whois want a
//! bare domain while nuclei and sqlmap take the URL as given.

const SCHEMES: [&str; 2] = ["https://", "http://"];

/// Bare host of `target`, without scheme, path or port.
///
/// ```
/// use asmscan::target::extract_domain;
///
/// assert_eq!(extract_domain("https://example.com:8443/login"), "example.com");
/// assert_eq!(extract_domain("example.com"), "example.com");
/// ```
pub fn extract_domain(target: &str) -> String {
    let rest = strip_scheme(target.trim());
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    strip_port(authority).to_string()
}

fn strip_scheme(target: &str) -> &str {
    SCHEMES
        .iter()
        .find_map(|scheme| target.strip_prefix(*scheme))
        .unwrap_or(target)
}

fn strip_port(authority: &str) -> &str {
    // Bracketed IPv6 literal, `[::1]:8080`.
    if let Some(end) = authority.strip_prefix('[').and_then(|a| a.find(']')) {
        return &authority[..end + 2];
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://example.com"), "example.com");
        assert_eq!(extract_domain("http://sub.example.com/path?q=1"), "sub.example.com");
        assert_eq!(extract_domain("example.com:8080"), "example.com");
        assert_eq!(extract_domain("  example.com/  "), "example.com");
        assert_eq!(extract_domain("10.0.0.1"), "10.0.0.1");
    }

    #[test]
    fn test_extract_domain_keeps_bracketed_ipv6() {
        assert_eq!(extract_domain("[::1]:8080"), "[::1]");
        assert_eq!(extract_domain("https://[2001:db8::1]:8443/login"), "[2001:db8::1]");
    }

    #[test]
    fn test_bare_ipv6_is_left_alone() {
        assert_eq!(extract_domain("::1"), "::1");
    }
}
