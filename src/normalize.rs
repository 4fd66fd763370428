//! Classify decoded text as a link or opaque data and canonicalize it to an
//! absolute URL.
use serde::{Deserialize, Serialize};
use url::Url;

/// Reserved host (RFC 2606) used to wrap payloads that are not links
pub const OPAQUE_DATA_HOST: &str = "data.invalid";

/// Decoded text together with the URL it is assessed as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTarget {
    pub raw_text: String,
    /// Always an absolute URL
    pub url: String,
    pub is_url_like: bool,
}

impl NormalizedTarget {
    /// Parsed form of [`NormalizedTarget::url`]
    pub fn parsed_url(&self) -> Option<Url> {
        Url::parse(&self.url).ok()
    }
}

/// Deterministic, infallible normalization of a decoded payload
pub fn normalize(text: &str) -> NormalizedTarget {
    let trimmed = text.trim();

    if has_explicit_scheme(trimmed) && Url::parse(trimmed).is_ok() {
        return NormalizedTarget {
            raw_text: trimmed.to_string(),
            url: trimmed.to_string(),
            is_url_like: true,
        };
    }

    if looks_like_host(trimmed) {
        let candidate = format!("https://{trimmed}");
        if Url::parse(&candidate).is_ok() {
            return NormalizedTarget {
                raw_text: trimmed.to_string(),
                url: candidate,
                is_url_like: true,
            };
        }
    }

    let url = if is_host_label(trimmed) {
        format!("https://{trimmed}")
    } else {
        let encoded: String = url::form_urlencoded::byte_serialize(trimmed.as_bytes()).collect();
        format!("https://{OPAQUE_DATA_HOST}/{encoded}")
    };
    NormalizedTarget {
        raw_text: trimmed.to_string(),
        url,
        is_url_like: false,
    }
}

/// `scheme://` prefix with a syntactically valid scheme
fn has_explicit_scheme(text: &str) -> bool {
    let Some((scheme, _)) = text.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// `host[:port][/...]` where host is a dotted name with an alphabetic TLD
fn looks_like_host(text: &str) -> bool {
    let authority = text.split(['/', '?', '#']).next().unwrap_or_default();
    if !authority.contains('.') {
        return false;
    }

    let host = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let valid_port = !port.is_empty()
                && port.len() <= 5
                && port.bytes().all(|b| b.is_ascii_digit())
                && port.parse::<u32>().is_ok_and(|p| p <= 65_535);
            if !valid_port {
                return false;
            }
            host
        }
        None => authority,
    };

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 || !labels.iter().all(|label| is_host_label(label)) {
        return false;
    }
    labels
        .last()
        .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
}

/// One DNS label: letters, digits and inner hyphens, at most 63 bytes
fn is_host_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_urls_kept_as_is() {
        let target = normalize("  https://Example.com/a?b=c \n");
        assert!(target.is_url_like);
        assert_eq!(target.url, "https://Example.com/a?b=c");
        assert_eq!(target.raw_text, "https://Example.com/a?b=c");

        let target = normalize("http://example.com:8080/path");
        assert_eq!(target.url, "http://example.com:8080/path");
    }

    #[test]
    fn test_bare_hosts_get_https() {
        let target = normalize("example.com");
        assert!(target.is_url_like);
        assert_eq!(target.url, "https://example.com");

        let target = normalize("shop.example.co.uk:8443/cart?id=1");
        assert!(target.is_url_like);
        assert_eq!(target.url, "https://shop.example.co.uk:8443/cart?id=1");
    }

    #[test]
    fn test_not_hosts() {
        for text in ["version 1.2", "1.2.3.4", "example.c0m", "a..com", "example.com:99999"] {
            let target = normalize(text);
            assert!(!target.is_url_like, "{text}");
            assert!(Url::parse(&target.url).is_ok(), "{text}");
        }
    }

    #[test]
    fn test_opaque_payloads_wrap_to_reserved_host() {
        let target = normalize("mailto:someone@example.com");
        assert!(!target.is_url_like);
        assert!(target.url.starts_with("https://data.invalid/"));
        assert!(target.parsed_url().is_some());

        let target = normalize("hello world");
        assert_eq!(target.url, "https://data.invalid/hello+world");

        let target = normalize("");
        assert_eq!(target.url, "https://data.invalid/");
    }

    #[test]
    fn test_single_label_becomes_host() {
        let target = normalize("localhost");
        assert!(!target.is_url_like);
        assert_eq!(target.url, "https://localhost");
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(normalize("example.com")).unwrap();
        assert_eq!(json["isUrlLike"], true);
        assert_eq!(json["rawText"], "example.com");
    }
}
