//! Cache key derivation.

use stream_common::ByteRange;

/// Path component of a request URL: scheme, host, query and fragment dropped.
///
/// Bare paths are returned unchanged apart from query/fragment removal.
pub fn request_path(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    match without_query.split_once("://") {
        Some((_, rest)) => match rest.find('/') {
            Some(idx) => rest[idx..].to_string(),
            None => format!("/{}", rest),
        },
        None => without_query.to_string(),
    }
}

/// Key of a cached range: request path plus normalized range expression.
///
/// Two requests for the same byte window of the same path share a key even
/// when their hosts or query strings differ.
pub fn cache_key(url: &str, range: &ByteRange) -> String {
    format!("{}|{}", request_path(url), range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path_strips_host_and_query() {
        assert_eq!(
            request_path("https://bucket.example/data/2025-01-01T0000.om?token=abc"),
            "/data/2025-01-01T0000.om"
        );
        assert_eq!(request_path("/data/a.om#frag"), "/data/a.om");
        assert_eq!(request_path("mem://a.om"), "/a.om");
    }

    #[test]
    fn test_query_strings_collide() {
        let range = ByteRange::span(0, 100);
        assert_eq!(
            cache_key("https://a.example/x.om?v=1", &range),
            cache_key("https://a.example/x.om?v=2", &range)
        );
    }

    #[test]
    fn test_equivalent_range_spellings_collide() {
        let a = ByteRange::parse("bytes=0-99").unwrap();
        let b = ByteRange::parse("bytes = 0 - 99").unwrap();
        assert_eq!(cache_key("/x.om", &a), cache_key("/x.om", &b));
        assert_ne!(
            cache_key("/x.om", &a),
            cache_key("/x.om", &ByteRange::suffix(100))
        );
    }
}
