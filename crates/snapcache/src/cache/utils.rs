//! # Cache Utilities
//!
//! Common utility functions for cache operations.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, ETAG, HeaderMap, HeaderName, LAST_MODIFIED};

use crate::cache::types::CacheMetadata;

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Build metadata for a downloaded body from its response headers
pub fn metadata_from_headers(headers: &HeaderMap, data: &Bytes, ttl: Duration) -> CacheMetadata {
    CacheMetadata::for_content(data)
        .with_expiration(ttl)
        .with_etag_option(header_string(headers, ETAG))
        .with_last_modified_option(header_string(headers, LAST_MODIFIED))
        .with_content_type_option(header_string(headers, CONTENT_TYPE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_metadata_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(ETAG, HeaderValue::from_static("\"abc\""));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
        let data = Bytes::from_static(b"body");

        let metadata = metadata_from_headers(&headers, &data, Duration::from_secs(10));

        assert_eq!(metadata.etag.as_deref(), Some("\"abc\""));
        assert_eq!(metadata.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(metadata.last_modified, None);
        assert_eq!(metadata.size, 4);
        assert_eq!(metadata.expires_at, Some(metadata.cached_at + 10));
        assert!(metadata.matches(&data));
    }
}
