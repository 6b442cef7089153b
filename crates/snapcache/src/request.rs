//! # Fetch Requests
//!
//! A [`FetchRequest`] carries the size the consumer asked for. Everything
//! downstream (remote URL, cache slot, consumer state key, scheduler dedup
//! key) is derived from the rounded size held in its [`ResourceKey`].

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FetchError, RequestError};

/// Rounded pixel size identifying one remote resource and its cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    width: u32,
    height: u32,
}

impl ResourceKey {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Round a requested size to whole pixels.
    ///
    /// Halves round away from zero, so `200.5` becomes `201`.
    pub fn from_dimensions(width: f64, height: f64) -> Result<Self, RequestError> {
        Ok(Self {
            width: round_pixels("width", width)?,
            height: round_pixels("height", height)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Filename-safe form, e.g. `200_101`
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.width, self.height)
    }

    /// Resolve `<base>/<width>/<height>`.
    pub fn url(&self, base: &str) -> Result<Url, FetchError> {
        let mut url =
            Url::parse(base).map_err(|e| FetchError::UrlError(format!("{base}: {e}")))?;

        url.path_segments_mut()
            .map_err(|_| FetchError::UrlError(format!("{base}: cannot be a base URL")))?
            .pop_if_empty()
            .push(&self.width.to_string())
            .push(&self.height.to_string());

        Ok(url)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.width, self.height)
    }
}

fn round_pixels(axis: &'static str, value: f64) -> Result<u32, RequestError> {
    let rounded = value.round();
    if !value.is_finite() || rounded < 0.0 || rounded > f64::from(u32::MAX) {
        return Err(RequestError::InvalidDimension { axis, value });
    }
    Ok(rounded as u32)
}

/// A request to refresh the image for one size. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchRequest {
    width: f64,
    height: f64,
    force: bool,
    key: ResourceKey,
}

impl FetchRequest {
    pub fn new(width: f64, height: f64, force: bool) -> Result<Self, RequestError> {
        let key = ResourceKey::from_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            force,
            key,
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Whether any cached copy must be dropped before fetching
    pub fn is_forced(&self) -> bool {
        self.force
    }

    pub fn key(&self) -> ResourceKey {
        self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_rounds_to_nearest_pixel() {
        let key = ResourceKey::from_dimensions(200.4, 100.6).unwrap();
        assert_eq!(key.to_string(), "200/101");
        assert_eq!(key.file_stem(), "200_101");

        let key = ResourceKey::from_dimensions(200.5, 0.49).unwrap();
        assert_eq!(key, ResourceKey::new(201, 0));
    }

    #[test]
    fn test_key_rejects_invalid_dimensions() {
        for (w, h) in [
            (-1.0, 10.0),
            (10.0, f64::NAN),
            (f64::INFINITY, 10.0),
            (10.0, 1e12),
        ] {
            assert!(
                ResourceKey::from_dimensions(w, h).is_err(),
                "({w}, {h}) should be rejected"
            );
        }

        // Rounds to zero, which is still a valid size
        assert_eq!(
            ResourceKey::from_dimensions(-0.4, 0.0).unwrap(),
            ResourceKey::new(0, 0)
        );
    }

    #[test]
    fn test_url_appends_size_segments() {
        let key = ResourceKey::new(200, 101);
        assert_eq!(
            key.url("https://picsum.photos").unwrap().as_str(),
            "https://picsum.photos/200/101"
        );
        assert_eq!(
            key.url("https://picsum.photos/").unwrap().as_str(),
            "https://picsum.photos/200/101"
        );
        assert_eq!(
            key.url("http://127.0.0.1:8080/images").unwrap().as_str(),
            "http://127.0.0.1:8080/images/200/101"
        );
    }

    #[test]
    fn test_url_rejects_bad_base() {
        let key = ResourceKey::new(1, 1);
        let err = key.url("not a url").unwrap_err();
        assert!(err.is_permanent());
        assert!(key.url("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_request_key_matches_state_key_for_many_sizes() {
        for w in 0..40 {
            for h in 0..40 {
                let width = f64::from(w) * 7.3;
                let height = f64::from(h) * 3.7;
                let request = FetchRequest::new(width, height, false).unwrap();
                let state_key = format!("{}/{}", width.round() as u32, height.round() as u32);
                assert_eq!(request.key().to_string(), state_key);
            }
        }
    }

    #[test]
    fn test_request_keeps_raw_size_and_flag() {
        let request = FetchRequest::new(320.2, 240.9, true).unwrap();
        assert_eq!(request.width(), 320.2);
        assert_eq!(request.height(), 240.9);
        assert!(request.is_forced());
        assert_eq!(request.key(), ResourceKey::new(320, 241));
    }
}
