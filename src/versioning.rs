//! Generation-versioned physical keys.
//!
//! A logical key `user:1` written under generation 3 is stored as
//! `cache-version-3:user:1`. Versioning a key that already carries the marker
//! returns it unchanged, so callers may feed physical keys back in.

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker that opens every versioned key.
pub const VERSION_MARKER: &str = "cache-version-";

static VERSIONED_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^{}(\d+):", regex::escape(VERSION_MARKER)))
        .expect("versioned key pattern is valid")
});

/// Map a logical key and generation to the physical key stored in tiers.
pub fn version_key(key: &str, generation: u32) -> String {
    if is_versioned(key) {
        return key.to_string();
    }
    format!("{}{}:{}", VERSION_MARKER, generation, key)
}

/// Whether `key` already carries a generation marker.
pub fn is_versioned(key: &str) -> bool {
    VERSIONED_KEY.is_match(key)
}

/// The generation embedded in a versioned key.
///
/// `None` for unversioned keys and for generations that overflow `u32`.
pub fn generation_of(key: &str) -> Option<u32> {
    VERSIONED_KEY
        .captures(key)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

/// The logical part of a versioned key (the key itself if unversioned).
pub fn strip_version(key: &str) -> &str {
    match VERSIONED_KEY.find(key) {
        Some(marker) => &key[marker.end()..],
        None => key,
    }
}

/// Turn a glob pattern over logical keys into one over physical keys of any
/// generation.
pub fn any_generation_pattern(pattern: &str) -> String {
    format!("{}*:{}", VERSION_MARKER, pattern)
}
