//! Pattern-based invalidation.
//!
//! An [`InvalidationDescriptor`] maps an arbitrary object (say, an updated
//! `User`) to glob patterns over logical keys. Tiers that support invalidation
//! hold a set of descriptors ([`InvalidationRules`]), list the keys of every
//! generation whose logical part matches, and remove them.

use regex::Regex;
use std::any::Any;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::CacheError;
use crate::tier::CacheTier;
use crate::versioning::{any_generation_pattern, generation_of, strip_version};

/// Maps an invalidated object to the logical key patterns it affects.
pub trait InvalidationDescriptor: Send + Sync {
    /// Glob patterns (`*`, `?`) over logical keys. Empty if `target` is not
    /// something this descriptor knows about.
    fn key_patterns(&self, target: &(dyn Any + Send + Sync)) -> Vec<String>;
}

struct TypedDescriptor<T, F> {
    patterns: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> InvalidationDescriptor for TypedDescriptor<T, F>
where
    T: 'static,
    F: Fn(&T) -> Vec<String> + Send + Sync,
{
    fn key_patterns(&self, target: &(dyn Any + Send + Sync)) -> Vec<String> {
        target
            .downcast_ref::<T>()
            .map(|t| (self.patterns)(t))
            .unwrap_or_default()
    }
}

/// Build a descriptor for targets of type `T`.
///
/// # Example
/// ```ignore
/// let users = describe(|user: &User| vec![format!("user:{}:*", user.id)]);
/// ```
pub fn describe<T, F>(patterns: F) -> Arc<dyn InvalidationDescriptor>
where
    T: 'static,
    F: Fn(&T) -> Vec<String> + Send + Sync + 'static,
{
    Arc::new(TypedDescriptor {
        patterns,
        _marker: PhantomData,
    })
}

/// The descriptors a tier consults when asked to invalidate.
#[derive(Clone, Default)]
pub struct InvalidationRules {
    descriptors: Vec<Arc<dyn InvalidationDescriptor>>,
}

impl InvalidationRules {
    pub fn new(descriptors: Vec<Arc<dyn InvalidationDescriptor>>) -> Self {
        InvalidationRules { descriptors }
    }

    pub fn with(mut self, descriptor: Arc<dyn InvalidationDescriptor>) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Logical key patterns affected by `target`, deduplicated.
    pub fn patterns_for(&self, target: &(dyn Any + Send + Sync)) -> Vec<String> {
        let mut seen = HashSet::new();
        self.descriptors
            .iter()
            .flat_map(|descriptor| descriptor.key_patterns(target))
            .filter(|pattern| seen.insert(pattern.clone()))
            .collect()
    }
}

/// Remove every versioned key of `tier` whose logical part matches one of
/// `patterns`.
///
/// Returns the number of distinct keys removed.
pub async fn invalidate_matching(
    tier: &dyn CacheTier,
    patterns: &[String],
) -> Result<usize, CacheError> {
    let keys = collect_matching(tier, patterns).await?;
    if keys.is_empty() {
        return Ok(0);
    }

    let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    tier.remove(&key_refs).await?;

    tracing::debug!(
        "Invalidated keys: tier={}, patterns={:?}, removed={}",
        tier.name(),
        patterns,
        keys.len()
    );
    Ok(keys.len())
}

/// Distinct versioned keys of `tier`, any generation, whose logical part
/// matches one of the logical `patterns`. Keys come in discovery order.
///
/// The tier lists candidates with the widened `cache-version-*:` pattern, whose
/// `*` also spans colons, so every candidate is checked against the logical
/// pattern again: `user:1` must not take `cache-version-1:admin:user:1` along.
pub async fn collect_matching(
    tier: &dyn CacheTier,
    patterns: &[String],
) -> Result<Vec<String>, CacheError> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for pattern in patterns {
        let logical = glob_regex(pattern)?;
        for key in tier.keys_matching(&any_generation_pattern(pattern)).await? {
            if generation_of(&key).is_none() || !logical.is_match(strip_version(&key)) {
                continue;
            }
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
    }
    Ok(keys)
}

/// Compile a Redis-style glob into an anchored regex.
///
/// Supports `*` (any run), `?` (any single character) and `\` to escape the
/// next character. Everything else matches literally.
pub fn glob_regex(pattern: &str) -> Result<Regex, CacheError> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push_str("(?s)^");

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    source.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
                }
            }
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');

    Regex::new(&source)
        .map_err(|e| CacheError::Config(format!("invalid key pattern '{}': {}", pattern, e)))
}
