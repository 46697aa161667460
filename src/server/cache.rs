use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::ShortLink;

/// What the redirect path needs to know about a short code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub link_id: Uuid,
    pub original_url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Target {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Thread-safe in-memory cache mapping short_code -> redirect target.
///
/// Warmed on startup from the database, then kept in sync via explicit
/// insert/remove calls from the handlers after every write operation.
#[derive(Clone, Debug)]
pub struct LinkCache {
    inner: Arc<DashMap<String, Target>>,
}

impl LinkCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Insert or update the mapping for a link.
    pub fn set(&self, link: ShortLink) {
        self.inner.insert(
            link.short_code,
            Target {
                link_id: link.id,
                original_url: link.original_url,
                expires_at: link.expires_at,
            },
        );
    }

    /// Look up a short code. Returns a clone of the target if present.
    pub fn get(&self, short_code: &str) -> Option<Target> {
        self.inner.get(short_code).map(|v| v.clone())
    }

    /// Remove a mapping (e.g. when a link is deleted).
    pub fn remove(&self, short_code: &str) {
        self.inner.remove(short_code);
    }

    /// Remove the mapping only if it still points at `link_id`. A code that
    /// was reissued to a newer link keeps its entry.
    pub fn evict_link(&self, short_code: &str, link_id: Uuid) -> bool {
        self.inner
            .remove_if(short_code, |_, target| target.link_id == link_id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for LinkCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(code: &str) -> ShortLink {
        ShortLink {
            id: Uuid::new_v4(),
            original_url: format!("https://example.com/{code}"),
            short_code: code.into(),
            click_count: 0,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    #[test]
    fn set_get_remove() {
        let cache = LinkCache::new();
        assert!(cache.is_empty());

        let l = link("abc123");
        let id = l.id;
        cache.set(l);

        let target = cache.get("abc123").unwrap();
        assert_eq!(target.link_id, id);
        assert_eq!(target.original_url, "https://example.com/abc123");
        assert_eq!(cache.len(), 1);

        cache.remove("abc123");
        assert!(cache.get("abc123").is_none());
    }

    #[test]
    fn evict_link_leaves_reissued_codes_alone() {
        let cache = LinkCache::new();
        let old = link("abc123");
        let old_id = old.id;
        cache.set(old);
        let newer = link("abc123");
        let newer_id = newer.id;
        cache.set(newer);

        assert!(!cache.evict_link("abc123", old_id));
        assert_eq!(cache.get("abc123").unwrap().link_id, newer_id);

        assert!(cache.evict_link("abc123", newer_id));
        assert!(cache.get("abc123").is_none());
    }

    #[test]
    fn clones_share_entries() {
        let cache = LinkCache::new();
        let other = cache.clone();
        cache.set(link("shared"));
        assert!(other.get("shared").is_some());
    }
}
