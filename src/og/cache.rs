use lru::LruCache;

/// A cache entry holding an encoded image together with the request it
/// was rendered for, so colliding keys are never served.
struct CacheEntry {
    canonical: String,
    png: Vec<u8>,
}

/// In-memory LRU of encoded preview images, bounded by total bytes.
///
/// A budget of `0` disables caching entirely.
pub struct RenderCache {
    /// Label for logging
    label: String,
    entries: LruCache<u32, CacheEntry>,
    /// The current memory usage in bytes.
    current_bytes: usize,
    /// The maximum allowable memory usage in bytes.
    max_bytes: usize,
}

impl RenderCache {
    pub fn new(label: impl Into<String>, max_bytes: usize) -> Self {
        let label = label.into();
        log::debug!(
            "cache/{}: initialized with {} bytes limit",
            label,
            max_bytes
        );
        Self {
            label,
            entries: LruCache::unbounded(),
            current_bytes: 0,
            max_bytes,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_bytes > 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.current_bytes
    }

    /// Looks up the image rendered for `canonical`, marking it as
    /// recently used.
    pub fn get(&mut self, key: u32, canonical: &str) -> Option<Vec<u8>> {
        match self.entries.get(&key) {
            Some(entry) if entry.canonical == canonical => {
                log::debug!("cache/{}: hit for key {:08x}", self.label, key);
                Some(entry.png.clone())
            }
            Some(_) => {
                log::warn!(
                    "cache/{}: key {:08x} collides, ignoring",
                    self.label,
                    key
                );
                None
            }
            None => None,
        }
    }

    /// Stores an image, evicting least recently used entries until it
    /// fits. Images larger than the whole budget are not cached.
    pub fn set(&mut self, key: u32, canonical: &str, png: Vec<u8>) {
        let size = png.len();
        if size > self.max_bytes {
            if self.is_enabled() {
                log::warn!(
                    "cache/{}: value size {} exceeds limit {}",
                    self.label,
                    size,
                    self.max_bytes
                );
            }
            return;
        }

        if let Some(old) = self.entries.pop(&key) {
            self.release(old.png.len());
        }

        while self.current_bytes + size > self.max_bytes {
            let Some((evicted, old)) = self.entries.pop_lru() else {
                break;
            };
            log::debug!("cache/{}: evicting key {:08x}", self.label, evicted);
            self.release(old.png.len());
        }

        self.entries.put(
            key,
            CacheEntry {
                canonical: canonical.to_string(),
                png,
            },
        );
        self.current_bytes += size;

        log::debug!(
            "cache/{}: added {} bytes, total {}/{}",
            self.label,
            size,
            self.current_bytes,
            self.max_bytes
        );
    }

    fn release(&mut self, bytes: usize) {
        self.current_bytes = self.current_bytes.saturating_sub(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used_first() {
        let mut cache = RenderCache::new("test", 10);
        cache.set(1, "a", vec![0; 4]);
        cache.set(2, "b", vec![0; 4]);
        assert!(cache.get(1, "a").is_some());

        cache.set(3, "c", vec![0; 4]);
        assert!(cache.get(2, "b").is_none());
        assert!(cache.get(1, "a").is_some());
        assert!(cache.get(3, "c").is_some());
        assert_eq!(cache.size_bytes(), 8);
    }

    #[test]
    fn replacing_a_key_keeps_accounting_exact() {
        let mut cache = RenderCache::new("test", 10);
        cache.set(1, "a", vec![0; 6]);
        cache.set(1, "a", vec![1; 3]);
        assert_eq!(cache.size_bytes(), 3);
        assert_eq!(cache.get(1, "a"), Some(vec![1; 3]));
    }

    #[test]
    fn oversized_values_and_disabled_cache() {
        let mut cache = RenderCache::new("test", 4);
        cache.set(1, "a", vec![0; 5]);
        assert!(cache.is_empty());

        let mut disabled = RenderCache::new("off", 0);
        assert!(!disabled.is_enabled());
        disabled.set(1, "a", vec![0; 1]);
        assert!(disabled.get(1, "a").is_none());
    }

    #[test]
    fn colliding_keys_are_not_served() {
        let mut cache = RenderCache::new("test", 100);
        cache.set(7, "score=0.50&user=a", vec![1]);
        assert_eq!(cache.get(7, "score=0.60&user=b"), None);
        assert_eq!(cache.len(), 1);
    }
}
