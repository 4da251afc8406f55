use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::loader::Bitmap;

// ---------------------------------------------------------------------------
// Thumbnail cache (path -> bitmap, LRU by count and estimated memory)
// ---------------------------------------------------------------------------

pub const DEFAULT_MAX_ITEMS: usize = 500;
pub const DEFAULT_MAX_MEMORY_MB: usize = 100;

struct CacheInner {
    lru: LruCache<PathBuf, Arc<Bitmap>>,
    used_bytes: usize,
}

/// Bounded thumbnail store shared between the UI thread and decode workers.
///
/// One coarse lock guards the whole structure; every critical section is a
/// map operation plus at worst an eviction sweep, which stays cheap at the
/// configured bounds.
pub struct ThumbnailCache {
    inner: Mutex<CacheInner>,
    max_items: usize,
    max_memory_bytes: usize,
}

impl ThumbnailCache {
    pub fn new(max_items: usize, max_memory_bytes: usize) -> ThumbnailCache {
        ThumbnailCache {
            inner: Mutex::new(CacheInner {
                lru: LruCache::unbounded(),
                used_bytes: 0,
            }),
            max_items: max_items.max(1),
            max_memory_bytes: max_memory_bytes.max(1),
        }
    }

    /// Look up a thumbnail, marking it most recently used on a hit.
    pub fn get(&self, path: &Path) -> Option<Arc<Bitmap>> {
        let mut inner = self.inner.lock().unwrap();
        inner.lru.get(path).cloned()
    }

    /// Insert a thumbnail, evicting least-recently-used entries first until
    /// both the item and the memory bound are satisfied.
    pub fn put(&self, path: PathBuf, bitmap: Arc<Bitmap>) {
        let mut inner = self.inner.lock().unwrap();

        if let Some(old) = inner.lru.pop(&path) {
            inner.used_bytes = inner.used_bytes.saturating_sub(old.estimated_bytes());
        }

        // Evict before inserting so both bounds hold when put returns
        let incoming = bitmap.estimated_bytes();
        while (inner.lru.len() >= self.max_items
            || inner.used_bytes + incoming > self.max_memory_bytes)
            && !inner.lru.is_empty()
        {
            if let Some((evicted_path, evicted)) = inner.lru.pop_lru() {
                inner.used_bytes = inner.used_bytes.saturating_sub(evicted.estimated_bytes());
                log::trace!("evicted thumbnail {}", evicted_path.display());
            }
        }

        inner.used_bytes += bitmap.estimated_bytes();
        inner.lru.put(path, bitmap);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.lru.clear();
        inner.used_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().lru.len()
    }

    pub fn memory_used(&self) -> usize {
        self.inner.lock().unwrap().used_bytes
    }

    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::PixelFormat;

    fn bitmap(w: u32, h: u32) -> Arc<Bitmap> {
        Arc::new(Bitmap {
            width: w,
            height: h,
            format: PixelFormat::Rgb,
            pixels: vec![0; (w * h * 3) as usize],
        })
    }

    #[test]
    fn put_then_get_returns_same_bitmap() {
        let cache = ThumbnailCache::new(10, 10 * 1024 * 1024);
        let bmp = bitmap(80, 80);
        cache.put(PathBuf::from("/a.jpg"), Arc::clone(&bmp));
        let hit = cache.get(Path::new("/a.jpg")).unwrap();
        assert!(Arc::ptr_eq(&hit, &bmp));
    }

    #[test]
    fn item_bound_holds_after_every_put() {
        let cache = ThumbnailCache::new(3, usize::MAX);
        for i in 0..20 {
            cache.put(PathBuf::from(format!("/{i}.jpg")), bitmap(10, 10));
            assert!(cache.len() <= 3);
        }
    }

    #[test]
    fn memory_bound_holds_after_every_put() {
        // Each 100x100 bitmap is estimated at 40_000 bytes
        let cache = ThumbnailCache::new(1000, 100_000);
        for i in 0..20 {
            cache.put(PathBuf::from(format!("/{i}.jpg")), bitmap(100, 100));
            assert!(cache.memory_used() <= 100_000);
        }
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = ThumbnailCache::new(3, usize::MAX);
        cache.put(PathBuf::from("/a.jpg"), bitmap(10, 10));
        cache.put(PathBuf::from("/b.jpg"), bitmap(10, 10));
        // Touch a so b becomes the oldest
        cache.get(Path::new("/a.jpg")).unwrap();
        cache.put(PathBuf::from("/c.jpg"), bitmap(10, 10));

        assert!(cache.get(Path::new("/b.jpg")).is_none());
        assert!(cache.get(Path::new("/a.jpg")).is_some());
        assert!(cache.get(Path::new("/c.jpg")).is_some());
    }

    #[test]
    fn reinsert_replaces_accounting() {
        let cache = ThumbnailCache::new(10, usize::MAX);
        cache.put(PathBuf::from("/a.jpg"), bitmap(100, 100));
        cache.put(PathBuf::from("/a.jpg"), bitmap(10, 10));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.memory_used(), 10 * 10 * 4);
    }

    #[test]
    fn clear_resets() {
        let cache = ThumbnailCache::new(10, usize::MAX);
        cache.put(PathBuf::from("/a.jpg"), bitmap(10, 10));
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.memory_used(), 0);
        assert!(cache.get(Path::new("/a.jpg")).is_none());
    }
}
