use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use winit::event_loop::EventLoopProxy;

use crate::cache::ThumbnailCache;
use crate::compress::{CompressOutcome, CompressRequest, compress};
use crate::loader;

// ---------------------------------------------------------------------------
// Events for waking the UI from worker threads
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum UserEvent {
    /// Thumbnail for this path was decoded and is now in the cache.
    ThumbnailReady(PathBuf),
    /// Thumbnail decode failed; the slot goes back to unloaded.
    ThumbnailFailed(PathBuf, String),
    CompressDone(CompressOutcome),
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag shared between the submitter and a worker.
/// Checked before decoding and again before publishing, so a cancelled task
/// never produces an event.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Bounded background pool
// ---------------------------------------------------------------------------

/// Explicit handle to the shared background pool. Created once in `main` and
/// passed to whoever submits work; there is no process-wide pool state.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(threads: usize) -> WorkerPool {
        let threads = threads.clamp(1, 8);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("lv-worker-{i}"))
            .build()
            .expect("build worker pool");
        log::debug!("worker pool started with {} threads", threads);
        WorkerPool { pool }
    }

    /// Sensible thread count for thumbnail decoding.
    pub fn default_threads() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
            .clamp(2, 4)
    }

    /// Decode one thumbnail in the background. The caller is responsible for
    /// not submitting the same path twice concurrently.
    pub fn spawn_thumbnail(
        &self,
        path: PathBuf,
        size: u32,
        cache: Arc<ThumbnailCache>,
        proxy: EventLoopProxy<UserEvent>,
        token: CancelToken,
    ) {
        self.pool.spawn(move || {
            match thumbnail_task(&path, size, &cache, &token) {
                Some(Ok(())) => {
                    let _ = proxy.send_event(UserEvent::ThumbnailReady(path));
                }
                Some(Err(message)) => {
                    let _ = proxy.send_event(UserEvent::ThumbnailFailed(path, message));
                }
                // Cancelled: no callback
                None => {}
            }
        });
    }

    /// Run one compression job off-thread and report the outcome.
    pub fn spawn_compress(&self, request: CompressRequest, proxy: EventLoopProxy<UserEvent>) {
        self.pool.spawn(move || {
            let outcome = compress(&request);
            let _ = proxy.send_event(UserEvent::CompressDone(outcome));
        });
    }
}

/// The actual unit of work: decode at thumbnail size and publish to the
/// cache. Returns `None` when cancelled, which must produce no event.
fn thumbnail_task(
    path: &Path,
    size: u32,
    cache: &ThumbnailCache,
    token: &CancelToken,
) -> Option<Result<(), String>> {
    if token.is_cancelled() {
        return None;
    }

    let result = loader::load(path, Some(size));

    if token.is_cancelled() {
        return None;
    }

    match result {
        Ok(bitmap) => {
            cache.put(path.to_path_buf(), Arc::new(bitmap));
            Some(Ok(()))
        }
        Err(e) => {
            log::debug!("thumbnail decode failed for {}: {}", path.display(), e);
            Some(Err(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ThumbnailCache;

    #[test]
    fn task_decodes_into_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        image::RgbImage::new(200, 100).save(&path).unwrap();

        let cache = ThumbnailCache::new(10, 10 * 1024 * 1024);
        let token = CancelToken::new();
        let outcome = thumbnail_task(&path, 80, &cache, &token);
        assert!(matches!(outcome, Some(Ok(()))));

        let bmp = cache.get(&path).unwrap();
        assert_eq!((bmp.width, bmp.height), (80, 40));
    }

    #[test]
    fn cancelled_task_produces_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        image::RgbImage::new(20, 20).save(&path).unwrap();

        let cache = ThumbnailCache::new(10, 10 * 1024 * 1024);
        let token = CancelToken::new();
        token.cancel();

        assert!(thumbnail_task(&path, 80, &cache, &token).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn failed_decode_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jpg");
        std::fs::write(&path, b"garbage").unwrap();

        let cache = ThumbnailCache::new(10, 10 * 1024 * 1024);
        let outcome = thumbnail_task(&path, 80, &cache, &CancelToken::new());
        assert!(matches!(outcome, Some(Err(_))));
        assert_eq!(cache.len(), 0);
    }
}
