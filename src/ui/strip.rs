use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use winit::event_loop::EventLoopProxy;

use crate::cache::ThumbnailCache;
use crate::loader::Bitmap;
use crate::media::{MediaFile, MediaKind};
use crate::ui::render;
use crate::worker::{CancelToken, UserEvent, WorkerPool};

// ---------------------------------------------------------------------------
// Horizontal thumbnail strip
// ---------------------------------------------------------------------------

pub const THUMB_SIZE: u32 = 80;
const SLOT_SIZE: u32 = THUMB_SIZE + 8;
/// Horizontal distance between slot origins (slot plus gap).
pub const SLOT_STRIDE: u32 = SLOT_SIZE + 4;
/// Extra slots requested on each side of the viewport so small scrolls land
/// on already-decoded thumbnails.
const VISIBLE_BUFFER: usize = 5;

pub const MIN_HEIGHT: u32 = 80;
pub const MAX_HEIGHT: u32 = 300;
pub const DEFAULT_HEIGHT: u32 = 110;
pub const HANDLE_HEIGHT: u32 = 6;

struct Slot {
    path: PathBuf,
    kind: MediaKind,
    bitmap: Option<Arc<Bitmap>>,
    loading: bool,
}

/// Virtualized strip over the file list. Only slots near the viewport ever
/// get thumbnail requests; everything else stays an empty placeholder until
/// scrolled to.
pub struct ThumbnailStrip {
    slots: Vec<Slot>,
    selected: Option<usize>,
    scroll: f32,
    height: u32,
    /// One in-flight decode per path; the token lets us abandon work that
    /// scrolled away or belongs to a replaced file list.
    pending: HashMap<PathBuf, CancelToken>,
}

impl ThumbnailStrip {
    pub fn new() -> ThumbnailStrip {
        ThumbnailStrip {
            slots: Vec::new(),
            selected: None,
            scroll: 0.0,
            height: DEFAULT_HEIGHT,
            pending: HashMap::new(),
        }
    }

    /// Replace the file list. All in-flight decodes are cancelled so their
    /// results can never land in the new slots.
    pub fn set_files(&mut self, files: &[MediaFile]) {
        for token in self.pending.values() {
            token.cancel();
        }
        self.pending.clear();

        self.slots = files
            .iter()
            .map(|f| Slot {
                path: f.path.clone(),
                kind: f.kind,
                bitmap: None,
                loading: false,
            })
            .collect();
        self.selected = None;
        self.scroll = 0.0;
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_height(&mut self, height: u32) {
        self.height = height.clamp(MIN_HEIGHT, MAX_HEIGHT);
    }

    /// Which slot indices need thumbnails for this scroll position, including
    /// the off-screen buffer on both sides.
    pub fn visible_range(scroll: u32, viewport_w: u32, count: usize) -> std::ops::Range<usize> {
        let d = SLOT_STRIDE as usize;
        let start = (scroll as usize / d).saturating_sub(VISIBLE_BUFFER);
        let end = (((scroll + viewport_w) as usize / d) + VISIBLE_BUFFER + 1).min(count);
        start.min(end)..end
    }

    fn max_scroll(&self, viewport_w: u32) -> f32 {
        (self.slots.len() as u32 * SLOT_STRIDE).saturating_sub(viewport_w) as f32
    }

    pub fn scroll_by(&mut self, delta: f32, viewport_w: u32) {
        self.scroll = (self.scroll + delta).clamp(0.0, self.max_scroll(viewport_w));
    }

    /// Slot index under framebuffer x, if any. The gap between slots hits
    /// nothing.
    pub fn index_at(&self, x: u32) -> Option<usize> {
        let abs = self.scroll as u32 + x;
        let i = (abs / SLOT_STRIDE) as usize;
        (i < self.slots.len() && abs % SLOT_STRIDE < SLOT_SIZE).then_some(i)
    }

    pub fn select(&mut self, index: usize, viewport_w: u32) {
        if index >= self.slots.len() {
            return;
        }
        self.selected = Some(index);
        self.scroll_into_view(index, viewport_w);
    }

    fn scroll_into_view(&mut self, index: usize, viewport_w: u32) {
        let left = (index as u32 * SLOT_STRIDE) as f32;
        let right = left + SLOT_STRIDE as f32;
        if left < self.scroll {
            self.scroll = left;
        } else if right > self.scroll + viewport_w as f32 {
            self.scroll = right - viewport_w as f32;
        }
        self.scroll = self.scroll.clamp(0.0, self.max_scroll(viewport_w));
    }

    /// Make sure every visible image slot either has its thumbnail or a
    /// decode in flight. Returns true when anything changed on screen.
    pub fn request_visible(
        &mut self,
        cache: &Arc<ThumbnailCache>,
        pool: &WorkerPool,
        proxy: &EventLoopProxy<UserEvent>,
        viewport_w: u32,
    ) -> bool {
        let range = Self::visible_range(self.scroll as u32, viewport_w, self.slots.len());
        let mut changed = false;

        for i in range {
            let slot = &mut self.slots[i];
            if slot.bitmap.is_some() || slot.kind != MediaKind::Image {
                continue;
            }
            if let Some(bitmap) = cache.get(&slot.path) {
                slot.bitmap = Some(bitmap);
                slot.loading = false;
                changed = true;
                continue;
            }
            if self.pending.contains_key(&slot.path) {
                continue;
            }

            let token = CancelToken::new();
            self.pending.insert(slot.path.clone(), token.clone());
            slot.loading = true;
            pool.spawn_thumbnail(
                slot.path.clone(),
                THUMB_SIZE,
                Arc::clone(cache),
                proxy.clone(),
                token,
            );
            changed = true;
        }
        changed
    }

    /// A worker finished this path. Stale results (cancelled or from a
    /// replaced file list) are dropped on the floor.
    pub fn on_thumbnail_ready(&mut self, path: &Path, cache: &ThumbnailCache) -> bool {
        if self.pending.remove(path).is_none() {
            return false;
        }
        let Some(slot) = self.slots.iter_mut().find(|s| s.path == path) else {
            return false;
        };
        slot.bitmap = cache.get(path);
        slot.loading = false;
        slot.bitmap.is_some()
    }

    /// Decode failed: the slot goes back to the empty placeholder. No retry
    /// until the file scrolls out of range and back in.
    pub fn on_thumbnail_failed(&mut self, path: &Path) {
        self.pending.remove(path);
        if let Some(slot) = self.slots.iter_mut().find(|s| s.path == path) {
            slot.loading = false;
        }
    }

    /// Draw the strip into the bottom region starting at framebuffer row
    /// `top`.
    pub fn render(&self, frame: &mut [u32], fb_w: u32, fb_h: u32, top: u32) {
        render::fill_rect(
            frame,
            fb_w,
            fb_h,
            0,
            top as i32,
            fb_w,
            self.height,
            render::STRIP_BG_COLOR.into(),
        );
        // Resize handle along the top edge
        render::fill_rect(
            frame,
            fb_w,
            fb_h,
            0,
            top as i32,
            fb_w,
            HANDLE_HEIGHT,
            (60, 60, 60, 255),
        );

        let content_top = top + HANDLE_HEIGHT;
        let content_h = self.height - HANDLE_HEIGHT;
        let slot_y = content_top as i32 + (content_h.saturating_sub(SLOT_SIZE) / 2) as i32;

        let range = Self::visible_range(self.scroll as u32, fb_w, self.slots.len());
        for i in range {
            let slot = &self.slots[i];
            let slot_x = (i as u32 * SLOT_STRIDE) as i32 - self.scroll as i32;
            if slot_x + SLOT_SIZE as i32 <= 0 || slot_x >= fb_w as i32 {
                continue;
            }

            render::fill_rect(
                frame,
                fb_w,
                fb_h,
                slot_x,
                slot_y,
                SLOT_SIZE,
                SLOT_SIZE,
                render::SLOT_BG_COLOR.into(),
            );

            if let Some(bmp) = &slot.bitmap {
                let scale = render::fit_scale(
                    bmp.width as f32,
                    bmp.height as f32,
                    THUMB_SIZE as f32,
                    THUMB_SIZE as f32,
                )
                .min(1.0);
                let w = bmp.width as f32 * scale;
                let h = bmp.height as f32 * scale;
                let x = slot_x as f32 + (SLOT_SIZE as f32 - w) / 2.0;
                let y = slot_y as f32 + (SLOT_SIZE as f32 - h) / 2.0;
                render::blit_scaled(frame, fb_w, fb_h, bmp, x, y, scale, Some((content_top, fb_h)));
            } else if slot.kind == MediaKind::Video {
                draw_play_badge(frame, fb_w, fb_h, slot_x, slot_y);
            } else if slot.loading {
                let tx = slot_x + (SLOT_SIZE as i32 - render::text_width("...", 1)) / 2;
                let ty = slot_y + SLOT_SIZE as i32 / 2 - 3;
                render::draw_text(frame, fb_w, fb_h, "...", tx, ty, 1, (140, 140, 140, 255));
            }

            if self.selected == Some(i) {
                render::outline_rect(
                    frame,
                    fb_w,
                    fb_h,
                    slot_x,
                    slot_y,
                    SLOT_SIZE,
                    SLOT_SIZE,
                    3,
                    render::SELECT_COLOR.into(),
                );
            }
        }
    }

    #[cfg(test)]
    fn mark_pending(&mut self, path: &Path) -> CancelToken {
        let token = CancelToken::new();
        self.pending.insert(path.to_path_buf(), token.clone());
        if let Some(slot) = self.slots.iter_mut().find(|s| s.path == path) {
            slot.loading = true;
        }
        token
    }
}

/// Play-triangle placeholder for video files.
fn draw_play_badge(frame: &mut [u32], fb_w: u32, fb_h: u32, slot_x: i32, slot_y: i32) {
    let cx = slot_x + SLOT_SIZE as i32 / 2;
    let cy = slot_y + SLOT_SIZE as i32 / 2;
    let half = 12i32;
    for row in -half..=half {
        // triangle pointing right, width shrinking toward the tip
        let w = (half - row.abs()) * 3 / 2;
        if w > 0 {
            render::fill_rect(
                frame,
                fb_w,
                fb_h,
                cx - half / 2,
                cy + row,
                w as u32,
                1,
                (200, 200, 200, 255),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(n: usize) -> Vec<MediaFile> {
        (0..n)
            .map(|i| MediaFile {
                path: PathBuf::from(format!("/p/{i:03}.jpg")),
                kind: MediaKind::Image,
            })
            .collect()
    }

    #[test]
    fn visible_range_mid_scroll() {
        // stride 92, buffer 5, viewport 400
        assert_eq!(ThumbnailStrip::visible_range(920, 400, 100), 5..20);
    }

    #[test]
    fn visible_range_at_start() {
        assert_eq!(ThumbnailStrip::visible_range(0, 400, 100), 0..10);
    }

    #[test]
    fn visible_range_at_end() {
        let max_scroll = 100 * SLOT_STRIDE - 400;
        assert_eq!(ThumbnailStrip::visible_range(max_scroll, 400, 100), 90..100);
    }

    #[test]
    fn visible_range_small_list() {
        assert_eq!(ThumbnailStrip::visible_range(0, 400, 3), 0..3);
        assert_eq!(ThumbnailStrip::visible_range(0, 400, 0), 0..0);
    }

    #[test]
    fn set_files_cancels_pending() {
        let mut strip = ThumbnailStrip::new();
        strip.set_files(&files(3));
        let token = strip.mark_pending(Path::new("/p/001.jpg"));
        assert!(!token.is_cancelled());

        strip.set_files(&files(2));
        assert!(token.is_cancelled());
        assert!(strip.pending.is_empty());
    }

    #[test]
    fn stale_ready_event_is_ignored() {
        let mut strip = ThumbnailStrip::new();
        strip.set_files(&files(3));
        let cache = ThumbnailCache::new(10, 1024 * 1024);
        // never marked pending, e.g. arrived after set_files
        assert!(!strip.on_thumbnail_ready(Path::new("/p/001.jpg"), &cache));
    }

    #[test]
    fn failed_decode_clears_loading() {
        let mut strip = ThumbnailStrip::new();
        strip.set_files(&files(3));
        let path = PathBuf::from("/p/001.jpg");
        strip.mark_pending(&path);
        assert!(strip.slots[1].loading);

        strip.on_thumbnail_failed(&path);
        assert!(!strip.slots[1].loading);
        assert!(strip.slots[1].bitmap.is_none());
        assert!(strip.pending.is_empty());
    }

    #[test]
    fn select_scrolls_into_view() {
        let mut strip = ThumbnailStrip::new();
        strip.set_files(&files(100));

        strip.select(50, 400);
        assert_eq!(strip.selected(), Some(50));
        // slot 50 fully visible: [scroll, scroll + 400] covers its extent
        let left = 50.0 * SLOT_STRIDE as f32;
        assert!(strip.scroll <= left);
        assert!(left + SLOT_STRIDE as f32 <= strip.scroll + 400.0);

        strip.select(0, 400);
        assert_eq!(strip.scroll, 0.0);
    }

    #[test]
    fn selection_scroll_shifts_requested_range() {
        let mut strip = ThumbnailStrip::new();
        strip.set_files(&files(100));
        let before = ThumbnailStrip::visible_range(strip.scroll as u32, 400, 100);
        assert!(!before.contains(&50));

        // scroll-into-view must move the requested window immediately
        strip.select(50, 400);
        let after = ThumbnailStrip::visible_range(strip.scroll as u32, 400, 100);
        assert!(after.contains(&50));
    }

    #[test]
    fn select_out_of_bounds_is_ignored() {
        let mut strip = ThumbnailStrip::new();
        strip.set_files(&files(3));
        strip.select(1, 400);
        strip.select(99, 400);
        assert_eq!(strip.selected(), Some(1));
    }

    #[test]
    fn height_is_clamped() {
        let mut strip = ThumbnailStrip::new();
        strip.set_height(10);
        assert_eq!(strip.height(), MIN_HEIGHT);
        strip.set_height(5000);
        assert_eq!(strip.height(), MAX_HEIGHT);
        strip.set_height(150);
        assert_eq!(strip.height(), 150);
    }

    #[test]
    fn scroll_is_clamped() {
        let mut strip = ThumbnailStrip::new();
        strip.set_files(&files(10));
        strip.scroll_by(-100.0, 400);
        assert_eq!(strip.scroll, 0.0);
        strip.scroll_by(1.0e9, 400);
        assert_eq!(strip.scroll, (10 * SLOT_STRIDE - 400) as f32);
    }

    #[test]
    fn index_at_accounts_for_scroll() {
        let mut strip = ThumbnailStrip::new();
        strip.set_files(&files(10));
        assert_eq!(strip.index_at(0), Some(0));
        assert_eq!(strip.index_at(SLOT_STRIDE), Some(1));
        strip.scroll_by(SLOT_STRIDE as f32 * 2.0, 400);
        assert_eq!(strip.index_at(0), Some(2));
        assert_eq!(strip.index_at(4000), None);
    }

    #[test]
    fn gap_between_slots_hits_nothing() {
        let mut strip = ThumbnailStrip::new();
        strip.set_files(&files(10));
        assert_eq!(strip.index_at(SLOT_SIZE - 1), Some(0));
        assert_eq!(strip.index_at(SLOT_SIZE), None);
        assert_eq!(strip.index_at(SLOT_STRIDE - 1), None);
        assert_eq!(strip.index_at(SLOT_STRIDE), Some(1));
    }
}
