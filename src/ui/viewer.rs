use std::sync::Arc;

use crate::loader::Bitmap;
use crate::ui::render;

// ---------------------------------------------------------------------------
// Zoom / pan state for the single-image view
// ---------------------------------------------------------------------------

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 10.0;
pub const ZOOM_STEP: f32 = 1.15;

/// Zoom and pan over the currently displayed bitmap.
///
/// Two modes: fit (auto-scale to contain, never above 100%, recomputed from
/// the viewport every draw) and manual (explicit zoom + pan). The viewer
/// knows nothing about the file list; navigation intent is the shell's job.
pub struct ViewerState {
    bitmap: Option<Arc<Bitmap>>,
    zoom: f32,
    fit_mode: bool,
    pan_x: f32,
    pan_y: f32,
}

impl ViewerState {
    pub fn new() -> ViewerState {
        ViewerState {
            bitmap: None,
            zoom: 1.0,
            fit_mode: true,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }

    /// Show a new image: back to fit mode with zoom and pan reset.
    pub fn set_image(&mut self, bitmap: Arc<Bitmap>) {
        self.bitmap = Some(bitmap);
        self.zoom = 1.0;
        self.fit_mode = true;
        self.pan_x = 0.0;
        self.pan_y = 0.0;
    }

    pub fn clear(&mut self) {
        self.bitmap = None;
    }

    pub fn bitmap(&self) -> Option<&Arc<Bitmap>> {
        self.bitmap.as_ref()
    }

    pub fn is_fit_mode(&self) -> bool {
        self.fit_mode
    }

    /// Scale that contains the bitmap in the viewport without upscaling.
    pub fn fit_zoom(&self, viewport_w: f32, viewport_h: f32) -> f32 {
        match &self.bitmap {
            Some(bmp) => {
                render::fit_scale(bmp.width as f32, bmp.height as f32, viewport_w, viewport_h)
                    .min(1.0)
            }
            None => 1.0,
        }
    }

    pub fn effective_zoom(&self, viewport_w: f32, viewport_h: f32) -> f32 {
        if self.fit_mode {
            self.fit_zoom(viewport_w, viewport_h)
        } else {
            self.zoom
        }
    }

    pub fn zoom_percent(&self, viewport_w: f32, viewport_h: f32) -> u32 {
        (self.effective_zoom(viewport_w, viewport_h) * 100.0).round() as u32
    }

    /// Leaving fit mode starts from the fit-derived zoom, so the first step
    /// feels continuous instead of jumping to 100%.
    pub fn zoom_in(&mut self, viewport_w: f32, viewport_h: f32) {
        if self.fit_mode {
            self.zoom = self.fit_zoom(viewport_w, viewport_h);
            self.fit_mode = false;
        }
        self.zoom = (self.zoom * ZOOM_STEP).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self, viewport_w: f32, viewport_h: f32) {
        if self.fit_mode {
            self.zoom = self.fit_zoom(viewport_w, viewport_h);
            self.fit_mode = false;
        }
        self.zoom = (self.zoom / ZOOM_STEP).max(MIN_ZOOM);
    }

    pub fn zoom_fit(&mut self) {
        self.fit_mode = true;
        self.pan_x = 0.0;
        self.pan_y = 0.0;
    }

    pub fn zoom_actual(&mut self) {
        self.fit_mode = false;
        self.zoom = 1.0;
        self.pan_x = 0.0;
        self.pan_y = 0.0;
    }

    /// Drag pan. Asserting manual control leaves the zoom value untouched;
    /// only the mode and the offset change.
    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan_x += dx;
        self.pan_y += dy;
        self.fit_mode = false;
    }

    /// Target rectangle for the bitmap: scaled size, centered in the
    /// viewport, then shifted by the pan offset.
    pub fn draw_rect(&self, viewport_w: f32, viewport_h: f32) -> Option<(f32, f32, f32, f32)> {
        let bmp = self.bitmap.as_ref()?;
        let zoom = self.effective_zoom(viewport_w, viewport_h);
        let w = bmp.width as f32 * zoom;
        let h = bmp.height as f32 * zoom;
        let x = (viewport_w - w) / 2.0 + self.pan_x;
        let y = (viewport_h - h) / 2.0 + self.pan_y;
        Some((x, y, w, h))
    }

    /// Draw the current bitmap into the viewer region of the framebuffer.
    /// `region` is (top, height) in framebuffer rows; x spans the full width.
    pub fn render(&self, frame: &mut [u32], fb_w: u32, fb_h: u32, region: (u32, u32)) {
        let (top, height) = region;
        let Some(bmp) = self.bitmap.as_ref() else {
            return;
        };
        let Some((x, y, _, _)) = self.draw_rect(fb_w as f32, height as f32) else {
            return;
        };
        let zoom = self.effective_zoom(fb_w as f32, height as f32);
        render::blit_scaled(
            frame,
            fb_w,
            fb_h,
            bmp,
            x,
            y + top as f32,
            zoom,
            Some((top, (top + height).min(fb_h))),
        );
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
    fn fit_zoom_half_for_wide_image() {
        let mut v = ViewerState::new();
        v.set_image(bitmap(1000, 500));
        assert_eq!(v.fit_zoom(500.0, 500.0), 0.5);
    }

    #[test]
    fn fit_zoom_never_upscales() {
        let mut v = ViewerState::new();
        v.set_image(bitmap(100, 100));
        assert_eq!(v.fit_zoom(500.0, 500.0), 1.0);
    }

    #[test]
    fn zoom_in_is_clamped() {
        let mut v = ViewerState::new();
        v.set_image(bitmap(100, 100));
        for _ in 0..100 {
            v.zoom_in(500.0, 500.0);
        }
        assert!(v.effective_zoom(500.0, 500.0) <= MAX_ZOOM);
        assert_eq!(v.effective_zoom(500.0, 500.0), MAX_ZOOM);
    }

    #[test]
    fn zoom_out_is_clamped() {
        let mut v = ViewerState::new();
        v.set_image(bitmap(100, 100));
        for _ in 0..100 {
            v.zoom_out(500.0, 500.0);
        }
        assert_eq!(v.effective_zoom(500.0, 500.0), MIN_ZOOM);
    }

    #[test]
    fn first_zoom_step_starts_from_fit() {
        let mut v = ViewerState::new();
        v.set_image(bitmap(1000, 500));
        v.zoom_in(500.0, 500.0);
        let z = v.effective_zoom(500.0, 500.0);
        assert!(!v.is_fit_mode());
        assert!((z - 0.5 * ZOOM_STEP).abs() < 1e-5);
    }

    #[test]
    fn pan_forces_manual_mode_but_keeps_zoom() {
        let mut v = ViewerState::new();
        v.set_image(bitmap(100, 100));
        assert!(v.is_fit_mode());
        v.pan_by(10.0, -5.0);
        assert!(!v.is_fit_mode());
        // zoom value untouched from the set_image reset
        assert_eq!(v.effective_zoom(500.0, 500.0), 1.0);
        let (x, y, _, _) = v.draw_rect(500.0, 500.0).unwrap();
        assert_eq!((x, y), (210.0, 195.0));
    }

    #[test]
    fn set_image_resets_state() {
        let mut v = ViewerState::new();
        v.set_image(bitmap(100, 100));
        v.zoom_actual();
        v.pan_by(50.0, 50.0);
        v.set_image(bitmap(200, 200));
        assert!(v.is_fit_mode());
        let (x, y, w, h) = v.draw_rect(500.0, 500.0).unwrap();
        assert_eq!((x, y, w, h), (150.0, 150.0, 200.0, 200.0));
    }

    #[test]
    fn zoom_actual_is_one_to_one() {
        let mut v = ViewerState::new();
        v.set_image(bitmap(1000, 1000));
        v.zoom_actual();
        assert_eq!(v.effective_zoom(500.0, 500.0), 1.0);
        assert_eq!(v.zoom_percent(500.0, 500.0), 100);
    }
}
