use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use softbuffer::Surface;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window, WindowId};

use crate::cache::ThumbnailCache;
use crate::compress::CompressSettings;
use crate::loader;
use crate::media::{self, MediaFile, MediaKind};
use crate::ui::strip::{HANDLE_HEIGHT, ThumbnailStrip};
use crate::ui::viewer::ViewerState;
use crate::worker::{UserEvent, WorkerPool};

pub mod render;
pub mod strip;
pub mod viewer;

// ---------------------------------------------------------------------------
// Application handler (winit 0.30 style)
// ---------------------------------------------------------------------------

const INFO_BAR_HEIGHT: u32 = 28;
/// How often the strip re-checks what is visible and schedules decodes.
const TICK: Duration = Duration::from_millis(100);
const STATUS_LIFETIME: Duration = Duration::from_secs(5);
const DOUBLE_CLICK: Duration = Duration::from_millis(400);
const WHEEL_SCROLL_PX: f32 = 60.0;

#[derive(Clone, Copy, PartialEq)]
enum Drag {
    None,
    Pan,
    StripResize { start_y: f64, start_height: u32 },
}

struct Layout {
    info_h: u32,
    viewer_top: u32,
    viewer_h: u32,
    strip_top: u32,
    show_strip: bool,
}

pub struct App {
    files: Vec<MediaFile>,
    current: usize,
    viewer: ViewerState,
    strip: ThumbnailStrip,
    cache: Arc<ThumbnailCache>,
    pool: WorkerPool,
    proxy: EventLoopProxy<UserEvent>,
    compress: CompressSettings,

    show_info: bool,
    fullscreen: bool,
    /// Message shown when the current file could not be displayed.
    error_message: Option<String>,
    /// Transient one-liner (compression results), with its birth time.
    status: Option<(String, Instant)>,
    current_file_size: u64,

    mouse_pos: (f64, f64),
    drag: Drag,
    last_click: Option<(Instant, (f64, f64))>,

    window: Option<Arc<Window>>,
    context: Option<softbuffer::Context<Arc<Window>>>,
    surface: Option<Surface<Arc<Window>, Arc<Window>>>,
    next_tick: Option<Instant>,
}

impl App {
    pub fn new(
        files: Vec<MediaFile>,
        start: usize,
        cache: Arc<ThumbnailCache>,
        pool: WorkerPool,
        proxy: EventLoopProxy<UserEvent>,
        compress: CompressSettings,
    ) -> App {
        let mut strip = ThumbnailStrip::new();
        strip.set_files(&files);
        App {
            files,
            current: start,
            viewer: ViewerState::new(),
            strip,
            cache,
            pool,
            proxy,
            compress,
            show_info: true,
            fullscreen: false,
            error_message: None,
            status: None,
            current_file_size: 0,
            mouse_pos: (0.0, 0.0),
            drag: Drag::None,
            last_click: None,
            window: None,
            context: None,
            surface: None,
            next_tick: None,
        }
    }

    fn layout(&self, fb_h: u32) -> Layout {
        let info_h = if self.show_info && !self.fullscreen {
            INFO_BAR_HEIGHT
        } else {
            0
        };
        let show_strip = !self.fullscreen && !self.files.is_empty();
        let strip_h = if show_strip { self.strip.height() } else { 0 };
        let viewer_h = fb_h.saturating_sub(info_h + strip_h).max(1);
        Layout {
            info_h,
            viewer_top: info_h,
            viewer_h,
            strip_top: fb_h.saturating_sub(strip_h),
            show_strip,
        }
    }

    fn fb_size(&self) -> (u32, u32) {
        match &self.window {
            Some(w) => {
                let size = w.inner_size();
                (size.width.max(1), size.height.max(1))
            }
            None => (1280, 720),
        }
    }

    fn request_redraw(&self) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    /// Jump to a file by index: update selection, load it on this thread and
    /// hand it to the viewer.
    fn navigate_to(&mut self, index: usize) {
        if self.files.is_empty() {
            return;
        }
        let index = index.min(self.files.len() - 1);
        self.current = index;
        let (fb_w, _) = self.fb_size();
        self.strip.select(index, fb_w);
        // Selection may have scrolled the strip; request thumbnails now
        // instead of waiting for the next tick
        self.poll_strip();
        self.load_current();
        self.request_redraw();
    }

    fn navigate_by(&mut self, delta: i64) {
        if self.files.is_empty() {
            return;
        }
        let target = (self.current as i64 + delta).clamp(0, self.files.len() as i64 - 1);
        self.navigate_to(target as usize);
    }

    fn load_current(&mut self) {
        let Some(file) = self.files.get(self.current) else {
            return;
        };
        self.current_file_size = std::fs::metadata(&file.path).map(|m| m.len()).unwrap_or(0);

        if file.kind == MediaKind::Video {
            self.viewer.clear();
            self.error_message = Some("Video playback is not supported".to_string());
            return;
        }

        match loader::load(&file.path, None) {
            Ok(bitmap) => {
                self.viewer.set_image(Arc::new(bitmap));
                self.error_message = None;
            }
            Err(e) => {
                log::warn!("cannot load {}: {}", file.path.display(), e);
                self.viewer.clear();
                self.error_message = Some(format!("Could not load: {}", e));
            }
        }
    }

    fn toggle_fullscreen(&mut self) {
        self.fullscreen = !self.fullscreen;
        if let Some(ref window) = self.window {
            if self.fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            } else {
                window.set_fullscreen(None);
            }
        }
        self.request_redraw();
    }

    fn compress_current(&mut self) {
        let Some(file) = self.files.get(self.current) else {
            return;
        };
        if file.kind != MediaKind::Image {
            self.set_status("Only images can be compressed".to_string());
            return;
        }
        let request = self.compress.request_for(file.path.clone());
        self.set_status(format!("Compressing {}...", file_name(&request.input)));
        self.pool.spawn_compress(request, self.proxy.clone());
    }

    fn set_status(&mut self, message: String) {
        self.status = Some((message, Instant::now()));
        self.request_redraw();
    }

    fn viewer_size(&self) -> (f32, f32) {
        let (fb_w, fb_h) = self.fb_size();
        let layout = self.layout(fb_h);
        (fb_w as f32, layout.viewer_h as f32)
    }

    fn handle_key(&mut self, key: &Key, event_loop: &ActiveEventLoop) {
        let Some(action) = key_action(key) else {
            return;
        };
        let (vw, vh) = self.viewer_size();
        match action {
            KeyAction::NextFile => self.navigate_by(1),
            KeyAction::PrevFile => self.navigate_by(-1),
            KeyAction::FirstFile => self.navigate_to(0),
            KeyAction::LastFile => self.navigate_to(self.files.len().saturating_sub(1)),
            KeyAction::ToggleFullscreen => self.toggle_fullscreen(),
            KeyAction::ZoomIn => self.viewer.zoom_in(vw, vh),
            KeyAction::ZoomOut => self.viewer.zoom_out(vw, vh),
            KeyAction::ZoomFit => self.viewer.zoom_fit(),
            KeyAction::ZoomActual => self.viewer.zoom_actual(),
            KeyAction::ToggleInfo => self.show_info = !self.show_info,
            KeyAction::Compress => self.compress_current(),
            KeyAction::Quit => event_loop.exit(),
        }
        self.request_redraw();
    }

    fn handle_mouse_down(&mut self) {
        let (x, y) = self.mouse_pos;
        let (_, fb_h) = self.fb_size();
        let layout = self.layout(fb_h);
        let now = Instant::now();

        // Double click anywhere toggles fullscreen
        if let Some((when, (px, py))) = self.last_click {
            if now.duration_since(when) < DOUBLE_CLICK
                && (x - px).abs() < 4.0
                && (y - py).abs() < 4.0
            {
                self.last_click = None;
                self.toggle_fullscreen();
                return;
            }
        }
        self.last_click = Some((now, (x, y)));

        if layout.show_strip && y >= layout.strip_top as f64 {
            if y < (layout.strip_top + HANDLE_HEIGHT) as f64 {
                self.drag = Drag::StripResize {
                    start_y: y,
                    start_height: self.strip.height(),
                };
            } else if let Some(index) = self.strip.index_at(x.max(0.0) as u32) {
                self.navigate_to(index);
            }
            return;
        }
        if y >= layout.viewer_top as f64 {
            self.drag = Drag::Pan;
        }
    }

    fn handle_mouse_move(&mut self, x: f64, y: f64) {
        let (dx, dy) = (x - self.mouse_pos.0, y - self.mouse_pos.1);
        self.mouse_pos = (x, y);
        match self.drag {
            Drag::Pan => {
                self.viewer.pan_by(dx as f32, dy as f32);
                self.request_redraw();
            }
            Drag::StripResize {
                start_y,
                start_height,
            } => {
                // Dragging the handle up grows the strip
                let new_height = start_height as i64 + (start_y - y) as i64;
                self.strip.set_height(new_height.max(0) as u32);
                self.request_redraw();
            }
            Drag::None => {}
        }
    }

    fn handle_wheel(&mut self, amount: f32) {
        let (fb_w, fb_h) = self.fb_size();
        let layout = self.layout(fb_h);
        if layout.show_strip && self.mouse_pos.1 >= layout.strip_top as f64 {
            self.strip.scroll_by(-amount * WHEEL_SCROLL_PX, fb_w);
            self.poll_strip();
        } else if amount > 0.0 {
            let (vw, vh) = self.viewer_size();
            self.viewer.zoom_in(vw, vh);
        } else if amount < 0.0 {
            let (vw, vh) = self.viewer_size();
            self.viewer.zoom_out(vw, vh);
        }
        self.request_redraw();
    }

    /// Ask the strip to fill in whatever is visible now.
    fn poll_strip(&mut self) {
        let (fb_w, _) = self.fb_size();
        if self
            .strip
            .request_visible(&self.cache, &self.pool, &self.proxy, fb_w)
        {
            self.request_redraw();
        }
    }

    fn render(&mut self, fb_w: u32, fb_h: u32) {
        let layout = self.layout(fb_h);
        let info_text = (layout.info_h > 0).then(|| self.info_bar_text(fb_w, layout.viewer_h));

        // Expire the status line before borrowing the frame
        if self
            .status
            .as_ref()
            .is_some_and(|(_, when)| when.elapsed() >= STATUS_LIFETIME)
        {
            self.status = None;
        }

        let Some(ref mut surface) = self.surface else {
            return;
        };
        let Ok(mut buffer) = surface.buffer_mut() else {
            return;
        };
        let frame = &mut buffer[..];

        let [r, g, b, _] = render::BG_COLOR;
        frame.fill(render::rgb(r, g, b));

        self.viewer
            .render(frame, fb_w, fb_h, (layout.viewer_top, layout.viewer_h));

        if let Some(ref msg) = self.error_message {
            let tx = (fb_w as i32 - render::text_width(msg, 2)) / 2;
            let ty = (layout.viewer_top + layout.viewer_h / 2) as i32;
            render::draw_text(frame, fb_w, fb_h, msg, tx.max(4), ty, 2, (255, 120, 120, 255));
        } else if self.files.is_empty() {
            let msg = "No media files";
            let tx = (fb_w as i32 - render::text_width(msg, 2)) / 2;
            render::draw_text(frame, fb_w, fb_h, msg, tx, fb_h as i32 / 2, 2, (160, 160, 160, 255));
        }

        if layout.show_strip {
            self.strip.render(frame, fb_w, fb_h, layout.strip_top);
        }

        if let Some(text) = info_text {
            render::fill_rect(
                frame,
                fb_w,
                fb_h,
                0,
                0,
                fb_w,
                INFO_BAR_HEIGHT,
                render::INFO_BG_COLOR.into(),
            );
            render::draw_text(frame, fb_w, fb_h, &text, 10, 7, 2, (235, 235, 235, 255));
        }

        if let Some((ref msg, _)) = self.status {
            let ty = layout.strip_top as i32 - 22;
            render::fill_rect(frame, fb_w, fb_h, 0, ty - 4, fb_w, 22, (0, 0, 0, 178));
            render::draw_text(frame, fb_w, fb_h, msg, 10, ty, 2, (255, 255, 255, 255));
        }

        let _ = buffer.present();
    }

    fn info_bar_text(&self, fb_w: u32, viewer_h: u32) -> String {
        match self.files.get(self.current) {
            Some(file) => {
                let dims = match self.viewer.bitmap() {
                    Some(bmp) => format!("{}x{}", bmp.width, bmp.height),
                    None => match loader::image_info(&file.path) {
                        (0, _, _) => "-".to_string(),
                        (w, h, _) => format!("{}x{}", w, h),
                    },
                };
                let zoom = self.viewer.zoom_percent(fb_w as f32, viewer_h as f32);
                let mode = if self.viewer.is_fit_mode() { " (fit)" } else { "" };
                format!(
                    "[{}/{}] {} | {} | {} | zoom {}%{} | cache {:.0}/{:.0}MB",
                    self.current + 1,
                    self.files.len(),
                    file_name(&file.path),
                    dims,
                    media::format_file_size(self.current_file_size),
                    zoom,
                    mode,
                    self.cache.memory_used() as f64 / (1024.0 * 1024.0),
                    self.cache.max_memory_bytes() as f64 / (1024.0 * 1024.0),
                )
            }
            None => "No media files".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    NextFile,
    PrevFile,
    FirstFile,
    LastFile,
    ZoomIn,
    ZoomOut,
    ZoomFit,
    ZoomActual,
    ToggleFullscreen,
    ToggleInfo,
    Compress,
    Quit,
}

/// Keyboard bindings. Both F11 and Esc toggle fullscreen.
fn key_action(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::ArrowRight) => Some(KeyAction::NextFile),
        Key::Named(NamedKey::ArrowLeft) => Some(KeyAction::PrevFile),
        Key::Named(NamedKey::Home) => Some(KeyAction::FirstFile),
        Key::Named(NamedKey::End) => Some(KeyAction::LastFile),
        Key::Named(NamedKey::F11) | Key::Named(NamedKey::Escape) => {
            Some(KeyAction::ToggleFullscreen)
        }
        Key::Character(s) => match s.chars().next()?.to_ascii_lowercase() {
            '+' | '=' => Some(KeyAction::ZoomIn),
            '-' => Some(KeyAction::ZoomOut),
            '0' => Some(KeyAction::ZoomFit),
            '1' => Some(KeyAction::ZoomActual),
            'i' => Some(KeyAction::ToggleInfo),
            'c' => Some(KeyAction::Compress),
            'q' => Some(KeyAction::Quit),
            _ => None,
        },
        _ => None,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title("lv")
            .with_inner_size(LogicalSize::new(1280u32, 720u32));
        let window = Arc::new(event_loop.create_window(attrs).expect("create window"));
        let context = softbuffer::Context::new(Arc::clone(&window)).expect("create context");
        let surface = Surface::new(&context, Arc::clone(&window)).expect("create surface");

        window.request_redraw();
        self.window = Some(window);
        self.context = Some(context);
        self.surface = Some(surface);

        if !self.files.is_empty() {
            self.navigate_to(self.current);
            self.poll_strip();
        }
        self.next_tick = Some(Instant::now() + TICK);
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::ThumbnailReady(path) => {
                if self.strip.on_thumbnail_ready(&path, &self.cache) {
                    self.request_redraw();
                }
            }
            UserEvent::ThumbnailFailed(path, message) => {
                log::debug!("thumbnail failed for {}: {}", path.display(), message);
                self.strip.on_thumbnail_failed(&path);
            }
            UserEvent::CompressDone(outcome) => {
                if outcome.succeeded() {
                    let output = outcome.output.as_deref().unwrap_or(Path::new("?"));
                    self.set_status(format!(
                        "Saved {} ({} -> {}, -{:.0}%)",
                        file_name(output),
                        media::format_file_size(outcome.original_bytes),
                        media::format_file_size(outcome.compressed_bytes),
                        outcome.reduction_percent(),
                    ));
                    log::info!("compressed {} to {}", outcome.input.display(), output.display());
                } else {
                    let reason = outcome.error.unwrap_or_default();
                    self.set_status(format!("Compression failed: {}", reason));
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(PhysicalSize { width, height }) => {
                let w = width.max(1);
                let h = height.max(1);
                if let Some(ref mut surface) = self.surface {
                    if let (Some(nw), Some(nh)) =
                        (std::num::NonZeroU32::new(w), std::num::NonZeroU32::new(h))
                    {
                        let _ = surface.resize(nw, nh);
                    }
                }
                self.poll_strip();
                self.request_redraw();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    let key = event.logical_key.clone();
                    self.handle_key(&key, event_loop);
                }
            }

            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    if state == ElementState::Pressed {
                        self.handle_mouse_down();
                    } else {
                        self.drag = Drag::None;
                    }
                }
            }

            WindowEvent::CursorMoved {
                position: PhysicalPosition { x, y },
                ..
            } => {
                self.handle_mouse_move(x, y);
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => y as f32 / 40.0,
                };
                if y != 0.0 {
                    self.handle_wheel(y);
                }
            }

            WindowEvent::RedrawRequested => {
                let (fb_w, fb_h) = self.fb_size();
                self.render(fb_w, fb_h);
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        match self.next_tick {
            Some(when) if Instant::now() >= when => {
                self.poll_strip();
                let next = Instant::now() + TICK;
                self.next_tick = Some(next);
                event_loop.set_control_flow(ControlFlow::WaitUntil(next));
            }
            Some(when) => {
                event_loop.set_control_flow(ControlFlow::WaitUntil(when));
            }
            None => {
                event_loop.set_control_flow(ControlFlow::Wait);
            }
        }
    }
}
