mod cache;
mod cli;
mod compress;
mod loader;
mod media;
mod ui;
mod worker;

use std::sync::Arc;

use clap::Parser;
use winit::event_loop::EventLoop;

use crate::cache::ThumbnailCache;
use crate::cli::Cli;
use crate::ui::App;
use crate::worker::{UserEvent, WorkerPool};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    // No argument opens an empty window
    let (files, start) = match &cli.path {
        Some(path) => media::open_target(path),
        None => (Vec::new(), 0),
    };
    if let Some(path) = &cli.path {
        if files.is_empty() {
            log::warn!("no media files in {}", path.display());
        }
    }

    let cache = Arc::new(ThumbnailCache::new(cli.cache_items, cli.memory_budget()));
    let pool = WorkerPool::new(cli.threads.unwrap_or_else(WorkerPool::default_threads));

    let event_loop = EventLoop::<UserEvent>::with_user_event()
        .build()
        .expect("create event loop");
    let proxy = event_loop.create_proxy();

    let mut app = App::new(files, start, cache, pool, proxy, cli.compress_settings());
    event_loop.run_app(&mut app).expect("run event loop");
}
