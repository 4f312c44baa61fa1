//! Adds a "download 3D model" control to product pages whose viewer streams a
//! binary glTF asset without ever linking it.
//!
//! The engine core (classification, discovery log, acquisition, download
//! planning, lifecycle) is target-independent and talks to the page through
//! the traits in [`page`], [`download`] and [`lifecycle`]. The `web` module
//! binds those traits to the browser on `wasm32`.

pub mod acquire;
pub mod classify;
pub mod config;
pub mod discovery;
pub mod download;
pub mod engine;
pub mod error;
pub mod filename;
pub mod lifecycle;
pub mod locale;
pub mod page;

#[cfg(target_arch = "wasm32")]
mod web;

pub use acquire::{Acquisition, PollPolicy, PollSession, Tick, Ticker, acquire, run_session};
pub use classify::is_asset_url;
pub use config::Config;
pub use discovery::{Capture, Channel, DiscoveryLog, Generation};
pub use download::{DownloadPlan, Transport, download};
pub use engine::{Engine, Grabbed};
pub use error::{GrabError, GrabResult};
pub use filename::derive_filename;
pub use lifecycle::{ControlHost, Injection, InjectionRetry, Lifecycle, ensure_control};
pub use page::Page;

// ── Web entry‑point ──
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    // Panic messages go to the browser console
    console_error_panic_hook::set_once();

    // Setup failures are logged, never thrown into the page.
    if let Err(e) = web::boot() {
        log::error!("glb-grabber disabled: {e:#}");
    }
}

// Runs a future on the page's event loop
#[cfg(target_arch = "wasm32")]
fn execute<F: std::future::Future<Output = ()> + 'static>(f: F) {
    wasm_bindgen_futures::spawn_local(f);
}
