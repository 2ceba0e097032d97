/// WebTiles - background service worker core
/// Built with Rust + WASM
///
/// Tracks which browser frame hosts which dashboard widget and injects each
/// widget's custom CSS into its frame.

pub mod chrome;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod frame_data;
pub mod host;
pub mod messages;
pub mod normalize;
pub mod registry;
mod storage;
pub mod workspace;

#[cfg(test)]
mod test_support;

use wasm_bindgen::prelude::*;

pub use chrome::{Background, Workspaces};
pub use coordinator::{Coordinator, CssOutcome, Injection};

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
}

// Re-export URL normalization for the dashboard
#[wasm_bindgen]
pub fn normalize_url(url: &str) -> String {
    normalize::normalize_url(url)
}
