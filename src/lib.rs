//! ZenPulse core crate.
//!
//! A ring pulses and rotates around a collectible object; tap while the ring sits
//! on the guide ring to advance a level. The pulse engine and session state
//! machine are plain Rust (testable natively); the `app` module is the thin
//! wasm-bindgen host that drives them from `requestAnimationFrame`.

use wasm_bindgen::prelude::*;

#[macro_use]
mod console;

mod app;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod providers;
pub mod session;
pub mod storage;

pub use app::{HudSnapshot, RingFrame, snapshot};
pub use catalog::{MINDFUL_OBJECTS, MindfulObject};
pub use engine::{DifficultyProfile, PulseState, RuntimeModifiers, SessionStats, TapOutcome};
pub use error::{ProviderError, StorageError};
pub use session::{ApiStatus, Frame, GamePhase, Session, TapResult};

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

// -----------------------------------------------------------------------------
// Unified entrypoint
// -----------------------------------------------------------------------------

/// `renderer(frame)` receives a [`RingFrame`] every animation frame.
/// `feedback(accuracy, level)` and `objects(excludedEmojis)` return Promises and
/// may be omitted, in which case canned text and the local catalog are used.
#[wasm_bindgen]
pub fn start_game(
    renderer: js_sys::Function,
    feedback: Option<js_sys::Function>,
    objects: Option<js_sys::Function>,
) -> Result<(), JsValue> {
    app::start(renderer, feedback, objects)
}

fn performance_now() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}
