//! Browser console logging. Native builds (tests) get no-op stand-ins so pure
//! game logic can log without touching JS imports.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    pub fn log(s: &str);
    #[wasm_bindgen(js_namespace = console)]
    pub fn warn(s: &str);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn log(_s: &str) {}

#[cfg(not(target_arch = "wasm32"))]
pub fn warn(_s: &str) {}

macro_rules! console_log {
    ($($t:tt)*) => { $crate::console::log(&format!($($t)*)) };
}

macro_rules! console_warn {
    ($($t:tt)*) => { $crate::console::warn(&format!($($t)*)) };
}
