//! Browser host: drives the session from requestAnimationFrame, forwards taps, and
//! hands each frame to the page's renderer callback. Drawing, audio and the HUD
//! markup all live on the JS side.
use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::window;

use crate::providers::{JsFeedbackProvider, JsObjectProvider, fetch_feedback, fetch_object};
use crate::session::{FeedbackRequest, Frame, GamePhase, Session, TapResult};
use crate::storage::{LocalStorageStore, STORAGE_NAMESPACE};

// Presentation delays (ms). Taps are ignored while the page animates.
const START_FADE_MS: f64 = 600.0;
const HIT_LOCKOUT_MS: f64 = 1000.0; // flash 400 + fade 600
const RESET_LOCKOUT_MS: f64 = 800.0;
const FEEDBACK_LINGER_MS: f64 = 3000.0;

/// Per-frame ring values passed to the renderer callback.
#[wasm_bindgen]
#[derive(Clone, Copy, Debug)]
pub struct RingFrame {
    pub scale: f64,
    pub rotation: f64,
    #[wasm_bindgen(js_name = inZone)]
    pub in_zone: bool,
    #[wasm_bindgen(js_name = outlineOnly)]
    pub outline_only: bool,
}

impl From<Frame> for RingFrame {
    fn from(f: Frame) -> Self {
        Self {
            scale: f.scale,
            rotation: f.rotation,
            in_zone: f.in_zone,
            outline_only: f.outline_only,
        }
    }
}

/// Everything the HUD shows, read on demand via `snapshot()`.
#[wasm_bindgen(getter_with_clone)]
#[derive(Clone, Debug)]
pub struct HudSnapshot {
    pub playing: bool,
    pub level: u32,
    pub streak: u32,
    pub best: u32,
    pub stability: u32,
    #[wasm_bindgen(js_name = isBreak)]
    pub is_break: bool,
    #[wasm_bindgen(js_name = apiStatus)]
    pub api_status: String,
    pub emoji: String,
    pub name: String,
    pub color: String,
    pub mantra: String,
    pub feedback: Option<String>,
}

struct Host {
    session: Session<LocalStorageStore>,
    renderer: js_sys::Function,
    feedback: Option<Rc<JsFeedbackProvider>>,
    objects: Option<Rc<JsObjectProvider>>,
    locked_until_ms: f64,
    feedback_clear_at_ms: Option<f64>,
}

thread_local! {
    static HOST: RefCell<Option<Host>> = const { RefCell::new(None) };
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// Install the session and start the frame loop. `renderer(frame)` is called on
/// every animation frame; the provider functions are optional.
pub fn start(
    renderer: js_sys::Function,
    feedback: Option<js_sys::Function>,
    objects: Option<js_sys::Function>,
) -> Result<(), JsValue> {
    let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let doc = win
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let host = Host {
        session: Session::new(LocalStorageStore::new(STORAGE_NAMESPACE)),
        renderer,
        feedback: feedback.map(|f| Rc::new(JsFeedbackProvider::new(f))),
        objects: objects.map(|f| Rc::new(JsObjectProvider::new(f))),
        locked_until_ms: 0.0,
        feedback_clear_at_ms: None,
    };
    HOST.with(|h| h.replace(Some(host)));

    {
        let closure = Closure::wrap(Box::new(move |_evt: web_sys::MouseEvent| {
            handle_tap(crate::performance_now());
        }) as Box<dyn FnMut(_)>);
        doc.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    start_frame_loop();
    Ok(())
}

fn start_frame_loop() {
    let f: FrameCallback = Rc::new(RefCell::new(None));
    let g = f.clone();
    *g.borrow_mut() = Some(Closure::wrap(Box::new(move |ts: f64| {
        host_tick(ts);
        if let (Some(w), Some(cb)) = (window(), f.borrow().as_ref()) {
            let _ = w.request_animation_frame(cb.as_ref().unchecked_ref());
        }
    }) as Box<dyn FnMut(f64)>));
    if let (Some(w), Some(cb)) = (window(), g.borrow().as_ref()) {
        let _ = w.request_animation_frame(cb.as_ref().unchecked_ref());
    }
}

fn host_tick(now: f64) {
    // Collect work under the borrow, run JS callbacks after releasing it so the
    // renderer may call back into `snapshot()`.
    let work = HOST.with(|cell| {
        let mut guard = cell.borrow_mut();
        let host = guard.as_mut()?;
        if host.feedback_clear_at_ms.is_some_and(|at| now >= at) {
            host.session.clear_feedback();
            host.feedback_clear_at_ms = None;
        }
        let frame = host.session.tick(now)?;
        let prefetch = match &host.objects {
            Some(provider) => host
                .session
                .begin_prefetch()
                .map(|ticket| (provider.clone(), ticket)),
            None => None,
        };
        Some((host.renderer.clone(), RingFrame::from(frame), prefetch))
    });
    let Some((renderer, frame, prefetch)) = work else {
        return;
    };

    if let Err(e) = renderer.call1(&JsValue::NULL, &JsValue::from(frame)) {
        console_warn!("renderer failed: {e:?}");
    }

    if let Some((provider, ticket)) = prefetch {
        spawn_local(async move {
            let result = fetch_object(&*provider, &ticket.excluded).await;
            HOST.with(|cell| {
                if let Some(host) = cell.borrow_mut().as_mut() {
                    if !host.session.complete_prefetch(ticket, result) {
                        console_log!("dropped object fetched for a finished run");
                    }
                }
            });
        });
    }
}

fn handle_tap(now: f64) {
    let request = HOST.with(|cell| {
        let mut guard = cell.borrow_mut();
        let host = guard.as_mut()?;
        tap_locked(host, now)
    });
    let Some((request, provider)) = request else {
        return;
    };
    spawn_local(async move {
        let result = fetch_feedback(&*provider, request.accuracy, request.level).await;
        HOST.with(|cell| {
            if let Some(host) = cell.borrow_mut().as_mut() {
                host.session.apply_feedback(&request, result);
            }
        });
    });
}

fn tap_locked(host: &mut Host, now: f64) -> Option<(FeedbackRequest, Rc<JsFeedbackProvider>)> {
    if now < host.locked_until_ms {
        return None;
    }
    match host.session.tap() {
        TapResult::Hit { .. } => {
            host.locked_until_ms = now + HIT_LOCKOUT_MS;
            host.feedback_clear_at_ms = Some(now + HIT_LOCKOUT_MS + FEEDBACK_LINGER_MS);
            let request = host.session.take_feedback_request()?;
            Some((request, host.feedback.clone()?))
        }
        TapResult::Reset { .. } => {
            host.locked_until_ms = now + RESET_LOCKOUT_MS;
            host.feedback_clear_at_ms = Some(now + RESET_LOCKOUT_MS + FEEDBACK_LINGER_MS);
            None
        }
        TapResult::Miss { .. } | TapResult::Ignored => None,
    }
}

fn with_host<R>(f: impl FnOnce(&mut Host) -> R) -> Option<R> {
    HOST.with(|cell| cell.borrow_mut().as_mut().map(f))
}

#[wasm_bindgen]
pub fn begin_session() {
    let now = crate::performance_now();
    with_host(|host| {
        host.session.start();
        // the click that pressed "begin" is still bubbling to the document
        host.locked_until_ms = now + START_FADE_MS;
    });
}

#[wasm_bindgen]
pub fn slower() {
    with_host(|host| host.session.slower());
}

#[wasm_bindgen]
pub fn faster() {
    with_host(|host| host.session.faster());
}

#[wasm_bindgen]
pub fn reverse() {
    with_host(|host| host.session.reverse());
}

/// Call after the player picked a personal API key.
#[wasm_bindgen]
pub fn credential_updated() {
    with_host(|host| host.session.credential_updated());
}

/// Call when the page becomes visible again after the frame loop was throttled.
#[wasm_bindgen]
pub fn resync_clock() {
    with_host(|host| host.session.resync_clock());
}

#[wasm_bindgen]
pub fn snapshot() -> Option<HudSnapshot> {
    with_host(|host| {
        let s = &host.session;
        let stats = s.stats();
        let obj = s.current_object();
        HudSnapshot {
            playing: s.phase() == GamePhase::Playing,
            level: stats.level,
            streak: stats.streak,
            best: stats.high_score,
            stability: stats.stability(),
            is_break: s.difficulty().is_break,
            api_status: s.api_status().as_str().to_string(),
            emoji: obj.emoji.clone(),
            name: obj.name.clone(),
            color: obj.color.clone(),
            mantra: obj.mantra.clone(),
            feedback: s.feedback().map(str::to_string),
        }
    })
}
