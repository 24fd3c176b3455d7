//! Game-level state machine around the pulse engine.
//!
//! `Start -> Playing`, then every tap is a hit (next level, next object) or a miss;
//! the tenth miss collapses the run back to a fresh level 1 while keeping the best
//! streak. The session also owns object progression and the bookkeeping for the
//! asynchronous providers: every async call carries the session generation it was
//! issued under, and results from an older generation are dropped.

use std::collections::HashSet;

use crate::catalog::{MINDFUL_OBJECTS, MindfulObject, catalog_object, fallback_object, starting_object};
use crate::engine::{
    BASE_DIFFICULTY, DifficultyProfile, PulseState, RuntimeModifiers, SessionStats, advance,
    compute_difficulty, evaluate_tap, on_hit, on_miss,
};
use crate::error::ProviderError;
use crate::storage::HighScoreStore;

/// Player-facing speed step for the slower / faster controls.
pub const USER_SPEED_STEP: f64 = 0.1;
pub const RESET_MESSAGE: &str = "Stability lost. Returning to silence.";
const OUTLINE_EVERY: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GamePhase {
    Start,
    Playing,
}

/// State of the object provider as shown in the HUD.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiStatus {
    Ready,
    Loading,
    QuotaHit, // show the "use personal key" prompt
    Local,    // silently using the local catalog
}

impl ApiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiStatus::Ready => "ready",
            ApiStatus::Loading => "loading",
            ApiStatus::QuotaHit => "quota_hit",
            ApiStatus::Local => "local",
        }
    }
}

/// What the renderer needs for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    pub scale: f64,
    pub rotation: f64,
    pub in_zone: bool,
    pub outline_only: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TapResult {
    /// Not playing; nothing happened.
    Ignored,
    Hit {
        accuracy: f64,
        level: u32, // level just reached
        new_high_score: bool,
    },
    Miss {
        misses_left: u32,
    },
    /// Miss limit reached. `final_stats` is the run as it ended, before the reset.
    Reset { final_stats: SessionStats },
}

/// Outstanding object fetch. Hand back to [`Session::complete_prefetch`].
#[derive(Clone, Debug)]
pub struct PrefetchTicket {
    generation: u64,
    pub excluded: HashSet<String>,
}

/// Outstanding feedback request for the last hit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeedbackRequest {
    generation: u64,
    pub accuracy: f64,
    pub level: u32, // level that was just completed
}

/// Turns absolute frame timestamps into deltas. The first timestamp after a
/// (re)seed only primes the clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ticker {
    last_ms: Option<f64>,
}

impl Ticker {
    pub fn delta(&mut self, now_ms: f64) -> Option<f64> {
        let delta = self.last_ms.map(|prev| (now_ms - prev).max(0.0));
        self.last_ms = Some(now_ms);
        delta
    }

    pub fn unseed(&mut self) {
        self.last_ms = None;
    }
}

pub struct Session<S: HighScoreStore> {
    store: S,
    phase: GamePhase,
    stats: SessionStats,
    modifiers: RuntimeModifiers,
    difficulty: DifficultyProfile,
    pulse: PulseState,
    ticker: Ticker,
    outline_only: bool,
    current: MindfulObject,
    next: Option<MindfulObject>,
    prefetch_in_flight: bool,
    seen: HashSet<String>,
    api_status: ApiStatus,
    feedback: Option<String>,
    pending_feedback: Option<FeedbackRequest>,
    generation: u64,
    generated_objects: u32,
}

impl<S: HighScoreStore> Session<S> {
    pub fn new(store: S) -> Self {
        let high_score = store.load();
        let difficulty = BASE_DIFFICULTY;
        let current = starting_object();
        Self {
            store,
            phase: GamePhase::Start,
            stats: SessionStats::new(high_score),
            modifiers: RuntimeModifiers::new(),
            difficulty,
            pulse: PulseState::seeded(&difficulty),
            ticker: Ticker::default(),
            outline_only: false,
            seen: [current.emoji.clone()].into_iter().collect(),
            current,
            next: None,
            prefetch_in_flight: false,
            api_status: ApiStatus::Ready,
            feedback: None,
            pending_feedback: None,
            generation: 0,
            generated_objects: 0,
        }
    }

    pub fn start(&mut self) {
        if self.phase == GamePhase::Start {
            self.phase = GamePhase::Playing;
            self.ticker.unseed();
            console_log!("session started, best streak {}", self.stats.high_score);
        }
    }

    /// Host suspended the frame loop (hidden tab etc.). The next tick re-primes the
    /// clock instead of applying one huge delta.
    pub fn resync_clock(&mut self) {
        self.ticker.unseed();
    }

    /// One display refresh. `None` unless playing.
    pub fn tick(&mut self, now_ms: f64) -> Option<Frame> {
        if self.phase != GamePhase::Playing {
            return None;
        }
        if let Some(delta) = self.ticker.delta(now_ms) {
            self.pulse = advance(&self.pulse, &self.difficulty, &self.modifiers, delta, now_ms);
        }
        Some(self.frame())
    }

    pub fn frame(&self) -> Frame {
        Frame {
            scale: self.pulse.scale,
            rotation: self.pulse.rotation,
            in_zone: self.pulse.in_zone,
            outline_only: self.outline_only,
        }
    }

    pub fn tap(&mut self) -> TapResult {
        if self.phase != GamePhase::Playing {
            return TapResult::Ignored;
        }
        let outcome = evaluate_tap(self.pulse.scale);
        if outcome.success {
            let (stats, modifiers, new_high_score) = on_hit(&self.stats, &self.modifiers);
            self.stats = stats;
            self.modifiers = modifiers;
            if new_high_score {
                if let Err(e) = self.store.save(stats.high_score) {
                    console_warn!("could not persist high score: {e}");
                }
            }
            self.pending_feedback = Some(FeedbackRequest {
                generation: self.generation,
                accuracy: outcome.accuracy,
                level: stats.level - 1,
            });
            self.enter_level();
            TapResult::Hit {
                accuracy: outcome.accuracy,
                level: stats.level,
                new_high_score,
            }
        } else {
            let (stats, modifiers, should_reset) = on_miss(&self.stats, &self.modifiers);
            if should_reset {
                self.reset();
                return TapResult::Reset { final_stats: stats };
            }
            self.stats = stats;
            self.modifiers = modifiers;
            TapResult::Miss {
                misses_left: stats.stability(),
            }
        }
    }

    // Swap in the next object and difficulty for the level in `self.stats`.
    fn enter_level(&mut self) {
        let level = self.stats.level;
        let object = match self.next.take() {
            Some(obj) => obj,
            None => catalog_object(level as usize % MINDFUL_OBJECTS.len()),
        };
        self.seen.insert(object.emoji.clone());
        self.current = object;
        self.difficulty = compute_difficulty(level);
        self.pulse.reseed(&self.difficulty);
        self.outline_only = level % OUTLINE_EVERY == 0;
        console_log!(
            "level {} ({}){}",
            level,
            self.current.name,
            if self.difficulty.is_break { ", break" } else { "" }
        );
    }

    /// Full reset after the miss limit. Keeps the high score; in-flight provider
    /// results become stale.
    pub fn reset(&mut self) {
        self.stats.reset();
        self.modifiers = RuntimeModifiers::new();
        self.difficulty = compute_difficulty(1);
        self.pulse.reseed(&self.difficulty);
        self.outline_only = false;
        self.current = starting_object();
        self.seen = [self.current.emoji.clone()].into_iter().collect();
        self.next = None;
        self.prefetch_in_flight = false;
        self.pending_feedback = None;
        self.feedback = Some(RESET_MESSAGE.to_string());
        self.generation += 1;
        console_log!("stability lost, back to level 1 (generation {})", self.generation);
    }

    // --- player controls ---

    pub fn slower(&mut self) {
        self.modifiers.adjust_user_speed(-USER_SPEED_STEP);
    }

    pub fn faster(&mut self) {
        self.modifiers.adjust_user_speed(USER_SPEED_STEP);
    }

    pub fn reverse(&mut self) {
        self.modifiers.reverse();
    }

    // --- object provider ---

    /// Start fetching the next object if playing and nothing is queued or in flight.
    pub fn begin_prefetch(&mut self) -> Option<PrefetchTicket> {
        if self.phase != GamePhase::Playing || self.next.is_some() || self.prefetch_in_flight {
            return None;
        }
        self.prefetch_in_flight = true;
        self.api_status = ApiStatus::Loading;
        Some(PrefetchTicket {
            generation: self.generation,
            excluded: self.seen.clone(),
        })
    }

    /// Apply a provider result. Returns false if the ticket predates a reset.
    pub fn complete_prefetch(
        &mut self,
        ticket: PrefetchTicket,
        result: Result<MindfulObject, ProviderError>,
    ) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        self.prefetch_in_flight = false;
        match result {
            Ok(mut obj) => {
                if obj.id.is_empty() {
                    self.generated_objects += 1;
                    obj.id = format!("gen-{}", self.generated_objects);
                }
                self.next = Some(obj);
                self.api_status = ApiStatus::Ready;
            }
            Err(e) => {
                if e.is_quota() {
                    console_warn!("object provider quota exceeded, switch to a personal key");
                    self.api_status = ApiStatus::QuotaHit;
                } else {
                    console_log!("object provider failed ({e}), using local catalog");
                    self.api_status = ApiStatus::Local;
                }
                self.next = Some(fallback_object(&ticket.excluded, self.stats.level));
            }
        }
        true
    }

    /// The player supplied a new credential: clear the quota prompt and refetch.
    pub fn credential_updated(&mut self) {
        self.api_status = ApiStatus::Ready;
        if !self.prefetch_in_flight {
            self.next = None;
        }
    }

    // --- feedback provider ---

    pub fn take_feedback_request(&mut self) -> Option<FeedbackRequest> {
        self.pending_feedback.take()
    }

    /// Apply a feedback result. Returns false if the request predates a reset.
    pub fn apply_feedback(
        &mut self,
        request: &FeedbackRequest,
        result: Result<String, ProviderError>,
    ) -> bool {
        if request.generation != self.generation {
            return false;
        }
        let text = match result {
            Ok(text) => text,
            Err(e) => {
                if e.is_quota() {
                    self.api_status = ApiStatus::QuotaHit;
                }
                let canned = if request.accuracy > 0.9 { "Perfect Focus." } else { "Continue." };
                canned.to_string()
            }
        };
        self.feedback = Some(text);
        true
    }

    pub fn clear_feedback(&mut self) {
        self.feedback = None;
    }

    // --- accessors ---

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn modifiers(&self) -> &RuntimeModifiers {
        &self.modifiers
    }

    pub fn difficulty(&self) -> &DifficultyProfile {
        &self.difficulty
    }

    pub fn pulse(&self) -> &PulseState {
        &self.pulse
    }

    pub fn current_object(&self) -> &MindfulObject {
        &self.current
    }

    pub fn next_object(&self) -> Option<&MindfulObject> {
        self.next.as_ref()
    }

    pub fn seen_emojis(&self) -> &HashSet<String> {
        &self.seen
    }

    pub fn api_status(&self) -> ApiStatus {
        self.api_status
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
