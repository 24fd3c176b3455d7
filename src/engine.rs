//! Pulse engine: difficulty curve, per-frame ring animation and tap judgement.
//!
//! Everything in here is a pure function of its arguments. Time is always passed
//! in explicitly (performance.now() style milliseconds) so the whole module runs
//! natively under `cargo test` without a browser host.

use std::f64::consts::FRAC_PI_2;

/// Scale the player is aiming for (the static guide ring).
pub const TARGET_SCALE: f64 = 1.0;
/// Half-width of the in-zone band around [`TARGET_SCALE`]. Comparison is strict.
pub const HIT_THRESHOLD: f64 = 0.18;
// Distances this close to the edge count as on the edge (1.18 - 1.0 < 0.18 in f64).
const EDGE_EPSILON: f64 = 1e-9;
/// Misses accumulated before the session collapses back to level 1.
pub const MISS_LIMIT: u32 = 10;
/// Added to `miss_speed_boost` on every miss (no upper bound).
pub const MISS_BOOST_STEP: f64 = 0.2;
/// Phase every new object starts from: sin(-π/2) = -1, i.e. the smallest ring.
pub const PROGRESS_SEED: f64 = -FRAC_PI_2;

pub const MIN_USER_SPEED: f64 = 0.2;
pub const MAX_USER_SPEED: f64 = 3.0;

const BREAK_EVERY: u32 = 7;
const BREAK_SPEED: f64 = 0.0008;
const BASE_SPEED: f64 = 0.0016;
const SPEED_PER_LEVEL: f64 = 0.0001;
const JITTER_FROM_LEVEL: u32 = 10;
const JITTER_PER_LEVEL: f64 = 0.02;
const JITTER_CAP: f64 = 0.25;
const JITTER_FREQ: f64 = 0.0015; // rad per ms of wall clock
const PULSE_MIN: f64 = 0.4;
const PULSE_MAX: f64 = 1.8;
const PULSE_GROWTH: f64 = 0.02;
const PULSE_GROWTH_CAP: f64 = 0.6;
const ROTATION_FROM_LEVEL: u32 = 6;
const ROTATION_BASE: f64 = 0.005; // deg per ms

// --- Difficulty -------------------------------------------------------------

/// Difficulty knobs for a single level. Derived from the level number only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DifficultyProfile {
    pub speed: f64,              // radians of pulse phase per ms
    pub jitter: f64,             // amplitude of the speed wobble
    pub is_break: bool,          // rest beat: every 7th level after the first
    pub pulse_range: (f64, f64), // (min, max) ring scale
    pub rotation_multiplier: f64,
}

/// Profile the very first run opens with. Resets use `compute_difficulty(1)`.
pub const BASE_DIFFICULTY: DifficultyProfile = DifficultyProfile {
    speed: 0.0015,
    jitter: 0.0,
    is_break: false,
    pulse_range: (0.5, 1.8),
    rotation_multiplier: 0.0,
};

/// Speed a level would have without the break-level slowdown.
pub fn baseline_speed(level: u32) -> f64 {
    BASE_SPEED + level as f64 * SPEED_PER_LEVEL
}

pub fn is_break_level(level: u32) -> bool {
    level > 1 && level % BREAK_EVERY == 0
}

pub fn compute_difficulty(level: u32) -> DifficultyProfile {
    let is_break = is_break_level(level);
    let jitter = if level < JITTER_FROM_LEVEL {
        0.0
    } else {
        ((level - JITTER_FROM_LEVEL) as f64 * JITTER_PER_LEVEL).min(JITTER_CAP)
    };
    DifficultyProfile {
        speed: if is_break { BREAK_SPEED } else { baseline_speed(level) },
        jitter,
        is_break,
        pulse_range: (
            PULSE_MIN,
            PULSE_MAX + (level as f64 * PULSE_GROWTH).min(PULSE_GROWTH_CAP),
        ),
        rotation_multiplier: if level < ROTATION_FROM_LEVEL { 0.0 } else { 1.0 },
    }
}

/// Strictly inside the hit band. A scale sitting on the edge is outside.
pub fn in_zone(scale: f64) -> bool {
    HIT_THRESHOLD - (scale - TARGET_SCALE).abs() > EDGE_EPSILON
}

// --- Pulse state --------------------------------------------------------------

/// Ring animation state carried from frame to frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PulseState {
    pub progress: f64, // phase accumulator (radians)
    pub rotation: f64, // degrees, kept in [0, 360)
    pub scale: f64,
    pub in_zone: bool,
}

impl PulseState {
    /// Smallest ring at the seed phase, no rotation.
    pub fn seeded(profile: &DifficultyProfile) -> Self {
        let mut state = Self {
            progress: PROGRESS_SEED,
            rotation: 0.0,
            scale: 0.0,
            in_zone: false,
        };
        state.reseed(profile);
        state
    }

    /// Start the next pulse from the smallest ring. Rotation carries over.
    pub fn reseed(&mut self, profile: &DifficultyProfile) {
        self.progress = PROGRESS_SEED;
        self.scale = profile.pulse_range.0;
        self.in_zone = in_zone(self.scale);
    }
}

/// Player-adjustable speed/direction knobs plus the miss penalty.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RuntimeModifiers {
    pub user_speed_multiplier: f64,
    pub rotation_direction: f64, // +1.0 or -1.0
    pub miss_speed_boost: f64,
}

impl RuntimeModifiers {
    pub fn new() -> Self {
        Self {
            user_speed_multiplier: 1.0,
            rotation_direction: 1.0,
            miss_speed_boost: 1.0,
        }
    }

    /// Nudge the player multiplier, clamped to [`MIN_USER_SPEED`, `MAX_USER_SPEED`].
    pub fn adjust_user_speed(&mut self, step: f64) {
        self.user_speed_multiplier =
            (self.user_speed_multiplier + step).clamp(MIN_USER_SPEED, MAX_USER_SPEED);
    }

    pub fn reverse(&mut self) {
        self.rotation_direction = -self.rotation_direction;
    }
}

impl Default for RuntimeModifiers {
    fn default() -> Self {
        Self::new()
    }
}

/// One animation step. `delta_ms` is the time since the previous frame and
/// `now_ms` the absolute frame timestamp (drives the jitter wobble).
pub fn advance(
    state: &PulseState,
    profile: &DifficultyProfile,
    modifiers: &RuntimeModifiers,
    delta_ms: f64,
    now_ms: f64,
) -> PulseState {
    let effective_speed =
        profile.speed * modifiers.miss_speed_boost * modifiers.user_speed_multiplier;
    let jitter_factor = (now_ms * JITTER_FREQ).sin() * profile.jitter;
    let progress = state.progress + effective_speed * delta_ms * (1.0 + jitter_factor);

    let rotation_speed = (ROTATION_BASE + effective_speed * 2.0) * profile.rotation_multiplier;
    let mut rotation = (state.rotation + rotation_speed * modifiers.rotation_direction * delta_ms)
        .rem_euclid(360.0);
    if rotation >= 360.0 {
        rotation = 0.0; // rem_euclid of a tiny negative rounds up to 360
    }

    let (min, max) = profile.pulse_range;
    let scale = min + ((progress.sin() + 1.0) / 2.0) * (max - min);

    PulseState {
        progress,
        rotation,
        scale,
        in_zone: in_zone(scale),
    }
}

// --- Taps & session counters ------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TapOutcome {
    pub success: bool,
    pub accuracy: f64, // 1.0 dead centre, 0.0 at or beyond the zone edge
}

pub fn evaluate_tap(scale: f64) -> TapOutcome {
    let distance = (scale - TARGET_SCALE).abs();
    TapOutcome {
        success: in_zone(scale),
        accuracy: (1.0 - distance / HIT_THRESHOLD).max(0.0),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionStats {
    pub level: u32,
    pub streak: u32,
    pub perfect_hits: u32,
    pub total_attempts: u32,
    pub miss_count: u32,
    pub high_score: u32,
}

impl SessionStats {
    pub fn new(high_score: u32) -> Self {
        Self {
            level: 1,
            streak: 0,
            perfect_hits: 0,
            total_attempts: 0,
            miss_count: 0,
            high_score,
        }
    }

    /// Back to level 1 with fresh counters. The high score survives.
    pub fn reset(&mut self) {
        *self = Self::new(self.high_score);
    }

    /// Remaining misses before a reset ("stability" in the HUD).
    pub fn stability(&self) -> u32 {
        MISS_LIMIT.saturating_sub(self.miss_count)
    }
}

/// Apply a successful tap. The flag is true when the streak beat the stored best.
pub fn on_hit(
    stats: &SessionStats,
    modifiers: &RuntimeModifiers,
) -> (SessionStats, RuntimeModifiers, bool) {
    let streak = stats.streak + 1;
    let high_score = stats.high_score.max(streak);
    let next = SessionStats {
        level: stats.level + 1,
        streak,
        perfect_hits: stats.perfect_hits + 1,
        total_attempts: stats.total_attempts + 1,
        miss_count: stats.miss_count,
        high_score,
    };
    let mods = RuntimeModifiers {
        miss_speed_boost: 1.0,
        ..*modifiers
    };
    (next, mods, high_score > stats.high_score)
}

/// Apply a missed tap. The flag is true once the miss limit is reached.
pub fn on_miss(
    stats: &SessionStats,
    modifiers: &RuntimeModifiers,
) -> (SessionStats, RuntimeModifiers, bool) {
    let next = SessionStats {
        streak: 0,
        total_attempts: stats.total_attempts + 1,
        miss_count: stats.miss_count + 1,
        ..*stats
    };
    let mods = RuntimeModifiers {
        miss_speed_boost: modifiers.miss_speed_boost + MISS_BOOST_STEP,
        ..*modifiers
    };
    let should_reset = next.miss_count >= MISS_LIMIT;
    (next, mods, should_reset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_curve() {
        for level in 1..10 {
            assert_eq!(compute_difficulty(level).jitter, 0.0, "level {level}");
        }
        let mut prev = 0.0;
        for level in 10..200 {
            let j = compute_difficulty(level).jitter;
            assert!(j >= prev, "jitter decreased at level {level}");
            assert!(j <= JITTER_CAP + 1e-12);
            prev = j;
        }
        assert!((compute_difficulty(15).jitter - 0.1).abs() < 1e-9);
        assert!((compute_difficulty(100).jitter - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_break_levels_rest() {
        for level in 1..100 {
            let d = compute_difficulty(level);
            assert_eq!(d.is_break, level > 1 && level % 7 == 0, "level {level}");
            if d.is_break {
                assert!(d.speed < baseline_speed(level));
            } else {
                assert!((d.speed - baseline_speed(level)).abs() < 1e-12);
            }
        }
        assert!(!compute_difficulty(1).is_break);
    }

    #[test]
    fn test_rotation_and_range() {
        for level in 1..=5 {
            assert_eq!(compute_difficulty(level).rotation_multiplier, 0.0);
        }
        assert_eq!(compute_difficulty(6).rotation_multiplier, 1.0);
        let (lo, hi) = compute_difficulty(1).pulse_range;
        assert!((lo - 0.4).abs() < 1e-12);
        assert!((hi - 1.82).abs() < 1e-12);
        let (_, capped) = compute_difficulty(500).pulse_range;
        assert!((capped - 2.4).abs() < 1e-12);
    }

    #[test]
    fn test_advance_deterministic() {
        let profile = compute_difficulty(12);
        let mods = RuntimeModifiers {
            user_speed_multiplier: 1.3,
            rotation_direction: -1.0,
            miss_speed_boost: 1.4,
        };
        let s0 = PulseState::seeded(&profile);
        let a = advance(&s0, &profile, &mods, 16.67, 12_345.0);
        let b = advance(&s0, &profile, &mods, 16.67, 12_345.0);
        assert_eq!(a, b);
        assert!(a.progress > s0.progress);
    }

    #[test]
    fn test_advance_scale_formula() {
        let profile = compute_difficulty(1);
        let mods = RuntimeModifiers::new();
        let s0 = PulseState {
            progress: 0.0,
            ..PulseState::seeded(&profile)
        };
        let s1 = advance(&s0, &profile, &mods, 0.0, 0.0);
        // sin(0) = 0 -> midpoint of the range (1.11 at level 1, inside the zone)
        let (lo, hi) = profile.pulse_range;
        assert!((s1.scale - (lo + hi) / 2.0).abs() < 1e-12);
        assert!(s1.in_zone);
    }

    #[test]
    fn test_rotation_frozen_then_wrapped() {
        let mods = RuntimeModifiers::new();
        let slow = compute_difficulty(3);
        let s = advance(&PulseState::seeded(&slow), &slow, &mods, 1000.0, 0.0);
        assert_eq!(s.rotation, 0.0);

        let reversed = RuntimeModifiers { rotation_direction: -1.0, ..mods };
        let spinning = compute_difficulty(8);
        let s = advance(&PulseState::seeded(&spinning), &spinning, &reversed, 1000.0, 0.0);
        assert!((0.0..360.0).contains(&s.rotation));
        assert!(s.rotation > 180.0); // went backwards from 0
    }

    #[test]
    fn test_seeded_state_is_smallest_ring() {
        let profile = compute_difficulty(4);
        let s = PulseState::seeded(&profile);
        assert_eq!(s.progress, PROGRESS_SEED);
        assert_eq!(s.scale, profile.pulse_range.0);
        assert!(!s.in_zone);
    }

    #[test]
    fn test_evaluate_tap_edges() {
        let centre = evaluate_tap(1.0);
        assert!(centre.success);
        assert_eq!(centre.accuracy, 1.0);
        assert!(!evaluate_tap(1.18).success);
        assert!(!evaluate_tap(0.82).success);
        assert!(evaluate_tap(1.1799).success);
        assert_eq!(evaluate_tap(2.0).accuracy, 0.0);
        let near = evaluate_tap(0.91);
        assert!(near.success);
        assert!((near.accuracy - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_hit_and_miss_bookkeeping() {
        let stats = SessionStats::new(3);
        let mods = RuntimeModifiers::new();
        let (stats, mods, _) = on_miss(&stats, &mods);
        let (stats, mods, _) = on_miss(&stats, &mods);
        assert!((mods.miss_speed_boost - 1.4).abs() < 1e-12);
        assert_eq!(stats.miss_count, 2);
        assert_eq!(stats.streak, 0);

        let (stats, mods, new_best) = on_hit(&stats, &mods);
        assert_eq!(mods.miss_speed_boost, 1.0);
        assert_eq!(stats.level, 2);
        assert_eq!(stats.perfect_hits, 1);
        assert_eq!(stats.total_attempts, 3);
        assert!(!new_best);
        assert_eq!(stats.high_score, 3);
    }

    #[test]
    fn test_miss_limit() {
        let mut stats = SessionStats::new(0);
        let mut mods = RuntimeModifiers::new();
        for i in 1..=MISS_LIMIT {
            let (s, m, reset) = on_miss(&stats, &mods);
            assert_eq!(reset, i == MISS_LIMIT, "miss {i}");
            stats = s;
            mods = m;
        }
        assert!((mods.miss_speed_boost - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_advance_hand_computed_step() {
        // level 20: speed 0.0036, jitter 0.2, rotation on
        let profile = compute_difficulty(20);
        assert!((profile.speed - 0.0036).abs() < 1e-12);
        assert!((profile.jitter - 0.2).abs() < 1e-12);
        let mods = RuntimeModifiers {
            user_speed_multiplier: 1.5,
            rotation_direction: -1.0,
            miss_speed_boost: 1.4,
        };
        let s0 = PulseState {
            progress: 0.3,
            rotation: 10.0,
            ..PulseState::seeded(&profile)
        };
        let s1 = advance(&s0, &profile, &mods, 20.0, 777.0);

        let eff = 0.0036 * 1.4 * 1.5;
        let jf = (777.0_f64 * 0.0015).sin() * 0.2;
        let progress = 0.3 + eff * 20.0 * (1.0 + jf);
        let rotation = 10.0 - (0.005 + eff * 2.0) * 20.0;
        assert!((s1.progress - progress).abs() < 1e-12, "{} vs {}", s1.progress, progress);
        assert!((s1.rotation - rotation).abs() < 1e-12, "{} vs {}", s1.rotation, rotation);
        let (lo, hi) = profile.pulse_range;
        let scale = lo + ((progress.sin() + 1.0) / 2.0) * (hi - lo);
        assert!((s1.scale - scale).abs() < 1e-12);
    }

    #[test]
    fn test_base_difficulty_band() {
        assert_eq!(BASE_DIFFICULTY.pulse_range, (0.5, 1.8));
        assert_eq!(BASE_DIFFICULTY.jitter, 0.0);
        assert_eq!(BASE_DIFFICULTY.rotation_multiplier, 0.0);
        assert!(!BASE_DIFFICULTY.is_break);
    }

    #[test]
    fn test_user_speed_clamped() {
        let mut mods = RuntimeModifiers::new();
        for _ in 0..40 {
            mods.adjust_user_speed(0.1);
        }
        assert_eq!(mods.user_speed_multiplier, MAX_USER_SPEED);
        for _ in 0..40 {
            mods.adjust_user_speed(-0.1);
        }
        assert_eq!(mods.user_speed_multiplier, MIN_USER_SPEED);
    }
}
