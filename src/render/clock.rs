use std::time::{Duration, Instant};

/// Fixed-length clock for one crossfade. Kept separate from frame timing so
/// a resize or a slow frame never shifts the transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionClock {
    /// Monotonic instant the transition started at.
    started: Instant,
    duration: Duration,
}

impl TransitionClock {
    pub fn start(now: Instant, duration: Duration) -> Self {
        Self { started: now, duration }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// Linear progress in `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        sanitize_progress(self.elapsed(now).as_secs_f32() / self.duration.as_secs_f32())
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.elapsed(now) >= self.duration
    }
}

/// Quadratic ease-in-out.
pub fn ease_in_out_quad(p: f32) -> f32 {
    let p = sanitize_progress(p);
    if p < 0.5 {
        2.0 * p * p
    } else {
        1.0 - (-2.0 * p + 2.0).powi(2) / 2.0
    }
}

pub fn sanitize_progress(p: f32) -> f32 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}
