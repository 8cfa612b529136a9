//! Simulation tick and draw frame timing.
//!
//! The simulation advances in fixed ticks (`GAME_SPEED` per second) while
//! drawing happens once per rendered frame. The fraction of a tick that has
//! elapsed since the last simulation step is exposed as `time_offset` so
//! renderers can interpolate positions between ticks.

use std::time::Duration;

/// Simulation ticks per simulated second.
pub const GAME_SPEED: u32 = 30;

/// Tracks the simulation tick, the draw frame and the sub-tick interpolation offset.
#[derive(Debug, Clone)]
pub struct FrameClock {
    /// Number of completed simulation ticks.
    sim_frame: u64,
    /// Number of rendered frames.
    draw_frame: u64,
    /// Fraction of a tick elapsed since `sim_frame` was reached, in `[0, 1)`.
    time_offset: f32,
    /// Duration of one simulation tick.
    tick: Duration,
    /// Accumulated real time not yet consumed by a tick.
    accumulator: Duration,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Create a clock at tick 0 running at `GAME_SPEED`.
    pub fn new() -> Self {
        Self {
            sim_frame: 0,
            draw_frame: 0,
            time_offset: 0.0,
            tick: Duration::from_secs_f64(1.0 / f64::from(GAME_SPEED)),
            accumulator: Duration::ZERO,
        }
    }

    /// Clock positioned at an explicit simulation tick (replays, tests).
    pub fn at_sim_frame(sim_frame: u64) -> Self {
        Self {
            sim_frame,
            ..Self::new()
        }
    }

    /// Advance by real elapsed time. Returns how many simulation ticks became due.
    pub fn advance(&mut self, delta: Duration) -> u32 {
        self.accumulator += delta;
        let mut ticks = 0;
        while self.accumulator >= self.tick {
            self.accumulator -= self.tick;
            self.sim_frame += 1;
            ticks += 1;
        }
        self.time_offset = self.accumulator.as_secs_f32() / self.tick.as_secs_f32();
        ticks
    }

    /// Step exactly one simulation tick.
    pub fn step_sim(&mut self) {
        self.sim_frame += 1;
    }

    /// Mark the start of a new rendered frame.
    pub fn begin_draw_frame(&mut self) {
        self.draw_frame += 1;
    }

    /// Override the interpolation offset (clamped to `[0, 1)`).
    pub fn set_time_offset(&mut self, offset: f32) {
        self.time_offset = offset.clamp(0.0, 0.999_999);
    }

    pub fn sim_frame(&self) -> u64 {
        self.sim_frame
    }

    pub fn draw_frame(&self) -> u64 {
        self.draw_frame
    }

    pub fn time_offset(&self) -> f32 {
        self.time_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_counts_whole_ticks_and_keeps_fraction() {
        let mut clock = FrameClock::new();
        let tick = 1.0 / GAME_SPEED as f64;
        let ticks = clock.advance(Duration::from_secs_f64(tick * 2.5));
        assert_eq!(ticks, 2);
        assert_eq!(clock.sim_frame(), 2);
        assert!((clock.time_offset() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn draw_frames_are_independent_of_ticks() {
        let mut clock = FrameClock::at_sim_frame(100);
        clock.begin_draw_frame();
        clock.begin_draw_frame();
        assert_eq!(clock.draw_frame(), 2);
        assert_eq!(clock.sim_frame(), 100);
    }
}
