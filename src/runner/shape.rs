//! Stage progression and the user-count curve.
//!
//! Think of previous and current stage as two points in a time/rps plane. The
//! tick maps elapsed stage time onto a sine curve between them, so the ramp
//! can be bowed front- or back-heavy via the stage's `curve` exponent. User
//! counts come from the rps targets via the observed mean response time
//! (`users = avg_rt * rps` holds because workers run with zero think time).

use std::f64::consts::FRAC_PI_2;
use std::time::Instant;

use crate::domain::Stage;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeTick {
    Run { desired_users: u32, spawn_rate: f64 },
    /// Every stage has run to completion; the test is over.
    Finished,
}

#[derive(Debug)]
pub struct StageShape {
    stages: Vec<Stage>,
    rampup: f64,
    index: usize,
    previous: Stage,
    stage_started: Instant,
}

impl StageShape {
    pub fn new(stages: Vec<Stage>, rampup: f64, now: Instant) -> Self {
        Self {
            stages,
            rampup,
            index: 0,
            // Virtual zero-rps stage the first real stage ramps away from.
            previous: Stage::new(0.0, 1.0, 0.0),
            stage_started: now,
        }
    }

    pub fn stage_index(&self) -> usize {
        self.index
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Called about once a second. Returns how many users should be running
    /// right now, or `Finished` once the last stage's ramp has completed.
    pub fn tick(&mut self, avg_response_time_secs: f64, now: Instant) -> ShapeTick {
        let Some(mut current) = self.stages.get(self.index).copied() else {
            return ShapeTick::Finished;
        };

        let elapsed = now.duration_since(self.stage_started).as_secs_f64();
        let mut progress = elapsed / current.duration_secs();
        if progress >= 1.0 {
            self.previous = current;
            self.index += 1;
            self.stage_started = now;
            match self.stages.get(self.index) {
                Some(next) => {
                    current = *next;
                    progress = 0.0;
                }
                None => return ShapeTick::Finished,
            }
        }

        let min_users = avg_response_time_secs * self.previous.target_rps;
        let max_users =
            avg_response_time_secs * (current.target_rps - self.previous.target_rps);
        let desired =
            (max_users * (progress * FRAC_PI_2).sin().powf(current.curve) + min_users).ceil();

        ShapeTick::Run {
            desired_users: desired.max(0.0) as u32,
            spawn_rate: self.rampup,
        }
    }
}
