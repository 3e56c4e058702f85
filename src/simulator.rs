//! Presence detection stand-in.
//!
//! There is no recognition model behind the photo upload: each student's
//! status is drawn at random. The draw goes through [`RandomSource`] so tests
//! can script it, and the simulator implements [`PresenceDetector`] so a real
//! pipeline can take its place without touching callers.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{AttendanceStatus, RosterEntry, StudentAttendanceRecord};

/// First draw above this marks the student present.
pub const PRESENT_THRESHOLD: f64 = 0.2;
/// Second draw above this marks the student late, otherwise absent.
pub const LATE_THRESHOLD: f64 = 0.5;
/// Lowest simulated confidence.
pub const CONFIDENCE_MIN: u8 = 85;
/// Number of distinct confidence values (85..=99).
pub const CONFIDENCE_SPAN: u8 = 15;

/// Source of uniform values in `[0, 1)`.
pub trait RandomSource {
    fn next_f64(&mut self) -> f64;
}

/// Anything that turns a roster into one record per student.
pub trait PresenceDetector {
    fn detect(&mut self, roster: &[RosterEntry]) -> Vec<StudentAttendanceRecord>;
}

/// `StdRng`-backed source.
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// Seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for StdRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }
}

/// Replays a fixed list of values, cycling when exhausted.
///
/// An empty script yields `0.0` forever.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    values: VecDeque<f64>,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&mut self) -> f64 {
        match self.values.pop_front() {
            Some(v) => {
                self.values.push_back(v);
                v
            }
            None => 0.0,
        }
    }
}

/// Random attendance generator.
pub struct AttendanceSimulator<R> {
    rng: R,
}

impl AttendanceSimulator<StdRandom> {
    pub fn new() -> Self {
        Self::with_source(StdRandom::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_source(StdRandom::seeded(seed))
    }
}

impl Default for AttendanceSimulator<StdRandom> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RandomSource> AttendanceSimulator<R> {
    pub fn with_source(rng: R) -> Self {
        Self { rng }
    }

    /// Two-stage draw: the second value is consumed only when the first
    /// one fails the present threshold.
    pub fn draw_status(&mut self) -> AttendanceStatus {
        if self.rng.next_f64() > PRESENT_THRESHOLD {
            AttendanceStatus::Present
        } else if self.rng.next_f64() > LATE_THRESHOLD {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Absent
        }
    }

    /// `floor(r * 15) + 85`, always within 85..=99.
    pub fn draw_confidence(&mut self) -> u8 {
        let r = self.rng.next_f64().clamp(0.0, 1.0);
        let step = ((r * f64::from(CONFIDENCE_SPAN)).floor() as u8).min(CONFIDENCE_SPAN - 1);
        CONFIDENCE_MIN + step
    }

    /// One record per roster entry, in roster order.
    pub fn simulate(&mut self, roster: &[RosterEntry]) -> Vec<StudentAttendanceRecord> {
        roster
            .iter()
            .map(|entry| {
                let status = self.draw_status();
                let confidence = self.draw_confidence();
                StudentAttendanceRecord::detected(entry, status, confidence)
            })
            .collect()
    }
}

impl<R: RandomSource> PresenceDetector for AttendanceSimulator<R> {
    fn detect(&mut self, roster: &[RosterEntry]) -> Vec<StudentAttendanceRecord> {
        self.simulate(roster)
    }
}

/// Simulate a roster with an entropy-seeded generator.
pub fn simulate_attendance(roster: &[RosterEntry]) -> Vec<StudentAttendanceRecord> {
    AttendanceSimulator::new().simulate(roster)
}
