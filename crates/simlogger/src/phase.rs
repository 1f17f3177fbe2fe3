//! Ground/airborne detection.
//!
//! The tracker watches the simulator's on-ground flag and reports takeoffs and
//! landings. A touchdown only counts as a landing once the aircraft has been
//! airborne for longer than the configured minimum; shorter hops are treated as
//! bounces and the flight carries on.

use tracing::debug;

/// Samples observed before transitions are considered.
pub const DEFAULT_MIN_SAMPLES: usize = 2;

/// Airborne time required before a touchdown counts as a landing.
pub const DEFAULT_MIN_FLIGHT_SECONDS: u32 = 80;

/// Current flight phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroundPhase {
    /// Not enough samples yet.
    #[default]
    Initializing,
    /// On the ground.
    Grounded,
    /// In the air.
    Airborne,
}

/// Transition reported by [`FlightPhaseTracker::observe`].
///
/// A landing is advisory: the caller decides whether to write a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// The aircraft left the ground.
    Takeoff {
        /// Seconds of day at takeoff.
        at: u32,
    },
    /// The aircraft landed after a real flight.
    Landing {
        /// Seconds of day at touchdown.
        at: u32,
        /// Seconds since takeoff.
        airborne_seconds: u32,
    },
}

/// Ground/airborne state machine with landing debounce.
#[derive(Debug, Clone)]
pub struct FlightPhaseTracker {
    phase: GroundPhase,
    samples_seen: usize,
    last_on_ground: bool,
    takeoff_at: u32,
    min_samples: usize,
    min_flight_seconds: u32,
}

impl Default for FlightPhaseTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SAMPLES, DEFAULT_MIN_FLIGHT_SECONDS)
    }
}

impl FlightPhaseTracker {
    /// Create a tracker with explicit thresholds.
    #[must_use]
    pub fn new(min_samples: usize, min_flight_seconds: u32) -> Self {
        Self {
            phase: GroundPhase::Initializing,
            samples_seen: 0,
            last_on_ground: false,
            takeoff_at: 0,
            min_samples,
            min_flight_seconds,
        }
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> GroundPhase {
        self.phase
    }

    /// Seconds of day of the most recent takeoff, if airborne.
    #[must_use]
    pub fn takeoff_at(&self) -> Option<u32> {
        (self.phase == GroundPhase::Airborne).then_some(self.takeoff_at)
    }

    /// Forget all history, as when a new flight is loaded.
    pub fn reset(&mut self) {
        *self = Self::new(self.min_samples, self.min_flight_seconds);
    }

    /// Feed one sample and report any takeoff or landing.
    pub fn observe(&mut self, on_ground: bool, time_of_day_seconds: u32) -> Option<PhaseEvent> {
        self.samples_seen = self.samples_seen.saturating_add(1);

        if self.phase == GroundPhase::Initializing {
            self.last_on_ground = on_ground;
            if self.samples_seen >= self.min_samples {
                self.phase = if on_ground {
                    GroundPhase::Grounded
                } else {
                    GroundPhase::Airborne
                };
                // Already flying when tracking began: time the flight from here.
                self.takeoff_at = time_of_day_seconds;
            }
            return None;
        }
        self.last_on_ground = on_ground;

        match (self.phase, on_ground) {
            (GroundPhase::Grounded, false) => {
                self.phase = GroundPhase::Airborne;
                self.takeoff_at = time_of_day_seconds;
                debug!(at = time_of_day_seconds, "Takeoff detected");
                Some(PhaseEvent::Takeoff {
                    at: time_of_day_seconds,
                })
            }
            (GroundPhase::Airborne, true) => {
                let airborne_seconds = elapsed(self.takeoff_at, time_of_day_seconds);
                if airborne_seconds > self.min_flight_seconds {
                    self.phase = GroundPhase::Grounded;
                    debug!(at = time_of_day_seconds, airborne_seconds, "Landing detected");
                    Some(PhaseEvent::Landing {
                        at: time_of_day_seconds,
                        airborne_seconds,
                    })
                } else {
                    debug!(airborne_seconds, "Touchdown ignored as bounce");
                    None
                }
            }
            _ => None,
        }
    }

    /// The on-ground flag from the latest sample.
    #[must_use]
    pub fn last_on_ground(&self) -> bool {
        self.last_on_ground
    }
}

const SECONDS_PER_DAY: u32 = 86_400;

/// Seconds between two times of day, allowing for one midnight rollover.
///
/// Inputs past the end of the day are reduced first, so the result is always
/// below one day.
fn elapsed(from: u32, to: u32) -> u32 {
    let from = from % SECONDS_PER_DAY;
    let to = to % SECONDS_PER_DAY;
    (to + SECONDS_PER_DAY - from) % SECONDS_PER_DAY
}
