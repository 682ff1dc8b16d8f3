//! Two-phase timed eject.
//!
//! `Idle → TravelWait` on an opposing object; after the travel delay the
//! intake is stopped (`StopWait`); after the stop delay the intake velocity is
//! re-issued and the controller is `Idle` again. Classifications that arrive
//! while an eject window is open are ignored.

use crate::config::SortConfig;
use crate::types::AllianceColor;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EjectPhase {
    TravelWait,
    StopWait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortState {
    Idle,
    Ejecting { phase: EjectPhase, since: Instant },
}

/// Serializable view of [`SortState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortPhase {
    Idle,
    TravelWait,
    StopWait,
}

/// What the caller must do to the actuator after a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortAction {
    /// Idle; the classification needs no eject.
    Pass(AllianceColor),
    /// An eject window opened. The actuator keeps running for now.
    BeginEject,
    /// Inside an eject window, deadline not reached.
    Wait,
    /// Travel delay elapsed: command velocity 0.
    StopIntake,
    /// Stop delay elapsed: re-issue the intake velocity.
    ResumeIntake { velocity: f64 },
}

#[derive(Debug, Clone)]
pub struct SortController {
    state: SortState,
    travel_delay: Duration,
    stop_delay: Duration,
    intake_velocity: f64,
}

impl SortController {
    pub fn new(travel_delay: Duration, stop_delay: Duration, intake_velocity: f64) -> Self {
        Self {
            state: SortState::Idle,
            travel_delay,
            stop_delay,
            intake_velocity,
        }
    }

    pub fn from_config(config: &SortConfig) -> Self {
        Self::new(
            config.travel_delay(),
            config.stop_delay(),
            config.intake_velocity,
        )
    }

    pub fn state(&self) -> SortState {
        self.state
    }

    pub fn phase(&self) -> SortPhase {
        match self.state {
            SortState::Idle => SortPhase::Idle,
            SortState::Ejecting {
                phase: EjectPhase::TravelWait,
                ..
            } => SortPhase::TravelWait,
            SortState::Ejecting {
                phase: EjectPhase::StopWait,
                ..
            } => SortPhase::StopWait,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == SortState::Idle
    }

    /// When the current eject phase ends, if one is open.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SortState::Idle => None,
            SortState::Ejecting {
                phase: EjectPhase::TravelWait,
                since,
            } => Some(since + self.travel_delay),
            SortState::Ejecting {
                phase: EjectPhase::StopWait,
                since,
            } => Some(since + self.stop_delay),
        }
    }

    pub fn tick(&mut self, color: AllianceColor, now: Instant) -> SortAction {
        match self.state {
            SortState::Idle => match color {
                AllianceColor::Opposing => {
                    self.state = SortState::Ejecting {
                        phase: EjectPhase::TravelWait,
                        since: now,
                    };
                    SortAction::BeginEject
                }
                AllianceColor::Ally | AllianceColor::Unknown => SortAction::Pass(color),
            },
            SortState::Ejecting {
                phase: EjectPhase::TravelWait,
                since,
            } => {
                if now.saturating_duration_since(since) < self.travel_delay {
                    return SortAction::Wait;
                }
                self.state = SortState::Ejecting {
                    phase: EjectPhase::StopWait,
                    since: now,
                };
                SortAction::StopIntake
            }
            SortState::Ejecting {
                phase: EjectPhase::StopWait,
                since,
            } => {
                if now.saturating_duration_since(since) < self.stop_delay {
                    return SortAction::Wait;
                }
                self.state = SortState::Idle;
                SortAction::ResumeIntake {
                    velocity: self.intake_velocity,
                }
            }
        }
    }

    /// Drop an eject that has not yet touched the actuator. Only legal from
    /// `TravelWait`; returns false otherwise.
    pub fn abandon(&mut self) -> bool {
        match self.state {
            SortState::Ejecting {
                phase: EjectPhase::TravelWait,
                ..
            } => {
                self.state = SortState::Idle;
                true
            }
            _ => false,
        }
    }
}
