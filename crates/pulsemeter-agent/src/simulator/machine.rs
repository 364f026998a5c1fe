//! Scenario trait and the Idle → Escalating → Recovering → Idle machine.
//!
//! The machine owns no timers. Each `tick` applies at most one step and
//! returns how long to wait before the next one, so a driver (or a test)
//! decides how time passes.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::fault::FaultModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Escalating,
    Recovering,
}

/// Escalation timing: delay before the first step, then the step interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub first: Duration,
    pub every: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// One instantaneous reset after the delay.
    ResetAfter(Duration),
    /// After `after`, decay one step every `every` until the floor is reached.
    Decay { after: Duration, every: Duration },
}

/// One synthetic fault.
pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;

    fn cadence(&self) -> Cadence;

    /// Apply one escalation step. Returns true once the threshold is crossed.
    fn escalate(&self, fault: &FaultModel) -> bool;

    fn recovery(&self) -> Recovery;

    /// Apply one recovery step. Returns true once the floor is reached;
    /// a `ResetAfter` recovery is always complete after one call.
    fn recover(&self, fault: &FaultModel) -> bool;
}

pub struct ScenarioMachine {
    scenario: Arc<dyn Scenario>,
    phase: Phase,
    speedup: u32,
}

impl ScenarioMachine {
    pub fn new(scenario: Arc<dyn Scenario>, speedup: u32) -> Self {
        Self {
            scenario,
            phase: Phase::Idle,
            speedup: speedup.max(1),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn name(&self) -> &'static str {
        self.scenario.name()
    }

    fn scaled(&self, d: Duration) -> Duration {
        d / self.speedup
    }

    /// Advance one step. Returns the delay before the next tick, or `None`
    /// once the machine is back at `Idle`.
    pub fn tick(&mut self, fault: &FaultModel) -> Option<Duration> {
        let name = self.scenario.name();
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Escalating;
                tracing::info!(scenario = name, "scenario escalating");
                Some(self.scaled(self.scenario.cadence().first))
            }
            Phase::Escalating => {
                if !self.scenario.escalate(fault) {
                    return Some(self.scaled(self.scenario.cadence().every));
                }
                self.phase = Phase::Recovering;
                tracing::info!(scenario = name, "threshold crossed; scenario recovering");
                let wait = match self.scenario.recovery() {
                    Recovery::ResetAfter(delay) => delay,
                    Recovery::Decay { after, .. } => after,
                };
                Some(self.scaled(wait))
            }
            Phase::Recovering => {
                let floor_reached = self.scenario.recover(fault);
                match self.scenario.recovery() {
                    Recovery::Decay { every, .. } if !floor_reached => Some(self.scaled(every)),
                    _ => {
                        self.phase = Phase::Idle;
                        tracing::info!(scenario = name, "scenario recovered");
                        None
                    }
                }
            }
        }
    }
}
