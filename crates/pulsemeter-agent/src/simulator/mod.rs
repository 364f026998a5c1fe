//! Anomaly simulator: externally triggered scenarios over the fault model.
//!
//! Scenarios are registered by name (like services in a dispatcher). A
//! trigger spawns one driver task that owns a [`ScenarioMachine`] and sleeps
//! between ticks; its abort handle is kept so `stop` cancels the pending timer
//! outright. A scenario that is already running rejects a second trigger.

pub mod fault;
pub mod machine;
pub mod scenarios;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use pulsemeter_core::error::{Result, TelemetryError};

use crate::samplers::PauseReporter;

pub use fault::FaultModel;
pub use machine::{Cadence, Phase, Recovery, Scenario, ScenarioMachine};
pub use scenarios::{CacheInvalidation, ConnectionLeak, MemoryLeak, QueueBackup, UserSpike};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScenarioStatus {
    pub name: &'static str,
    pub phase: Phase,
}

struct Run {
    generation: u64,
    abort: AbortHandle,
}

pub struct AnomalySimulator {
    fault: Arc<FaultModel>,
    scenarios: DashMap<&'static str, Arc<dyn Scenario>>,
    running: Arc<DashMap<&'static str, Run>>,
    phases: Arc<DashMap<&'static str, Phase>>,
    generation: AtomicU64,
    speedup: u32,
    enabled: bool,
}

impl AnomalySimulator {
    pub fn new(fault: Arc<FaultModel>, speedup: u32, enabled: bool) -> Self {
        Self {
            fault,
            scenarios: DashMap::new(),
            running: Arc::new(DashMap::new()),
            phases: Arc::new(DashMap::new()),
            generation: AtomicU64::new(1),
            speedup,
            enabled,
        }
    }

    /// Simulator with the five built-in scenarios.
    pub fn with_builtin(
        fault: Arc<FaultModel>,
        speedup: u32,
        enabled: bool,
        pauses: Option<PauseReporter>,
    ) -> Self {
        let sim = Self::new(fault, speedup, enabled);
        sim.register(Arc::new(ConnectionLeak));
        sim.register(Arc::new(CacheInvalidation::default()));
        sim.register(Arc::new(QueueBackup));
        sim.register(Arc::new(MemoryLeak::new(pauses)));
        sim.register(Arc::new(UserSpike::default()));
        sim
    }

    pub fn register(&self, scenario: Arc<dyn Scenario>) {
        let name = scenario.name();
        self.phases.insert(name, Phase::Idle);
        self.scenarios.insert(name, scenario);
    }

    pub fn fault(&self) -> Arc<FaultModel> {
        Arc::clone(&self.fault)
    }

    pub fn phase(&self, name: &str) -> Option<Phase> {
        self.phases.get(name).map(|p| *p.value())
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.contains_key(name)
    }

    /// Every registered scenario, sorted by name.
    pub fn list(&self) -> Vec<ScenarioStatus> {
        let mut out: Vec<ScenarioStatus> = self
            .phases
            .iter()
            .map(|e| ScenarioStatus {
                name: *e.key(),
                phase: *e.value(),
            })
            .collect();
        out.sort_by_key(|s| s.name);
        out
    }

    /// Start a scenario. Must be called inside a tokio runtime.
    pub fn trigger(&self, name: &str) -> Result<()> {
        if !self.enabled {
            return Err(TelemetryError::Config("anomaly simulator is disabled".into()));
        }
        let scenario = self
            .scenarios
            .get(name)
            .ok_or_else(|| TelemetryError::UnknownScenario(name.to_string()))?
            .value()
            .clone();
        let key = scenario.name();

        match self.running.entry(key) {
            Entry::Occupied(_) => Err(TelemetryError::ScenarioActive(key.to_string())),
            Entry::Vacant(slot) => {
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                let machine = ScenarioMachine::new(scenario, self.speedup);
                let task = tokio::spawn(drive(
                    machine,
                    Arc::clone(&self.fault),
                    Arc::clone(&self.phases),
                    Arc::clone(&self.running),
                    generation,
                ));
                slot.insert(Run {
                    generation,
                    abort: task.abort_handle(),
                });
                tracing::info!(scenario = key, "scenario triggered");
                Ok(())
            }
        }
    }

    /// Cancel a running scenario. Fault-model values stay where they are.
    pub fn stop(&self, name: &str) -> Result<()> {
        if !self.scenarios.contains_key(name) {
            return Err(TelemetryError::UnknownScenario(name.to_string()));
        }
        if let Some((key, run)) = self.running.remove(name) {
            run.abort.abort();
            self.phases.insert(key, Phase::Idle);
            tracing::info!(scenario = key, "scenario stopped");
        }
        Ok(())
    }

    pub fn stop_all(&self) {
        let names: Vec<&'static str> = self.running.iter().map(|e| *e.key()).collect();
        for name in names {
            let _ = self.stop(name);
        }
    }
}

/// One scenario run: tick, publish the phase, sleep until the next deadline.
async fn drive(
    mut machine: ScenarioMachine,
    fault: Arc<FaultModel>,
    phases: Arc<DashMap<&'static str, Phase>>,
    running: Arc<DashMap<&'static str, Run>>,
    generation: u64,
) {
    let name = machine.name();
    let mut deadline = Instant::now();
    loop {
        // the run entry stays held across the step, so `stop` waits for an
        // in-progress step and no step starts after it returns
        let next = {
            let held = running.get(name);
            if !matches!(&held, Some(run) if run.generation == generation) {
                return;
            }
            let next = machine.tick(&fault);
            phases.insert(name, machine.phase());
            drop(held);
            next
        };
        let Some(delay) = next else { break };
        deadline += delay;
        tokio::time::sleep_until(deadline).await;
    }
    // a newer run owns the slot if this one was stopped and re-triggered
    running.remove_if(name, |_, run| run.generation == generation);
}
