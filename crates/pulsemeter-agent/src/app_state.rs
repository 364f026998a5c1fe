//! Shared application state for the pulsemeter agent.
//!
//! One registry is built here and every instrument family registers into it.
//! Construction is split from task startup: [`AgentState::new`] only
//! registers, [`Background::spawn`] starts the sampler tasks, so tests can
//! build state without timers running.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pulsemeter_core::{MetricRegistry, Result};

use crate::config::AgentConfig;
use crate::obs::{register_catalog_gauges, BusinessMetrics, CatalogStats, RequestMetrics};
use crate::samplers::pause::pause_channel;
use crate::samplers::{PauseEvent, SystemSamplers};
use crate::simulator::{AnomalySimulator, FaultModel};

#[derive(Clone)]
pub struct AgentState {
    inner: Arc<AgentStateInner>,
}

struct AgentStateInner {
    cfg: AgentConfig,
    registry: Arc<MetricRegistry>,
    requests: Arc<RequestMetrics>,
    business: BusinessMetrics,
    simulator: Arc<AnomalySimulator>,
}

/// Sampler tasks that have been registered but not started.
pub struct Background {
    samplers: SystemSamplers,
    pauses: mpsc::Receiver<PauseEvent>,
}

impl Background {
    /// Must run inside a tokio runtime.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        self.samplers.spawn(self.pauses)
    }
}

impl AgentState {
    /// Build state and register every metric family. `catalog` backs the
    /// catalog gauges when the host has a persistence layer.
    pub fn new(
        cfg: AgentConfig,
        catalog: Option<Arc<dyn CatalogStats>>,
    ) -> Result<(Self, Background)> {
        let registry = Arc::new(MetricRegistry::with_callback_budget(Duration::from_millis(
            cfg.samplers.callback_budget_ms,
        )));

        let requests = Arc::new(RequestMetrics::register(&registry)?);
        let business = BusinessMetrics::register(&registry)?;
        let samplers = SystemSamplers::register(&registry, &cfg.samplers)?;
        let (reporter, pauses) = pause_channel();

        let fault = Arc::new(FaultModel::default());
        fault.register_gauges(&registry)?;
        if let Some(catalog) = catalog {
            register_catalog_gauges(&registry, catalog)?;
        }

        let simulator = Arc::new(AnomalySimulator::with_builtin(
            fault,
            cfg.simulator.speedup,
            cfg.simulator.enabled,
            Some(reporter),
        ));

        tracing::info!(
            metrics = registry.descriptors().len(),
            simulator = cfg.simulator.enabled,
            "agent state ready"
        );

        let state = Self {
            inner: Arc::new(AgentStateInner {
                cfg,
                registry,
                requests,
                business,
                simulator,
            }),
        };
        Ok((state, Background { samplers, pauses }))
    }

    pub fn cfg(&self) -> &AgentConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<MetricRegistry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn requests(&self) -> Arc<RequestMetrics> {
        Arc::clone(&self.inner.requests)
    }

    pub fn business(&self) -> &BusinessMetrics {
        &self.inner.business
    }

    pub fn simulator(&self) -> Arc<AnomalySimulator> {
        Arc::clone(&self.inner.simulator)
    }
}
