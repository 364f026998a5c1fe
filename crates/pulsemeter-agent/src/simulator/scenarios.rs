//! Built-in scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::fault::{FaultModel, BASELINE_DB_CONNECTIONS};
use super::machine::{Cadence, Recovery, Scenario};
use crate::samplers::pause::{PauseEvent, PauseReporter, PAUSE_KIND_MAJOR};

const fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

/// Pool connections are taken and never returned.
#[derive(Debug, Default)]
pub struct ConnectionLeak;

impl ConnectionLeak {
    pub const STEP: u64 = 2;
    pub const THRESHOLD: u64 = 50;
}

impl Scenario for ConnectionLeak {
    fn name(&self) -> &'static str {
        "connection_leak"
    }

    fn cadence(&self) -> Cadence {
        Cadence { first: secs(10), every: secs(10) }
    }

    fn escalate(&self, fault: &FaultModel) -> bool {
        fault.add_db_connections(Self::STEP) > Self::THRESHOLD
    }

    fn recovery(&self) -> Recovery {
        Recovery::ResetAfter(secs(300))
    }

    fn recover(&self, fault: &FaultModel) -> bool {
        fault.set_db_connections(BASELINE_DB_CONNECTIONS);
        true
    }
}

/// A sudden burst of misses that recovers as the cache warms up again.
#[derive(Debug, Default)]
pub struct CacheInvalidation {
    hits_before: Mutex<Option<u64>>,
}

impl CacheInvalidation {
    pub const MISS_BURST: u64 = 1000;
}

impl Scenario for CacheInvalidation {
    fn name(&self) -> &'static str {
        "cache_invalidation"
    }

    fn cadence(&self) -> Cadence {
        Cadence { first: Duration::ZERO, every: Duration::ZERO }
    }

    fn escalate(&self, fault: &FaultModel) -> bool {
        *self.hits_before.lock().unwrap_or_else(PoisonError::into_inner) = Some(fault.cache_hits());
        fault.add_cache_misses(Self::MISS_BURST);
        true
    }

    fn recovery(&self) -> Recovery {
        Recovery::ResetAfter(secs(600))
    }

    fn recover(&self, fault: &FaultModel) -> bool {
        if let Some(hits) = self
            .hits_before
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            fault.set_cache_hits(hits);
        }
        fault.set_cache_misses(fault.cache_misses() / 5);
        true
    }
}

/// Background jobs pile up faster than workers drain them.
#[derive(Debug, Default)]
pub struct QueueBackup;

impl QueueBackup {
    pub const STEP: u64 = 10;
    pub const THRESHOLD: u64 = 500;
    pub const DRAIN: u64 = 20;
}

impl Scenario for QueueBackup {
    fn name(&self) -> &'static str {
        "queue_backup"
    }

    fn cadence(&self) -> Cadence {
        Cadence { first: secs(5), every: secs(5) }
    }

    fn escalate(&self, fault: &FaultModel) -> bool {
        fault.add_queue_length(Self::STEP) > Self::THRESHOLD
    }

    fn recovery(&self) -> Recovery {
        Recovery::Decay { after: secs(5), every: secs(5) }
    }

    fn recover(&self, fault: &FaultModel) -> bool {
        fault.drain_queue(Self::DRAIN) == 0
    }
}

/// Memory grows until a collection-style release frees it all at once.
///
/// Each step pins a real ballast block; the release is timed and reported as
/// a major pause when a reporter is attached.
pub struct MemoryLeak {
    ballast: Mutex<Vec<Box<[u8]>>>,
    pauses: Option<PauseReporter>,
}

impl MemoryLeak {
    pub const STEP: u64 = 1000;
    pub const THRESHOLD: u64 = 50_000;
    pub const BLOCK_BYTES: usize = 64 * 1024;

    pub fn new(pauses: Option<PauseReporter>) -> Self {
        Self {
            ballast: Mutex::new(Vec::new()),
            pauses,
        }
    }

    pub fn ballast_blocks(&self) -> usize {
        self.ballast.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Scenario for MemoryLeak {
    fn name(&self) -> &'static str {
        "memory_leak"
    }

    fn cadence(&self) -> Cadence {
        Cadence { first: secs(10), every: secs(10) }
    }

    fn escalate(&self, fault: &FaultModel) -> bool {
        self.ballast
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(vec![0xA5u8; Self::BLOCK_BYTES].into_boxed_slice());
        fault.add_leaked_units(Self::STEP) > Self::THRESHOLD
    }

    fn recovery(&self) -> Recovery {
        Recovery::ResetAfter(secs(180))
    }

    fn recover(&self, fault: &FaultModel) -> bool {
        let started = Instant::now();
        let released = std::mem::take(&mut *self.ballast.lock().unwrap_or_else(PoisonError::into_inner));
        drop(released);
        fault.set_leaked_units(0);

        if let Some(pauses) = &self.pauses {
            pauses.report(PauseEvent {
                kind: PAUSE_KIND_MAJOR,
                duration: started.elapsed(),
            });
        }
        true
    }
}

/// A crowd of synthetic users arrives at once and leaves one by one.
#[derive(Debug, Default)]
pub struct UserSpike {
    departed: AtomicUsize,
}

impl UserSpike {
    pub const USERS: usize = 500;

    fn user_id(i: usize) -> String {
        format!("spike_user_{i}")
    }
}

impl Scenario for UserSpike {
    fn name(&self) -> &'static str {
        "user_spike"
    }

    fn cadence(&self) -> Cadence {
        Cadence { first: Duration::ZERO, every: Duration::ZERO }
    }

    fn escalate(&self, fault: &FaultModel) -> bool {
        self.departed.store(0, Ordering::Relaxed);
        for i in 0..Self::USERS {
            fault.add_active_user(Self::user_id(i));
        }
        true
    }

    fn recovery(&self) -> Recovery {
        Recovery::Decay { after: secs(300), every: secs(1) }
    }

    fn recover(&self, fault: &FaultModel) -> bool {
        let i = self.departed.fetch_add(1, Ordering::Relaxed);
        fault.remove_active_user(&Self::user_id(i));
        i + 1 >= Self::USERS
    }
}
