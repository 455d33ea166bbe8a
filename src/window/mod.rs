//! Rolling Window Store - bounded per-machine reading history
//!
//! Each machine owns a FIFO window of its most recent readings. The machine's
//! worker is the only writer; readers (classifier, API, exporter) always get an
//! independent copy taken under a read lock, never a live reference.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::types::Reading;

/// Bounded, insertion-ordered history of readings for one machine.
#[derive(Debug, Clone)]
pub struct MachineState {
    capacity: usize,
    readings: VecDeque<Reading>,
}

impl MachineState {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            readings: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a reading, evicting and returning the oldest one when full.
    pub fn push(&mut self, reading: Reading) -> Option<Reading> {
        let evicted = if self.readings.len() >= self.capacity {
            self.readings.pop_front()
        } else {
            None
        };
        self.readings.push_back(reading);
        evicted
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// Oldest-first copy of the window.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }
}

type SharedState = Arc<RwLock<MachineState>>;

/// All machine windows, keyed by machine id.
#[derive(Debug)]
pub struct WindowStore {
    capacity: usize,
    machines: RwLock<HashMap<String, SharedState>>,
}

impl WindowStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            machines: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store with empty windows for a static machine registry.
    pub fn with_machines<I, S>(capacity: usize, machine_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let machines = machine_ids
            .into_iter()
            .map(|id| (id.into(), Arc::new(RwLock::new(MachineState::new(capacity)))))
            .collect();
        Self {
            capacity,
            machines: RwLock::new(machines),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a reading to a machine's window. Unknown ids get a fresh window.
    pub fn push(&self, machine_id: &str, reading: Reading) {
        let state = self.state_or_insert(machine_id);
        let mut guard = write_state(&state);
        if guard.push(reading).is_some() {
            debug!(machine = %machine_id, capacity = guard.capacity(), "Window full, evicted oldest reading");
        }
    }

    /// Point-in-time copy of a machine's window, oldest first.
    ///
    /// `None` if the machine has never been registered or pushed to.
    pub fn snapshot(&self, machine_id: &str) -> Option<Vec<Reading>> {
        let state = self.state(machine_id)?;
        let guard = read_state(&state);
        Some(guard.snapshot())
    }

    pub fn len(&self, machine_id: &str) -> usize {
        self.state(machine_id)
            .map(|s| read_state(&s).len())
            .unwrap_or(0)
    }

    /// Known machine ids, sorted.
    pub fn machine_ids(&self) -> Vec<String> {
        let map = self.machines.read().unwrap_or_else(|e| {
            warn!("RwLock poisoned on window registry read, recovering");
            e.into_inner()
        });
        let mut ids: Vec<String> = map.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn state(&self, machine_id: &str) -> Option<SharedState> {
        let map = self.machines.read().unwrap_or_else(|e| {
            warn!("RwLock poisoned on window registry read, recovering");
            e.into_inner()
        });
        map.get(machine_id).cloned()
    }

    fn state_or_insert(&self, machine_id: &str) -> SharedState {
        if let Some(state) = self.state(machine_id) {
            return state;
        }
        let mut map = self.machines.write().unwrap_or_else(|e| {
            warn!("RwLock poisoned on window registry write, recovering");
            e.into_inner()
        });
        map.entry(machine_id.to_string())
            .or_insert_with(|| {
                debug!(machine = %machine_id, "Creating window for unregistered machine");
                Arc::new(RwLock::new(MachineState::new(self.capacity)))
            })
            .clone()
    }
}

fn read_state(state: &RwLock<MachineState>) -> RwLockReadGuard<'_, MachineState> {
    state.read().unwrap_or_else(|e| {
        warn!("RwLock poisoned on machine window read, recovering");
        e.into_inner()
    })
}

fn write_state(state: &RwLock<MachineState>) -> RwLockWriteGuard<'_, MachineState> {
    state.write().unwrap_or_else(|e| {
        warn!("RwLock poisoned on machine window write, recovering");
        e.into_inner()
    })
}
