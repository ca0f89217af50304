//! Simulated GPIO backend
//!
//! Keeps line levels in memory and records every claim, release and output
//! write. Claims and writes can be made to fail per line.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{GpioLine, GpioProvider, Level, LineId};
use crate::error::{AppError, Result};

/// Recorded hardware operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    Claim(LineId),
    Output(LineId, Level),
    Release(LineId),
}

#[derive(Debug)]
struct SimLine {
    level: Level,
    owner: Option<String>,
}

#[derive(Debug, Default)]
struct SimState {
    lines: HashMap<LineId, SimLine>,
    events: Vec<SimEvent>,
    fail_claim: HashSet<LineId>,
    fail_write: HashSet<LineId>,
}

/// In-memory GPIO provider
#[derive(Debug, Clone, Default)]
pub struct SimulatedGpio {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a simulator exposing the given lines, all low
    pub fn with_lines<'a>(ids: impl IntoIterator<Item = &'a LineId>) -> Self {
        let sim = Self::new();
        for id in ids {
            sim.add_line(id.clone());
        }
        sim
    }

    pub fn add_line(&self, id: LineId) {
        self.state.lock().lines.entry(id).or_insert(SimLine {
            level: Level::Low,
            owner: None,
        });
    }

    /// Mark a line as held by another owner
    pub fn occupy(&self, id: &LineId, owner: &str) {
        if let Some(line) = self.state.lock().lines.get_mut(id) {
            line.owner = Some(owner.to_string());
        }
    }

    pub fn fail_claim(&self, id: &LineId) {
        self.state.lock().fail_claim.insert(id.clone());
    }

    pub fn fail_write(&self, id: &LineId) {
        self.state.lock().fail_write.insert(id.clone());
    }

    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.fail_claim.clear();
        state.fail_write.clear();
    }

    /// Current level of a line
    pub fn level(&self, id: &LineId) -> Option<Level> {
        self.state.lock().lines.get(id).map(|line| line.level)
    }

    pub fn is_owned(&self, id: &LineId) -> bool {
        self.state
            .lock()
            .lines
            .get(id)
            .is_some_and(|line| line.owner.is_some())
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.state.lock().events.clone()
    }

    /// Return recorded events and start a fresh log
    pub fn take_events(&self) -> Vec<SimEvent> {
        std::mem::take(&mut self.state.lock().events)
    }

    /// Number of recorded output writes
    pub fn write_count(&self) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|event| matches!(event, SimEvent::Output(..)))
            .count()
    }
}

impl GpioProvider for SimulatedGpio {
    fn name(&self) -> &str {
        "simulated"
    }

    fn resolve(&self, id: &LineId, consumer: &str) -> Result<Box<dyn GpioLine>> {
        let mut state = self.state.lock();
        if state.fail_claim.contains(id) {
            return Err(AppError::unavailable(id, "injected claim failure"));
        }

        let line = state
            .lines
            .get_mut(id)
            .ok_or_else(|| AppError::unavailable(id, "no such line"))?;
        if let Some(owner) = &line.owner {
            return Err(AppError::unavailable(id, format!("line in use by {}", owner)));
        }
        line.owner = Some(consumer.to_string());
        state.events.push(SimEvent::Claim(id.clone()));

        Ok(Box::new(SimLineHandle {
            id: id.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct SimLineHandle {
    id: LineId,
    state: Arc<Mutex<SimState>>,
}

impl GpioLine for SimLineHandle {
    fn set_direction_output(&mut self, level: Level) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_write.contains(&self.id) {
            return Err(AppError::hardware(&self.id, "injected write failure"));
        }
        if let Some(line) = state.lines.get_mut(&self.id) {
            line.level = level;
        }
        state.events.push(SimEvent::Output(self.id.clone(), level));
        Ok(())
    }

    fn get_value(&self) -> Result<Level> {
        self.state
            .lock()
            .lines
            .get(&self.id)
            .map(|line| line.level)
            .ok_or_else(|| AppError::hardware(&self.id, "no such line"))
    }
}

impl Drop for SimLineHandle {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(line) = state.lines.get_mut(&self.id) {
            line.owner = None;
        }
        state.events.push(SimEvent::Release(self.id.clone()));
    }
}
