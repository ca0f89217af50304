//! GPIO line resource management
//!
//! Lines are resolved through a [`GpioProvider`] and handed out as
//! [`ClaimedLine`] guards. A guard owns its line exclusively and releases it
//! when dropped, so a partially completed setup unwinds by simply returning.
//!
//! # Backends
//!
//! - [`cdev::CdevProvider`]: Linux GPIO character device (/dev/gpiochipX)
//! - [`sim::SimulatedGpio`]: in-memory lines with fault injection

pub mod cdev;
pub mod sim;

use std::collections::HashSet;
use std::fmt;
use std::ops::Not;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AppError, Result};

/// Identifier of a single GPIO line: chip name or path plus line offset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineId {
    /// Chip name (`gpiochip0`) or device path (`/dev/gpiochip0`)
    pub chip: String,
    /// Line offset on the chip
    pub offset: u32,
}

impl LineId {
    pub fn new(chip: impl Into<String>, offset: u32) -> Self {
        Self {
            chip: chip.into(),
            offset,
        }
    }

    /// Device node path for the chip
    pub fn device_path(&self) -> String {
        if self.chip.starts_with('/') {
            self.chip.clone()
        } else {
            format!("/dev/{}", self.chip)
        }
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chip, self.offset)
    }
}

/// Logical level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    High,
}

impl From<u8> for Level {
    fn from(value: u8) -> Self {
        if value == 0 {
            Self::Low
        } else {
            Self::High
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        match level {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

impl Not for Level {
    type Output = Level;

    fn not(self) -> Self::Output {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "low"),
            Level::High => write!(f, "high"),
        }
    }
}

/// A resolved hardware line
///
/// Dropping the boxed line returns it to the underlying driver.
pub trait GpioLine: Send {
    /// Configure the line as output and drive it to `level`
    fn set_direction_output(&mut self, level: Level) -> Result<()>;

    /// Read the current logical level
    fn get_value(&self) -> Result<Level>;
}

/// Resolves line identifiers into hardware lines
pub trait GpioProvider: Send + Sync {
    /// Backend name for diagnostics
    fn name(&self) -> &str;

    /// Resolve and reserve a line
    ///
    /// Fails with [`AppError::ResourceUnavailable`] if the line does not exist
    /// or is held by another owner.
    fn resolve(&self, id: &LineId, consumer: &str) -> Result<Box<dyn GpioLine>>;
}

/// Line resource manager
///
/// Tracks every line claimed through it and refuses double claims.
#[derive(Clone)]
pub struct LineManager {
    provider: Arc<dyn GpioProvider>,
    claimed: Arc<Mutex<HashSet<LineId>>>,
}

impl LineManager {
    pub fn new(provider: Arc<dyn GpioProvider>) -> Self {
        Self {
            provider,
            claimed: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Claim a line exclusively
    pub fn claim(&self, id: &LineId, consumer: &str) -> Result<ClaimedLine> {
        // Hold the set lock across resolve so two claimers cannot race.
        let mut claimed = self.claimed.lock();
        if claimed.contains(id) {
            return Err(AppError::unavailable(id, "line already claimed"));
        }

        let line = self.provider.resolve(id, consumer)?;
        claimed.insert(id.clone());
        debug!("Claimed line {} via {} as {}", id, self.provider.name(), consumer);

        Ok(ClaimedLine {
            id: id.clone(),
            line: Some(line),
            last_written: None,
            claimed: Arc::clone(&self.claimed),
        })
    }

    /// Number of lines currently claimed
    pub fn claimed_count(&self) -> usize {
        self.claimed.lock().len()
    }

    /// Check whether a line is currently claimed
    pub fn is_claimed(&self, id: &LineId) -> bool {
        self.claimed.lock().contains(id)
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }
}

/// Exclusively owned line, released on drop
pub struct ClaimedLine {
    id: LineId,
    line: Option<Box<dyn GpioLine>>,
    last_written: Option<Level>,
    claimed: Arc<Mutex<HashSet<LineId>>>,
}

impl ClaimedLine {
    pub fn id(&self) -> &LineId {
        &self.id
    }

    pub fn is_released(&self) -> bool {
        self.line.is_none()
    }

    /// Last level written through this handle
    pub fn last_written(&self) -> Option<Level> {
        self.last_written
    }

    /// Configure as output and drive to `level`
    pub fn set_direction_output(&mut self, level: Level) -> Result<()> {
        let line = self
            .line
            .as_mut()
            .ok_or_else(|| AppError::hardware(&self.id, "line released"))?;
        line.set_direction_output(level)?;
        self.last_written = Some(level);
        Ok(())
    }

    /// Read the hardware level
    pub fn get_value(&self) -> Result<Level> {
        let line = self
            .line
            .as_ref()
            .ok_or_else(|| AppError::hardware(&self.id, "line released"))?;
        line.get_value()
    }

    /// Current level, falling back to the last written value if the read fails
    pub fn current_level(&self) -> Option<Level> {
        match self.get_value() {
            Ok(level) => Some(level),
            Err(e) => {
                warn!("Failed to read line {}: {}", self.id, e);
                self.last_written
            }
        }
    }

    /// Release the line; releasing twice is a no-op
    pub fn release(&mut self) {
        if let Some(line) = self.line.take() {
            drop(line);
            self.claimed.lock().remove(&self.id);
            debug!("Released line {}", self.id);
        }
    }
}

impl fmt::Debug for ClaimedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimedLine")
            .field("id", &self.id)
            .field("released", &self.is_released())
            .field("last_written", &self.last_written)
            .finish()
    }
}

impl Drop for ClaimedLine {
    fn drop(&mut self) {
        self.release();
    }
}
