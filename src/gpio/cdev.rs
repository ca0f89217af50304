//! GPIO character device backend
//!
//! Lines are looked up on open and requested as outputs on first configure.

use gpio_cdev::{Chip, Line, LineHandle, LineRequestFlags};
use tracing::debug;

use super::{GpioLine, GpioProvider, Level, LineId};
use crate::error::{AppError, Result};

/// Provider backed by /dev/gpiochipX
#[derive(Debug, Default, Clone, Copy)]
pub struct CdevProvider;

impl CdevProvider {
    pub fn new() -> Self {
        Self
    }
}

impl GpioProvider for CdevProvider {
    fn name(&self) -> &str {
        "gpio-cdev"
    }

    fn resolve(&self, id: &LineId, consumer: &str) -> Result<Box<dyn GpioLine>> {
        let path = id.device_path();
        let mut chip = Chip::new(&path)
            .map_err(|e| AppError::unavailable(id, format!("GPIO chip open failed: {}", e)))?;

        let line = chip
            .get_line(id.offset)
            .map_err(|e| AppError::unavailable(id, format!("GPIO line lookup failed: {}", e)))?;

        let info = line
            .info()
            .map_err(|e| AppError::unavailable(id, format!("GPIO line info failed: {}", e)))?;
        if info.is_used() {
            return Err(AppError::unavailable(
                id,
                format!("line in use by {}", info.consumer().unwrap_or("unknown")),
            ));
        }

        debug!("Resolved GPIO line {} on {}", id.offset, path);
        Ok(Box::new(CdevLine {
            id: id.clone(),
            line,
            consumer: consumer.to_string(),
            handle: None,
        }))
    }
}

struct CdevLine {
    id: LineId,
    line: Line,
    consumer: String,
    handle: Option<LineHandle>,
}

impl GpioLine for CdevLine {
    fn set_direction_output(&mut self, level: Level) -> Result<()> {
        match &self.handle {
            Some(handle) => handle
                .set_value(level.into())
                .map_err(|e| AppError::hardware(&self.id, format!("GPIO set failed: {}", e))),
            None => {
                let handle = self
                    .line
                    .request(LineRequestFlags::OUTPUT, level.into(), &self.consumer)
                    .map_err(|e| {
                        AppError::hardware(&self.id, format!("GPIO request failed: {}", e))
                    })?;
                self.handle = Some(handle);
                Ok(())
            }
        }
    }

    fn get_value(&self) -> Result<Level> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| AppError::hardware(&self.id, "GPIO line not configured"))?;
        handle
            .get_value()
            .map(Level::from)
            .map_err(|e| AppError::hardware(&self.id, format!("GPIO read failed: {}", e)))
    }
}
