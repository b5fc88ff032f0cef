//! Raw sensor source capabilities
//!
//! The core never touches hardware; these traits are the boundary. The
//! platform adapters in `hardware` implement them over GPIO/I2C, the
//! tests implement them over scripted value lists.

use thiserror::Error;

/// Raw read failures from a platform source
#[derive(Debug, Error)]
pub enum SourceError {
    /// The platform layer failed the read
    #[error("sensor read failed: {0}")]
    Read(String),

    /// A scripted test source ran out of values
    #[error("scripted source exhausted after {reads} reads")]
    Exhausted {
        /// Reads served before exhaustion
        reads: usize,
    },
}

/// Boolean sensor line; `true` is the active polarity
pub trait DigitalSource {
    /// One raw read of the line
    fn digital_read(&mut self) -> Result<bool, SourceError>;
}

/// Signed analog sample source
pub trait AnalogSource {
    /// One raw conversion result
    fn analog_read(&mut self) -> Result<i16, SourceError>;
}

/// Scripted digital source for deterministic tests: cycles `values`,
/// erroring out after `stop_after` reads so driver loops terminate.
#[derive(Debug, Clone)]
pub struct ScriptedDigitalSource {
    values: Vec<bool>,
    reads: usize,
    stop_after: usize,
}

impl ScriptedDigitalSource {
    /// Source cycling `values` until `stop_after` reads were served
    pub fn new(values: Vec<bool>, stop_after: usize) -> Self {
        Self {
            values,
            reads: 0,
            stop_after,
        }
    }

    /// Reads served so far
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl DigitalSource for ScriptedDigitalSource {
    fn digital_read(&mut self) -> Result<bool, SourceError> {
        if self.reads >= self.stop_after {
            return Err(SourceError::Exhausted { reads: self.reads });
        }
        let value = self.values[self.reads % self.values.len()];
        self.reads += 1;
        Ok(value)
    }
}

/// Scripted analog source, same shape as [`ScriptedDigitalSource`]
#[derive(Debug, Clone)]
pub struct ScriptedAnalogSource {
    values: Vec<i16>,
    reads: usize,
    stop_after: usize,
}

impl ScriptedAnalogSource {
    /// Source cycling `values` until `stop_after` reads were served
    pub fn new(values: Vec<i16>, stop_after: usize) -> Self {
        Self {
            values,
            reads: 0,
            stop_after,
        }
    }
}

impl AnalogSource for ScriptedAnalogSource {
    fn analog_read(&mut self) -> Result<i16, SourceError> {
        if self.reads >= self.stop_after {
            return Err(SourceError::Exhausted { reads: self.reads });
        }
        let value = self.values[self.reads % self.values.len()];
        self.reads += 1;
        Ok(value)
    }
}
