//! Hardware abstraction traits

use core::fmt;

use crate::model::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// A GPIO line could not be driven or sampled
    Pin,
    /// The thermocouple is open or loosely connected
    OpenCircuit,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::Pin => f.write_str("GPIO error"),
            SensorError::OpenCircuit => f.write_str("thermocouple open"),
        }
    }
}

/// Trait for temperature sensors that convert in the background
pub trait TemperatureSensor {
    /// Start a new conversion
    fn refresh(&mut self) -> Result<(), SensorError>;

    /// True once the conversion started by `refresh` has finished
    fn ready(&self) -> bool;

    /// Read the last conversion. Returns the previous reading if the
    /// current conversion is not finished yet.
    fn read(&mut self) -> Result<Reading, SensorError>;

    /// Read temperature in Celsius, failing on a sensor fault
    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        let reading = self.read()?;
        if reading.open_circuit {
            return Err(SensorError::OpenCircuit);
        }
        Ok(reading.celsius())
    }
}
