// Model of the data read in this app

use embassy_time::Instant;

/// Degrees per MAX6675 count is 0.25, i.e. 25 hundredths
const HUNDREDTHS_PER_COUNT: i32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

/// One decoded MAX6675 conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    /// 12-bit temperature count, 0.25 °C per LSB
    pub raw: u16,
    /// Thermocouple input is open (damaged or loose)
    pub open_circuit: bool,
    pub taken_at: Instant,
}

impl Reading {
    pub const fn new(raw: u16, open_circuit: bool, taken_at: Instant) -> Self {
        Self {
            raw: raw & 0x0FFF,
            open_circuit,
            taken_at,
        }
    }

    pub fn celsius(&self) -> f32 {
        self.raw as f32 * 0.25
    }

    /// Temperature in hundredths of a degree, computed without floats
    pub fn hundredths(&self, unit: TemperatureUnit) -> i32 {
        let centi_c = self.raw as i32 * HUNDREDTHS_PER_COUNT;
        match unit {
            TemperatureUnit::Celsius => centi_c,
            TemperatureUnit::Fahrenheit => centi_c * 9 / 5 + 3_200,
        }
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::new(0, false, Instant::from_ticks(0))
    }
}

/// Settings the central may change over BLE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub notify_interval_ms: u16,
    pub probe_type: u8,
}
