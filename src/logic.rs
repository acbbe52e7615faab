//! Business logic layer (hardware-independent)

use core::cell::Cell;

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use embassy_time::Duration;

use crate::{
    config::{DEFAULT_NOTIFY_INTERVAL_MS, DEFAULT_PROBE_TYPE},
    max6675::MEASUREMENT_PERIOD_MS,
    model::{ProbeSettings, Reading, TemperatureUnit},
    rbp::{self, CCCD_NOTIFY, RbpError},
};

/// Why a reading was not sent to the central
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    SensorFault,
    NotConnected,
    NotificationsDisabled,
}

impl Skip {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Skip::SensorFault => "Thermocouple open or error",
            Skip::NotConnected => "No connections to notify",
            Skip::NotificationsDisabled => "Notifications are not enabled by the central",
        }
    }
}

/// Connection and subscription state of the BLE link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkState {
    connected: bool,
    notifications_enabled: bool,
}

impl LinkState {
    pub const fn new() -> Self {
        Self {
            connected: false,
            notifications_enabled: false,
        }
    }

    /// Roastmaster does not always subscribe, so notifications start enabled
    pub fn on_connect(&mut self) {
        self.connected = true;
        self.notifications_enabled = true;
    }

    pub fn on_disconnect(&mut self) {
        self.connected = false;
        self.notifications_enabled = false;
    }

    /// Returns the new subscription state
    pub fn on_cccd_write(&mut self, value: &[u8]) -> bool {
        self.notifications_enabled = value == CCCD_NOTIFY;
        self.notifications_enabled
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }
}

/// Decide whether `reading` goes out and encode it if so
pub fn outgoing_packet(
    reading: &Reading,
    link: &LinkState,
    unit: TemperatureUnit,
) -> Result<[u8; 4], Skip> {
    if reading.open_circuit {
        return Err(Skip::SensorFault);
    }
    if !link.connected {
        return Err(Skip::NotConnected);
    }
    if !link.notifications_enabled {
        return Err(Skip::NotificationsDisabled);
    }
    Ok(rbp::temperature_packet(reading.hundredths(unit)))
}

impl ProbeSettings {
    pub const fn new() -> Self {
        Self {
            notify_interval_ms: DEFAULT_NOTIFY_INTERVAL_MS,
            probe_type: DEFAULT_PROBE_TYPE,
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings shared between the BLE task and the sampler
pub struct SharedSettings {
    inner: Mutex<CriticalSectionRawMutex, Cell<ProbeSettings>>,
}

impl SharedSettings {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(ProbeSettings::new())),
        }
    }

    pub fn snapshot(&self) -> ProbeSettings {
        self.inner.lock(|cell| cell.get())
    }

    /// Notify interval in milliseconds
    pub fn interval(&self) -> u16 {
        self.snapshot().notify_interval_ms
    }

    pub fn probe_type(&self) -> u8 {
        self.snapshot().probe_type
    }

    pub fn set_interval(&self, interval_ms: u16) {
        self.inner.lock(|cell| {
            let mut settings = cell.get();
            settings.notify_interval_ms = interval_ms;
            cell.set(settings);
        });
    }

    pub fn set_probe_type(&self, probe_type: u8) {
        self.inner.lock(|cell| {
            let mut settings = cell.get();
            settings.probe_type = probe_type;
            cell.set(settings);
        });
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Time between samples. Never shorter than one conversion.
pub fn sample_period(settings: &SharedSettings) -> Duration {
    let ms = (settings.interval() as u64).max(MEASUREMENT_PERIOD_MS);
    Duration::from_millis(ms)
}

/// Apply a central's write to the notify interval. Invalid writes leave the
/// settings untouched.
pub fn apply_interval_write(settings: &SharedSettings, data: &[u8]) -> Result<u16, RbpError> {
    let interval_ms = rbp::parse_notify_interval(data)?;
    settings.set_interval(interval_ms);
    Ok(interval_ms)
}

/// Apply a central's write to the probe type. Invalid writes leave the
/// settings untouched.
pub fn apply_probe_type_write(settings: &SharedSettings, data: &[u8]) -> Result<u8, RbpError> {
    let probe_type = rbp::parse_probe_type(data)?;
    settings.set_probe_type(probe_type);
    Ok(probe_type)
}
