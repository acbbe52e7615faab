//! Compile-time configuration of the probe

use crate::model::TemperatureUnit;

/// Name in the scan response and the GAP device name
pub const DEVICE_NAME: &str = "RBPThermocouple";

/// Device Information Service serial number string
pub const SERIAL_NUMBER: &[u8; 7] = b"SN12345";

/// Notify interval until the central writes a new one
pub const DEFAULT_NOTIFY_INTERVAL_MS: u16 = 2_000;

/// Probe type advertised to the app (0x01 = type K)
pub const DEFAULT_PROBE_TYPE: u8 = 0x01;

/// Unit of the notified temperature
pub const TEMPERATURE_UNIT: TemperatureUnit = TemperatureUnit::Celsius;

pub const ADVERTISING_INTERVAL_MS: u64 = 100;

/// Static random BLE address. The two top bits must be set.
pub const BLE_ADDRESS: [u8; 6] = [0x4a, 0xc9, 0x00, 0x0b, 0x71, 0xff];

pub const HEART_BEAT_INTERVAL_MS: u64 = 10_000;

// MAX6675 wiring
// SCK => GPIO2 (output)
// CS  => GPIO3 (output)
// SO  => GPIO4 (input)
