//! Roastmaster Bluetooth Protocol (RBP)
//!
//! Wire constants and the byte layouts the Roastmaster app expects from an
//! external probe: the advertising payload, the scan response and the
//! temperature notification.

use core::fmt;

use trouble_host::prelude::{AdStructure, BR_EDR_NOT_SUPPORTED, LE_GENERAL_DISCOVERABLE};

/// Maximum legacy advertising payload
pub const ADV_PAYLOAD_MAX: usize = 31;

pub const SERVICE_UUID: &str = "4ac90000-0b71-11e8-b8f5-b827ebe1d493";
pub const TEMPERATURE_UUID: &str = "4ac90001-0b71-11e8-b8f5-b827ebe1d493";
pub const NOTIFY_INTERVAL_UUID: &str = "4ac90002-0b71-11e8-b8f5-b827ebe1d493";
pub const PROBE_TYPE_UUID: &str = "4ac90003-0b71-11e8-b8f5-b827ebe1d493";

/// Service UUID in the textual (big-endian) byte order
const SERVICE_UUID_BE: [u8; 16] = [
    0x4a, 0xc9, 0x00, 0x00, 0x0b, 0x71, 0x11, 0xe8, 0xb8, 0xf5, 0xb8, 0x27, 0xeb, 0xe1, 0xd4, 0x93,
];

/// Service UUID as it goes over the air
pub const SERVICE_UUID_LE: [u8; 16] = reversed(SERVICE_UUID_BE);

/// Rainfrog, Inc.
pub const COMPANY_ID: u16 = 0x0590;

/// AD type for the GAP appearance field
const AD_TYPE_APPEARANCE: u8 = 0x19;

/// GAP appearance, advertised and in the GAP service. 0x0000 is "unknown".
pub const APPEARANCE: u16 = 0x0000;

/// CCCD value a central writes to subscribe to notifications
pub const CCCD_NOTIFY: [u8; 2] = [0x01, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RbpError {
    /// A characteristic write carried the wrong number of bytes
    InvalidLength { expected: usize, actual: usize },
    /// The AD structures did not fit the output buffer
    BufferTooSmall,
}

impl fmt::Display for RbpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RbpError::InvalidLength { expected, actual } => {
                write!(f, "expected {} bytes, got {}", expected, actual)
            }
            RbpError::BufferTooSmall => f.write_str("advertising buffer too small"),
        }
    }
}

const fn reversed(be: [u8; 16]) -> [u8; 16] {
    let mut le = [0u8; 16];
    let mut i = 0;
    while i < 16 {
        le[i] = be[15 - i];
        i += 1;
    }
    le
}

/// Temperature notification: hundredths of a degree as a little-endian
/// two's complement Int32. 225.56 => 22556 => `DC 57 00 00`.
pub const fn temperature_packet(hundredths: i32) -> [u8; 4] {
    hundredths.to_le_bytes()
}

/// Parse a write to the notify interval characteristic (u16 LE, ms)
pub fn parse_notify_interval(data: &[u8]) -> Result<u16, RbpError> {
    match data {
        [lo, hi] => Ok(u16::from_le_bytes([*lo, *hi])),
        _ => Err(RbpError::InvalidLength {
            expected: 2,
            actual: data.len(),
        }),
    }
}

/// Parse a write to the probe type characteristic (one byte)
pub fn parse_probe_type(data: &[u8]) -> Result<u8, RbpError> {
    match data {
        [probe_type] => Ok(*probe_type),
        _ => Err(RbpError::InvalidLength {
            expected: 1,
            actual: data.len(),
        }),
    }
}

/// Build the advertising payload into `buf`, returning its length.
///
/// Layout: flags, appearance, complete 128-bit service UUID list and the
/// manufacturer data carrying the notify interval. This fills all 31 bytes.
pub fn advertising_data(notify_interval_ms: u16, buf: &mut [u8]) -> Result<usize, RbpError> {
    let appearance = APPEARANCE.to_le_bytes();
    let interval = notify_interval_ms.to_le_bytes();
    AdStructure::encode_slice(
        &[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            AdStructure::Unknown {
                ty: AD_TYPE_APPEARANCE,
                data: &appearance,
            },
            AdStructure::ServiceUuids128(&[SERVICE_UUID_LE]),
            AdStructure::ManufacturerSpecificData {
                company_identifier: COMPANY_ID,
                payload: &interval,
            },
        ],
        buf,
    )
    .map_err(|_| RbpError::BufferTooSmall)
}

/// Build the scan response (complete local name) into `buf`
pub fn scan_response_data(name: &str, buf: &mut [u8]) -> Result<usize, RbpError> {
    AdStructure::encode_slice(&[AdStructure::CompleteLocalName(name.as_bytes())], buf)
        .map_err(|_| RbpError::BufferTooSmall)
}
