//! Roastmaster thermocouple probe firmware for the ESP32-S3.
//!
//! A MAX6675 is read over bit-banged GPIO and each reading is pushed to the
//! Roastmaster app as an RBP notification over BLE.

#![no_std]

pub mod ble;
pub mod config;
pub mod hardware;
pub mod logic;
pub mod max6675;
pub mod model;
pub mod rbp;
pub mod traits;
