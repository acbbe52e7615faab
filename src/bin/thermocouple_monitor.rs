//! Thermocouple monitor
//!
//! Reads the MAX6675 every two seconds and prints the result, without
//! bringing up the radio. Useful for checking the wiring:
//! - SCK => GPIO2
//! - CS  => GPIO3
//! - SO  => GPIO4

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};

use roastprobe::{
    config::{DEFAULT_NOTIFY_INTERVAL_MS, TEMPERATURE_UNIT},
    hardware,
    rbp,
    traits::TemperatureSensor,
};

esp_bootloader_esp_idf::esp_app_desc!();

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
        esp_println::println!("[PANIC] continue...");
    }
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let mut thermocouple =
        match hardware::init_thermocouple(peripherals.GPIO2, peripherals.GPIO3, peripherals.GPIO4)
        {
            Ok(thermocouple) => thermocouple,
            Err(e) => {
                esp_println::println!("[ERROR] MAX6675 init failed: {}", e);
                loop {
                    Timer::after(Duration::from_secs(1)).await;
                }
            }
        };

    loop {
        if let Err(e) = thermocouple.refresh() {
            esp_println::println!("[MAX6675] Refresh error: {}", e);
        }
        while !thermocouple.ready() {
            Timer::after(Duration::from_millis(10)).await;
        }

        match thermocouple.read() {
            Ok(reading) if reading.open_circuit => {
                esp_println::println!("[MAX6675] Thermocouple open or error.")
            }
            Ok(reading) => {
                let packet = rbp::temperature_packet(reading.hundredths(TEMPERATURE_UNIT));
                esp_println::println!(
                    "[MAX6675] {:.2}°C (raw 0x{:03X}, RBP {:02x?})",
                    reading.celsius(),
                    reading.raw,
                    packet
                );
            }
            Err(e) => esp_println::println!("[MAX6675] Read error: {}", e),
        }

        Timer::after(Duration::from_millis(DEFAULT_NOTIFY_INTERVAL_MS as u64)).await;
    }
}
