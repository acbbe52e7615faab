#![no_std]
#![no_main]

use core::panic::PanicInfo;

use bt_hci::controller::ExternalController;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};
use esp_radio::ble::controller::BleConnector;
use static_cell::StaticCell;

use roastprobe::{
    ble::{self, ReadingSignal},
    config::{HEART_BEAT_INTERVAL_MS, TEMPERATURE_UNIT},
    hardware::{self, Thermocouple},
    logic::{self, SharedSettings},
    traits::TemperatureSensor,
};

static SETTINGS: SharedSettings = SharedSettings::new();
static READINGS: ReadingSignal = ReadingSignal::new();
static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
        esp_println::println!("[PANIC] continue...");
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

#[embassy_executor::task]
async fn run_heartbeat() {
    loop {
        esp_println::println!(
            "[HEARTBEAT] alive, interval {} ms, probe type 0x{:02X}",
            SETTINGS.interval(),
            SETTINGS.probe_type()
        );
        Timer::after(Duration::from_millis(HEART_BEAT_INTERVAL_MS)).await;
    }
}

#[embassy_executor::task]
async fn run_sampler(mut thermocouple: Thermocouple) {
    loop {
        // Start a fresh conversion and wait for it to finish
        if let Err(e) = thermocouple.refresh() {
            esp_println::println!("[MAX6675] Refresh error: {}", e);
        }
        while !thermocouple.ready() {
            Timer::after(Duration::from_millis(10)).await;
        }

        match thermocouple.read() {
            Ok(reading) if reading.open_circuit => {
                esp_println::println!("[MAX6675] Thermocouple open or error.");
                READINGS.signal(reading);
            }
            Ok(reading) => {
                esp_println::println!(
                    "[MAX6675] Current temperature: {:.2} ({} x0.01 {:?})",
                    reading.celsius(),
                    reading.hundredths(TEMPERATURE_UNIT),
                    TEMPERATURE_UNIT
                );
                READINGS.signal(reading);
            }
            Err(e) => esp_println::println!("[MAX6675] Read error: {}", e),
        }

        Timer::after(logic::sample_period(&SETTINGS)).await;
    }
}

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());
    esp_alloc::heap_allocator!(size: 72 * 1024);

    esp_println::println!("=== Roastprobe ===");

    // Initialize RTOS timer for embassy
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    if let Err(e) = spawner.spawn(run_heartbeat()) {
        esp_println::println!("[ERROR] Failed to spawn heartbeat: {:?}", e);
    }

    // MAX6675 on GPIO2 (SCK), GPIO3 (CS), GPIO4 (SO)
    let thermocouple =
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

    if let Err(e) = spawner.spawn(run_sampler(thermocouple)) {
        esp_println::println!("[ERROR] Failed to spawn sampler: {:?}", e);
        loop {
            Timer::after(Duration::from_secs(1)).await;
        }
    }

    let radio = match esp_radio::init() {
        Ok(radio) => RADIO.init(radio),
        Err(e) => {
            esp_println::println!("[ERROR] Radio init failed: {:?}", e);
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };

    let connector = match BleConnector::new(radio, peripherals.BT, Default::default()) {
        Ok(connector) => connector,
        Err(e) => {
            esp_println::println!("[ERROR] BLE connector init failed: {:?}", e);
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };
    let controller: ExternalController<_, 20> = ExternalController::new(connector);

    esp_println::println!("=== Roastmaster BLE peripheral ===");
    ble::run(controller, &SETTINGS, &READINGS).await;

    esp_println::println!("[ERROR] BLE stopped");
    loop {
        Timer::after(Duration::from_secs(1)).await;
    }
}
