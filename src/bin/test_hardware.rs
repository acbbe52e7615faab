#![no_std]
#![no_main]

use core::{cell::Cell, convert::Infallible, panic::PanicInfo};
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};

use roastprobe::{
    config::DEVICE_NAME,
    hardware,
    logic::{
        LinkState, SharedSettings, Skip, apply_interval_write, apply_probe_type_write,
        outgoing_packet, sample_period,
    },
    max6675::{MEASUREMENT_PERIOD_MS, Max6675, decode_frame},
    model::{ProbeSettings, Reading, TemperatureUnit},
    rbp::{self, ADV_PAYLOAD_MAX, RbpError, SERVICE_UUID_LE},
    traits::{SensorError, TemperatureSensor},
};

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

// Test result tracking
struct TestResults {
    passed: u32,
    failed: u32,
    total: u32,
}

impl TestResults {
    fn new() -> Self {
        Self {
            passed: 0,
            failed: 0,
            total: 0,
        }
    }

    fn assert(&mut self, condition: bool, test_name: &str) {
        self.total += 1;
        if condition {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED", test_name);
        }
    }

    fn assert_eq<T: PartialEq + core::fmt::Debug>(&mut self, left: T, right: T, test_name: &str) {
        self.total += 1;
        if left == right {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED: {:?} != {:?}", test_name, left, right);
        }
    }

    fn assert_close(&mut self, value: f32, expected: f32, tolerance: f32, test_name: &str) {
        self.total += 1;
        if (value - expected).abs() < tolerance {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!(
                "  ✗ {} FAILED: {:.2} not close to {:.2} (tolerance: {:.2})",
                test_name,
                value,
                expected,
                tolerance
            );
        }
    }

    fn print_summary(&self) {
        esp_println::println!("\n==========================================");
        esp_println::println!("Test Summary:");
        esp_println::println!("  Total:  {}", self.total);
        esp_println::println!("  Passed: {}", self.passed);
        esp_println::println!("  Failed: {}", self.failed);
        if self.failed == 0 {
            esp_println::println!("\n✓ ALL TESTS PASSED!");
        } else {
            esp_println::println!("\n✗ SOME TESTS FAILED");
        }
        esp_println::println!("==========================================");
    }
}

/// MAX6675 shift register driven by the pins below
struct SimulatedChip {
    frame: Cell<u16>,
    bit: Cell<u8>,
    selected: Cell<bool>,
    sck_high: Cell<bool>,
}

impl SimulatedChip {
    fn new(frame: u16) -> Self {
        Self {
            frame: Cell::new(frame),
            bit: Cell::new(0),
            selected: Cell::new(false),
            sck_high: Cell::new(false),
        }
    }
}

struct SimSck<'a>(&'a SimulatedChip);
struct SimCs<'a>(&'a SimulatedChip);
struct SimSo<'a>(&'a SimulatedChip);

impl ErrorType for SimSck<'_> {
    type Error = Infallible;
}

impl ErrorType for SimCs<'_> {
    type Error = Infallible;
}

impl ErrorType for SimSo<'_> {
    type Error = Infallible;
}

impl OutputPin for SimSck<'_> {
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.sck_high.set(true);
        Ok(())
    }

    // Falling edge shifts the next bit out
    fn set_low(&mut self) -> Result<(), Infallible> {
        if self.0.sck_high.get() && self.0.selected.get() {
            self.0.bit.set(self.0.bit.get() + 1);
        }
        self.0.sck_high.set(false);
        Ok(())
    }
}

impl OutputPin for SimCs<'_> {
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.selected.set(false);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.selected.set(true);
        self.0.bit.set(0);
        Ok(())
    }
}

impl InputPin for SimSo<'_> {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        let bit = self.0.bit.get();
        if !self.0.selected.get() || bit > 15 {
            return Ok(false);
        }
        Ok((self.0.frame.get() >> (15 - bit)) & 1 == 1)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

fn test_rbp_protocol(results: &mut TestResults) {
    esp_println::println!("\n[TEST] RBP Protocol Tests");

    results.assert_eq(
        rbp::temperature_packet(22556),
        [0xDC, 0x57, 0x00, 0x00],
        "225.56 encodes as DC 57 00 00",
    );
    results.assert_eq(
        rbp::temperature_packet(-125),
        [0x83, 0xFF, 0xFF, 0xFF],
        "negative temperature is two's complement",
    );

    results.assert_eq(
        rbp::parse_notify_interval(&[0xD0, 0x07]),
        Ok(2000),
        "notify interval parsed little-endian",
    );
    results.assert_eq(
        rbp::parse_notify_interval(&[0x01]),
        Err(RbpError::InvalidLength {
            expected: 2,
            actual: 1,
        }),
        "short notify interval rejected",
    );
    results.assert(
        rbp::parse_notify_interval(&[0x01, 0x02, 0x03]).is_err(),
        "long notify interval rejected",
    );

    results.assert_eq(rbp::parse_probe_type(&[0x01]), Ok(0x01), "one-byte probe type accepted");
    results.assert_eq(
        rbp::parse_probe_type(&[]),
        Err(RbpError::InvalidLength {
            expected: 1,
            actual: 0,
        }),
        "empty probe type rejected",
    );
    results.assert_eq(
        rbp::parse_probe_type(&[0x02, 0x03]),
        Err(RbpError::InvalidLength {
            expected: 1,
            actual: 2,
        }),
        "two-byte probe type rejected",
    );

    results.assert_eq(SERVICE_UUID_LE[0], 0x93, "service UUID starts with last byte");
    results.assert_eq(SERVICE_UUID_LE[15], 0x4a, "service UUID ends with first byte");

    let mut adv = [0u8; ADV_PAYLOAD_MAX];
    match rbp::advertising_data(2000, &mut adv) {
        Ok(len) => {
            results.assert_eq(len, 31, "advertising payload fills 31 bytes");
            results.assert_eq(&adv[0..3], &[0x02, 0x01, 0x06][..], "flags AD structure");
            results.assert_eq(
                &adv[3..7],
                &[0x03, 0x19, 0x00, 0x00][..],
                "appearance AD structure",
            );
            results.assert_eq(
                &adv[5..7],
                &rbp::APPEARANCE.to_le_bytes()[..],
                "advertised appearance matches GAP appearance",
            );
            results.assert_eq(&adv[7..9], &[0x11, 0x07][..], "128-bit UUID list header");
            results.assert_eq(&adv[9..25], &SERVICE_UUID_LE[..], "service UUID reversed");
            results.assert_eq(
                &adv[25..31],
                &[0x05, 0xFF, 0x90, 0x05, 0xD0, 0x07][..],
                "manufacturer data carries interval",
            );
        }
        Err(e) => {
            esp_println::println!("    Advertising payload failed: {}", e);
            results.assert(false, "advertising payload");
        }
    }

    let mut small = [0u8; 8];
    results.assert_eq(
        rbp::advertising_data(2000, &mut small),
        Err(RbpError::BufferTooSmall),
        "advertising payload needs 31 bytes",
    );

    let mut scan = [0u8; ADV_PAYLOAD_MAX];
    match rbp::scan_response_data(DEVICE_NAME, &mut scan) {
        Ok(len) => {
            results.assert_eq(len, DEVICE_NAME.len() + 2, "scan response length");
            results.assert_eq(&scan[0..2], &[DEVICE_NAME.len() as u8 + 1, 0x09][..], "local name header");
            results.assert_eq(&scan[2..len], DEVICE_NAME.as_bytes(), "local name bytes");
        }
        Err(e) => {
            esp_println::println!("    Scan response failed: {}", e);
            results.assert(false, "scan response");
        }
    }
}

fn test_reading_model(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Reading Model Tests");

    let reading = Reading::new(902, false, embassy_time::Instant::now());
    results.assert_close(reading.celsius(), 225.5, 0.001, "quarter degree resolution");
    results.assert_eq(
        reading.hundredths(TemperatureUnit::Celsius),
        22550,
        "Celsius hundredths",
    );

    let boiling = Reading::new(400, false, embassy_time::Instant::now());
    results.assert_eq(
        boiling.hundredths(TemperatureUnit::Fahrenheit),
        21200,
        "100 C is 212 F",
    );

    results.assert_eq(decode_frame(0x0C80), (400, false), "frame 0x0C80 is 100 C");
    results.assert_eq(decode_frame(0x0C84), (400, true), "bit 2 flags open thermocouple");
    results.assert_eq(decode_frame(0xFFFB), (0x0FFF, false), "dummy and id bits ignored");
}

fn test_link_logic(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Link Logic Tests");

    let now = embassy_time::Instant::now();
    let good = Reading::new(902, false, now);
    let open = Reading::new(0, true, now);

    let mut link = LinkState::new();
    results.assert_eq(
        outgoing_packet(&good, &link, TemperatureUnit::Celsius),
        Err(Skip::NotConnected),
        "nothing sent without a central",
    );
    results.assert_eq(
        outgoing_packet(&open, &link, TemperatureUnit::Celsius),
        Err(Skip::SensorFault),
        "sensor fault reported first",
    );

    link.on_connect();
    results.assert(
        link.notifications_enabled(),
        "notifications on after connect without a CCCD write",
    );
    results.assert_eq(
        outgoing_packet(&good, &link, TemperatureUnit::Celsius),
        Ok([0x16, 0x58, 0x00, 0x00]),
        "connected central receives packet",
    );

    results.assert(!link.on_cccd_write(&[0x00, 0x00]), "CCCD 00 00 disables");
    results.assert_eq(
        outgoing_packet(&good, &link, TemperatureUnit::Celsius),
        Err(Skip::NotificationsDisabled),
        "unsubscribed central skipped",
    );
    results.assert(!link.on_cccd_write(&[0x01]), "short CCCD write disables");
    results.assert(link.on_cccd_write(&[0x01, 0x00]), "CCCD 01 00 enables");

    link.on_disconnect();
    results.assert(!link.is_connected(), "disconnect clears connection");
    results.assert(!link.notifications_enabled(), "disconnect clears notifications");

    let settings = SharedSettings::new();
    results.assert_eq(settings.snapshot(), ProbeSettings::default(), "default settings");
    results.assert_eq(
        sample_period(&settings),
        Duration::from_millis(2000),
        "default sample period is 2 s",
    );
    settings.set_interval(50);
    results.assert_eq(
        sample_period(&settings),
        Duration::from_millis(MEASUREMENT_PERIOD_MS),
        "sample period never below conversion time",
    );

    settings.set_interval(500);
    settings.set_probe_type(0x02);
    results.assert_eq(settings.interval(), 500, "interval updated");
    results.assert_eq(settings.probe_type(), 0x02, "probe type updated");

    // Writes from the central
    results.assert_eq(
        apply_interval_write(&settings, &[0xE8, 0x03]),
        Ok(1000),
        "valid interval write applied",
    );
    results.assert(
        apply_interval_write(&settings, &[0x10]).is_err(),
        "short interval write rejected",
    );
    results.assert_eq(settings.interval(), 1000, "rejected interval write leaves setting");

    results.assert_eq(
        apply_probe_type_write(&settings, &[0x03]),
        Ok(0x03),
        "valid probe type write applied",
    );
    results.assert(
        apply_probe_type_write(&settings, &[0x07, 0x08]).is_err(),
        "long probe type write rejected",
    );
    results.assert(
        apply_probe_type_write(&settings, &[]).is_err(),
        "empty probe type write rejected",
    );
    results.assert_eq(settings.probe_type(), 0x03, "rejected probe type write leaves setting");
}

async fn test_max6675_driver(results: &mut TestResults) {
    esp_println::println!("\n[TEST] MAX6675 Driver Tests (simulated chip)");

    let chip = SimulatedChip::new(0x0C80);
    let mut sensor = match Max6675::new(SimSck(&chip), SimCs(&chip), SimSo(&chip), Delay::new()) {
        Ok(sensor) => sensor,
        Err(e) => {
            esp_println::println!("    Driver init failed: {}", e);
            results.assert(false, "driver init");
            return;
        }
    };
    results.assert(!chip.selected.get(), "CS idles high");

    let _ = sensor.refresh();
    results.assert(!sensor.ready(), "not ready right after refresh");
    results.assert_eq(
        sensor.read().map(|r| r.raw),
        Ok(0),
        "early read returns previous value",
    );

    Timer::after(Duration::from_millis(MEASUREMENT_PERIOD_MS + 30)).await;
    results.assert(sensor.ready(), "ready after conversion period");
    match sensor.read() {
        Ok(reading) => {
            results.assert_eq(reading.raw, 400, "raw count shifted in");
            results.assert_close(reading.celsius(), 100.0, 0.001, "100 C decoded");
            results.assert(!sensor.error(), "no open thermocouple");
        }
        Err(e) => {
            esp_println::println!("    Read failed: {}", e);
            results.assert(false, "simulated read");
        }
    }
    results.assert(!chip.selected.get(), "CS released after read");
    results.assert(!sensor.ready(), "read restarts conversion");

    chip.frame.set(0x1900);
    results.assert_eq(
        sensor.read().map(|r| r.raw),
        Ok(400),
        "read during conversion keeps last temperature",
    );

    chip.frame.set(0x0C84);
    Timer::after(Duration::from_millis(MEASUREMENT_PERIOD_MS + 30)).await;
    results.assert_eq(
        sensor.read_temperature(),
        Err(SensorError::OpenCircuit),
        "open thermocouple reported",
    );
    results.assert(sensor.error(), "error bit latched");
}

async fn test_thermocouple_sensor<SCK, CS, SO>(results: &mut TestResults, sck: SCK, cs: CS, so: SO)
where
    SCK: Into<esp_hal::gpio::AnyPin<'static>>,
    CS: Into<esp_hal::gpio::AnyPin<'static>>,
    SO: Into<esp_hal::gpio::AnyPin<'static>>,
{
    esp_println::println!("\n[TEST] MAX6675 Hardware Tests");

    let mut thermocouple = match hardware::init_thermocouple(sck, cs, so) {
        Ok(thermocouple) => thermocouple,
        Err(e) => {
            esp_println::println!("  Failed to initialize MAX6675: {}", e);
            results.assert(false, "MAX6675 initialization");
            return;
        }
    };
    results.assert(true, "MAX6675 initialization");

    esp_println::println!("  Reading temperatures (3 samples)...");
    let mut temps = heapless::Vec::<f32, 3>::new();
    for i in 0..3 {
        let _ = thermocouple.refresh();
        Timer::after(Duration::from_millis(MEASUREMENT_PERIOD_MS + 30)).await;
        match thermocouple.read_temperature() {
            Ok(temp) => {
                esp_println::println!("    Sample {}: {:.2}°C", i + 1, temp);
                let _ = temps.push(temp);
            }
            Err(e) => esp_println::println!("    Failed to read temperature: {}", e),
        }
    }

    results.assert_eq(temps.len(), 3, "collected 3 temperature samples");
    for temp in temps.iter() {
        results.assert(*temp >= 0.0 && *temp < 1024.0, "temperature in MAX6675 range");
    }
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_println::println!("\n==========================================");
    esp_println::println!("=== Hardware Unit Test Runner ===");
    esp_println::println!("==========================================");

    let mut results = TestResults::new();

    // Extract the peripherals we need before initializing RTOS timer
    let gpio2 = peripherals.GPIO2;
    let gpio3 = peripherals.GPIO3;
    let gpio4 = peripherals.GPIO4;

    // Initialize RTOS timer for embassy (this consumes TIMG0)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Run tests that don't need hardware
    test_rbp_protocol(&mut results);
    test_reading_model(&mut results);
    test_link_logic(&mut results);
    test_max6675_driver(&mut results).await;

    // Run hardware tests
    test_thermocouple_sensor(&mut results, gpio2, gpio3, gpio4).await;

    results.print_summary();

    esp_println::println!("\nTest run complete. Looping...");
    loop {
        if results.failed == 0 {
            Timer::after(Duration::from_millis(200)).await;
        } else {
            Timer::after(Duration::from_millis(1000)).await;
        }
    }
}
