//! Bit-banged MAX6675 thermocouple-to-digital converter
//!
//! The chip converts continuously while CS is high. Pulling CS low stops the
//! conversion and presents a 16-bit frame on SO, MSB first:
//!
//! ```text
//! 15      14..3        2        1       0
//! dummy   temperature  open TC  dev ID  state
//! ```
//!
//! A full conversion takes up to 220 ms, so reads closer together than that
//! return the previous result.

use embassy_time::{Duration, Instant};
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

use crate::{
    model::Reading,
    traits::{SensorError, TemperatureSensor},
};

pub const MEASUREMENT_PERIOD_MS: u64 = 220;

const CS_SETTLE_US: u32 = 10;
const CLOCK_HALF_PERIOD_US: u32 = 1;
const FRAME_BITS: u8 = 16;
const OPEN_CIRCUIT_BIT: u16 = 1 << 2;

/// Split a raw frame into temperature count and open-thermocouple flag
pub const fn decode_frame(frame: u16) -> (u16, bool) {
    let raw = (frame >> 3) & 0x0FFF;
    let open_circuit = frame & OPEN_CIRCUIT_BIT != 0;
    (raw, open_circuit)
}

pub struct Max6675<SCK, CS, SO, D> {
    sck: SCK,
    cs: CS,
    so: SO,
    delay: D,
    conversion_started: Instant,
    last: Reading,
}

impl<SCK, CS, SO, D> Max6675<SCK, CS, SO, D>
where
    SCK: OutputPin,
    CS: OutputPin,
    SO: InputPin,
    D: DelayNs,
{
    pub fn new(mut sck: SCK, mut cs: CS, so: SO, delay: D) -> Result<Self, SensorError> {
        sck.set_low().map_err(|_| SensorError::Pin)?;
        cs.set_high().map_err(|_| SensorError::Pin)?;

        Ok(Self {
            sck,
            cs,
            so,
            delay,
            conversion_started: Instant::now(),
            last: Reading::default(),
        })
    }

    /// Open-thermocouple bit of the last frame
    pub fn error(&self) -> bool {
        self.last.open_circuit
    }

    fn cycle_sck(&mut self) -> Result<(), SensorError> {
        self.sck.set_high().map_err(|_| SensorError::Pin)?;
        self.delay.delay_us(CLOCK_HALF_PERIOD_US);
        self.sck.set_low().map_err(|_| SensorError::Pin)?;
        self.delay.delay_us(CLOCK_HALF_PERIOD_US);
        Ok(())
    }

    fn sample_so(&mut self) -> Result<u16, SensorError> {
        let high = self.so.is_high().map_err(|_| SensorError::Pin)?;
        Ok(high as u16)
    }

    fn shift_in_frame(&mut self) -> Result<u16, SensorError> {
        // D15 is on SO as soon as CS falls, every later bit after a clock pulse
        let mut frame = self.sample_so()?;
        for _ in 1..FRAME_BITS {
            self.cycle_sck()?;
            frame = (frame << 1) | self.sample_so()?;
        }
        Ok(frame)
    }

    fn read_frame(&mut self) -> Result<u16, SensorError> {
        self.cs.set_low().map_err(|_| SensorError::Pin)?;
        self.delay.delay_us(CS_SETTLE_US);

        let frame = self.shift_in_frame();

        // Raise CS even if sampling failed so the chip resumes converting
        self.cs.set_high().map_err(|_| SensorError::Pin)?;
        self.conversion_started = Instant::now();
        frame
    }
}

impl<SCK, CS, SO, D> TemperatureSensor for Max6675<SCK, CS, SO, D>
where
    SCK: OutputPin,
    CS: OutputPin,
    SO: InputPin,
    D: DelayNs,
{
    fn refresh(&mut self) -> Result<(), SensorError> {
        self.cs.set_low().map_err(|_| SensorError::Pin)?;
        self.delay.delay_us(CS_SETTLE_US);
        self.cs.set_high().map_err(|_| SensorError::Pin)?;
        self.conversion_started = Instant::now();
        Ok(())
    }

    fn ready(&self) -> bool {
        self.conversion_started.elapsed() > Duration::from_millis(MEASUREMENT_PERIOD_MS)
    }

    fn read(&mut self) -> Result<Reading, SensorError> {
        if !self.ready() {
            return Ok(self.last);
        }

        let frame = self.read_frame()?;
        let (raw, open_circuit) = decode_frame(frame);
        self.last = Reading::new(raw, open_circuit, Instant::now());
        Ok(self.last)
    }
}
