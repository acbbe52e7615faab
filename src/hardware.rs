use esp_hal::{
    delay::Delay,
    gpio::{AnyPin, Input, InputConfig, Level, Output, OutputConfig, Pull},
};

use crate::{max6675::Max6675, traits::SensorError};

/// MAX6675 wired to plain GPIOs
pub type Thermocouple = Max6675<Output<'static>, Output<'static>, Input<'static>, Delay>;

/// Configure the MAX6675 GPIOs and create the driver
pub fn init_thermocouple<SCK, CS, SO>(
    sck_gpio: SCK,
    cs_gpio: CS,
    so_gpio: SO,
) -> Result<Thermocouple, SensorError>
where
    SCK: Into<AnyPin<'static>>,
    CS: Into<AnyPin<'static>>,
    SO: Into<AnyPin<'static>>,
{
    let sck_pin: AnyPin<'static> = sck_gpio.into();
    let cs_pin: AnyPin<'static> = cs_gpio.into();
    let so_pin: AnyPin<'static> = so_gpio.into();

    let sck = Output::new(sck_pin, Level::Low, OutputConfig::default());
    let cs = Output::new(cs_pin, Level::High, OutputConfig::default());
    // SO is tri-stated while CS is high; keep it from floating
    let so = Input::new(so_pin, InputConfig::default().with_pull(Pull::Down));

    let thermocouple = Max6675::new(sck, cs, so, Delay::new())?;
    esp_println::println!("[MAX6675] Ready (SCK, CS, SO configured)");
    Ok(thermocouple)
}
