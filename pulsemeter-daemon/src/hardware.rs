//! Raspberry Pi sensor adapters (feature `rpi`)
//!
//! Thin shims from the deployed hardware onto the source capabilities;
//! everything interesting happens in the core. Kept behind a feature so
//! the rest of the daemon builds and tests off-target.
//!
//! - Digital: LJ12A3-4-Z/BX inductive proximity switch, NPN-NO, sense
//!   wire on a GPIO pin with the internal pull-up. The line reads LOW
//!   while metal is detected, so LOW maps to the active polarity.
//! - Analog: SS49/AH49-class Hall sensor into an ADS1115 ADC on I2C.

use rppal::gpio::{Gpio, InputPin};
use rppal::i2c::I2c;

use crate::source::{AnalogSource, DigitalSource, SourceError};

/// ADS1115 I2C address with the address pin strapped to GND
const ADS1115_ADDRESS: u16 = 0x48;

/// Conversion result register
const ADS1115_REG_CONVERSION: u8 = 0x00;

/// Configuration register
const ADS1115_REG_CONFIG: u8 = 0x01;

/// Config word, MSB first: begin conversion, mux AIN0/GND, PGA
/// +/-4.096 V, continuous mode, 128 SPS, comparator disabled.
const ADS1115_CONFIG: u16 = 0b1_100_001_0_100_0_0_0_11;

/// Proximity switch on a GPIO (BCM) pin
pub struct GpioPulseSource {
    pin: InputPin,
}

impl GpioPulseSource {
    /// Claim the pin and enable its pull-up
    pub fn open(gpio_pin: u8) -> Result<Self, SourceError> {
        let gpio = Gpio::new().map_err(|e| SourceError::Read(e.to_string()))?;
        let pin = gpio
            .get(gpio_pin)
            .map_err(|e| SourceError::Read(e.to_string()))?
            .into_input_pullup();
        Ok(Self { pin })
    }
}

impl DigitalSource for GpioPulseSource {
    fn digital_read(&mut self) -> Result<bool, SourceError> {
        // NPN-NO: LOW while metal is detected
        Ok(self.pin.is_low())
    }
}

/// Hall sensor behind the ADS1115
pub struct Ads1115Source {
    i2c: I2c,
}

impl Ads1115Source {
    /// Open the bus and write the conversion configuration
    pub fn open(i2c_bus: u8) -> Result<Self, SourceError> {
        let mut i2c =
            I2c::with_bus(i2c_bus).map_err(|e| SourceError::Read(e.to_string()))?;
        i2c.set_slave_address(ADS1115_ADDRESS)
            .map_err(|e| SourceError::Read(e.to_string()))?;
        i2c.block_write(ADS1115_REG_CONFIG, &ADS1115_CONFIG.to_be_bytes())
            .map_err(|e| SourceError::Read(e.to_string()))?;
        Ok(Self { i2c })
    }
}

impl AnalogSource for Ads1115Source {
    fn analog_read(&mut self) -> Result<i16, SourceError> {
        let mut buf = [0u8; 2];
        self.i2c
            .block_read(ADS1115_REG_CONVERSION, &mut buf)
            .map_err(|e| SourceError::Read(e.to_string()))?;
        Ok(i16::from_be_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_word_matches_the_datasheet_fields() {
        assert_eq!(ADS1115_CONFIG, 0xC283);
    }
}
