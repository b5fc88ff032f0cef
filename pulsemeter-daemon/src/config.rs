//! Daemon configuration from the environment and argv
//!
//! The contract matches the deployment units: one positional argument
//! picks the physical channel, environment variables pick the broker,
//! topic, and device identity. Parsed once at startup; anything invalid
//! is a usage error before tasks spawn.

use std::env;

use thiserror::Error;

/// Configuration errors surfaced as usage messages
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The positional channel argument is missing
    #[error("missing channel argument (GPIO pin number)")]
    MissingChannel,

    /// The positional channel argument did not parse
    #[error("invalid channel argument {0:?}: expected a GPIO pin number")]
    InvalidChannel(String),

    /// The broker port did not parse
    #[error("invalid PULSEMETER_PORT {0:?}")]
    InvalidPort(String),
}

/// Physical sensor channel selected by the positional argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Proximity switch on a GPIO pin; one pulse per liter
    Digital {
        /// GPIO (BCM) pin number carrying the switch's sense wire
        gpio_pin: u8,
    },
    /// Hall sensor behind the ADS1115; one pulse per 10 liters
    Analog {
        /// I2C bus index (`1` means `/dev/i2c-1`)
        i2c_bus: u8,
    },
}

impl Channel {
    /// Liters counted per confirmed pulse on this channel
    pub fn liters_per_pulse(&self) -> u64 {
        match self {
            Channel::Digital { .. } => 1,
            Channel::Analog { .. } => 10,
        }
    }

    /// Field prefix in published payloads: `w_` water, `g_` gas
    pub fn field_prefix(&self) -> &'static str {
        match self {
            Channel::Digital { .. } => "w_",
            Channel::Analog { .. } => "g_",
        }
    }
}

/// Everything the daemon needs to start
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Selected sensor channel
    pub channel: Channel,
    /// MQTT broker host
    pub broker: String,
    /// MQTT broker port
    pub port: u16,
    /// Topic snapshots are published to
    pub topic: String,
    /// Device identity embedded in every payload
    pub device_id: String,
    /// Debug logging requested
    pub debug: bool,
}

impl DaemonConfig {
    /// Parse from process args and environment.
    ///
    /// Pin `1` is reserved for the analog/I2C channel (the pin is
    /// otherwise occupied on the deployed boards, which is what makes the
    /// value safe to reuse as a selector).
    pub fn from_env(mut args: impl Iterator<Item = String>) -> Result<Self, ConfigError> {
        let _argv0 = args.next();
        let channel_arg = args.next().ok_or(ConfigError::MissingChannel)?;
        let pin: u8 = channel_arg
            .parse()
            .map_err(|_| ConfigError::InvalidChannel(channel_arg.clone()))?;

        let channel = if pin == 1 {
            Channel::Analog { i2c_bus: 1 }
        } else {
            Channel::Digital { gpio_pin: pin }
        };

        let port_var = env::var("PULSEMETER_PORT").unwrap_or_else(|_| "1883".into());
        let port: u16 = port_var
            .parse()
            .map_err(|_| ConfigError::InvalidPort(port_var.clone()))?;

        Ok(Self {
            channel,
            broker: env::var("PULSEMETER_BROKER")
                .unwrap_or_else(|_| "test.mosquitto.org".into()),
            port,
            topic: env::var("PULSEMETER_TOPIC")
                .unwrap_or_else(|_| "myhome/infra/water/xwwwform".into()),
            device_id: env::var("PULSEMETER_DEVICE_ID")
                .unwrap_or_else(|_| "EUI48:11:22:33:44:55:66".into()),
            debug: env::var("PULSEMETER_DEBUG").map(|v| !v.is_empty()).unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> impl Iterator<Item = String> {
        std::iter::once("pulsemeter".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn pin_one_selects_the_analog_gas_channel() {
        let config = DaemonConfig::from_env(argv(&["1"])).unwrap();
        assert_eq!(config.channel, Channel::Analog { i2c_bus: 1 });
        assert_eq!(config.channel.liters_per_pulse(), 10);
        assert_eq!(config.channel.field_prefix(), "g_");
    }

    #[test]
    fn other_pins_are_digital_water_channels() {
        let config = DaemonConfig::from_env(argv(&["22"])).unwrap();
        assert_eq!(config.channel, Channel::Digital { gpio_pin: 22 });
        assert_eq!(config.channel.liters_per_pulse(), 1);
        assert_eq!(config.channel.field_prefix(), "w_");
    }

    #[test]
    fn missing_or_garbage_channel_is_a_usage_error() {
        assert!(matches!(
            DaemonConfig::from_env(argv(&[])),
            Err(ConfigError::MissingChannel)
        ));
        assert!(matches!(
            DaemonConfig::from_env(argv(&["GPIO6"])),
            Err(ConfigError::InvalidChannel(_))
        ));
    }
}
