use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use it6251::{AuxTiming, ClockCounterSource, ClockSettings};
use serde::Deserialize;
use serde::Serialize;

static CONFIG_STR: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/resources/default_config.yaml"
));

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct I2cConfig {
    pub device: PathBuf,
    /// 7-bit address of the DP bridge
    pub dp_address: u8,
    pub lvds_address: u8,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct AuxConfig {
    pub poll_attempts: u32,
    pub poll_interval_us: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct PixelClockConfig {
    pub settle_us: u64,
    pub counter_low_byte: ClockCounterSource,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub i2c: I2cConfig,
    pub aux: AuxConfig,
    pub pixel_clock: PixelClockConfig,
}

impl Config {
    /// The configuration built into the binary.
    pub fn new() -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(CONFIG_STR).context("default config")?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        log::debug!("Loading config from {}", path.display());
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read config {}", path.display()))?;
        serde_yaml::from_str(&s).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn override_bus(&mut self, device: Option<PathBuf>, dp_address: Option<u8>) {
        if let Some(device) = device {
            self.i2c.device = device;
        }
        if let Some(address) = dp_address {
            self.i2c.dp_address = address;
        }
    }

    pub fn aux_timing(&self) -> AuxTiming {
        AuxTiming {
            poll_attempts: self.aux.poll_attempts,
            poll_interval: Duration::from_micros(self.aux.poll_interval_us),
        }
    }

    pub fn clock_settings(&self) -> ClockSettings {
        ClockSettings {
            settle: Duration::from_micros(self.pixel_clock.settle_us),
            counter_source: self.pixel_clock.counter_low_byte,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn config_can_construct() {
        let config = Config::new().unwrap();
        assert_eq!(config.i2c.device, PathBuf::from(it6251::DEFAULT_I2C_DEVICE));
        assert_eq!(config.i2c.dp_address, it6251::DP_I2C_ADDR);
        assert_eq!(config.i2c.lvds_address, it6251::LVDS_I2C_ADDR);
        assert_eq!(config.aux_timing(), AuxTiming::default());
        assert_eq!(config.clock_settings(), ClockSettings::default());
    }

    #[test]
    fn overrides_replace_bus_settings() {
        let mut config = Config::new().unwrap();
        config.override_bus(Some(PathBuf::from("/dev/i2c-7")), None);
        assert_eq!(config.i2c.device, PathBuf::from("/dev/i2c-7"));
        assert_eq!(config.i2c.dp_address, 0x5c);
        config.override_bus(None, Some(0x5e));
        assert_eq!(config.i2c.dp_address, 0x5e);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let yaml = CONFIG_STR.replace("poll_attempts", "poll_tries");
        assert!(serde_yaml::from_str::<Config>(&yaml).is_err());
    }

    #[test]
    fn counter_source_is_configurable() {
        let yaml = CONFIG_STR.replace(
            "counter_low_byte: latch_register",
            "counter_low_byte: counter_register",
        );
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            config.clock_settings().counter_source,
            ClockCounterSource::CounterRegister
        );
    }
}
