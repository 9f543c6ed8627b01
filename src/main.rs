use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use it6251::{video, AuxChannel, AuxOffset, LinuxI2cBus, RegisterBus, VideoReport};
use serde::Serialize;

mod config;
mod hexdump;
mod report;

use crate::config::Config;

/// Inspect an IT6251 DisplayPort transmitter over I2C.
///
/// With no OFFSET, prints the detected mode for the panel followed by its EDID.
/// With an OFFSET, reads from that DPCD address. With a VALUE as well, writes it to
/// that address and reads it back.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// DPCD address (0x prefix for hex, leading 0 for octal)
    #[arg(value_parser = parse_number)]
    offset: Option<u32>,

    /// Byte to write at OFFSET
    #[arg(value_parser = parse_byte)]
    value: Option<u8>,

    /// YAML config file replacing the built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// I2C bus device
    #[arg(long)]
    device: Option<PathBuf>,

    /// 7-bit I2C address of the DP bridge
    #[arg(long, value_parser = parse_address)]
    address: Option<u8>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

/// Parses an unsigned integer the way `strtoul(s, NULL, 0)` picks its base.
fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };
    if digits.starts_with(['+', '-']) {
        return Err(format!("invalid number `{s}`: unexpected sign"));
    }
    u32::from_str_radix(digits, radix).map_err(|e| format!("invalid number `{s}`: {e}"))
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let n = parse_number(s)?;
    u8::try_from(n).map_err(|_| format!("value 0x{n:x} does not fit in a byte"))
}

fn parse_address(s: &str) -> Result<u8, String> {
    let n = parse_byte(s)?;
    if n > 0x7f {
        return Err(format!("0x{n:02x} is not a 7-bit address"));
    }
    Ok(n)
}

#[derive(Serialize)]
struct DpcdRead {
    offset: AuxOffset,
    value: u8,
}

#[derive(Serialize)]
struct DpcdWrite {
    offset: AuxOffset,
    value: u8,
    verified: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    video: &'a VideoReport,
    modeline: Option<String>,
    modeline_error: Option<String>,
    edid: &'a [u8],
}

fn run<B: RegisterBus, W: Write>(
    args: &Args,
    config: &Config,
    aux: &AuxChannel<B>,
    out: &mut W,
) -> anyhow::Result<()> {
    match (args.offset, args.value) {
        (Some(offset), Some(value)) => {
            let offset = AuxOffset::new(offset);
            if !args.json {
                write!(out, "Setting {} -> 0x{:x}... ", offset, value)?;
                out.flush()?;
            }
            let verified = aux
                .dpcd_write(offset, value)
                .with_context(|| format!("Unable to write DPCD {offset}"))?;
            if args.json {
                let result = DpcdWrite {
                    offset,
                    value,
                    verified,
                };
                writeln!(out, "{}", serde_json::to_string(&result)?)?;
            } else {
                writeln!(out, "{}", if verified { "Ok" } else { "Fail" })?;
            }
        }
        (Some(offset), None) => {
            let offset = AuxOffset::new(offset);
            let value = aux
                .dpcd_read(offset)
                .with_context(|| format!("Unable to read DPCD {offset}"))?;
            if args.json {
                writeln!(out, "{}", serde_json::to_string(&DpcdRead { offset, value })?)?;
            } else {
                writeln!(out, "Value at {}: 0x{:x}", offset, value)?;
            }
        }
        (None, _) => {
            let edid = aux.fetch_edid().context("Unable to read EDID")?;
            let clock = config.clock_settings();
            let video = aux
                .with_bus(|bus, address| video::decode(bus, address, &clock))
                .context("Unable to read video status")?;
            if args.json {
                let decoded = video.timing.as_ref().map(|t| t.modeline());
                let (modeline, modeline_error) = match decoded {
                    Some(Ok(m)) => (Some(m.to_string()), None),
                    Some(Err(e)) => {
                        log::error!("Mode decode failed: {}", e);
                        (None, Some(e.to_string()))
                    }
                    None => (None, None),
                };
                let summary = Summary {
                    video: &video,
                    modeline,
                    modeline_error,
                    edid: &edid,
                };
                writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
            } else {
                report::write_video_report(out, &video)?;
                hexdump::write_hex(out, &edid)?;
            }
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_path(path)?,
        None => Config::new()?,
    };
    config.override_bus(args.device.clone(), args.address);
    log::debug!(
        "Using {} with DP bridge at 0x{:02x} (LVDS at 0x{:02x})",
        config.i2c.device.display(),
        config.i2c.dp_address,
        config.i2c.lvds_address
    );

    let bus = LinuxI2cBus::open(&config.i2c.device)
        .with_context(|| format!("Unable to open i2c {}", config.i2c.device.display()))?;
    let aux = AuxChannel::new(bus, config.i2c.dp_address, config.aux_timing());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(&args, &config, &aux, &mut out)
}

#[cfg(test)]
mod test {
    use super::*;
    use it6251::regs;
    use it6251::sim::SimulatedChip;
    use it6251::{DP_I2C_ADDR, EDID_HEADER};
    use std::time::Duration;

    fn test_config() -> Config {
        let mut config = Config::new().unwrap();
        config.aux.poll_interval_us = 0;
        config.pixel_clock.settle_us = 0;
        config
    }

    fn run_with(chip: &mut SimulatedChip, argv: &[&str]) -> anyhow::Result<String> {
        let args = Args::try_parse_from(argv)?;
        let config = test_config();
        assert_eq!(config.aux_timing().poll_interval, Duration::ZERO);
        let aux = AuxChannel::new(chip, config.i2c.dp_address, config.aux_timing());
        let mut out = Vec::new();
        run(&args, &config, &aux, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn numbers_accept_any_base() {
        assert_eq!(parse_number("0x100").unwrap(), 0x100);
        assert_eq!(parse_number("0X1f").unwrap(), 0x1f);
        assert_eq!(parse_number("010").unwrap(), 8);
        assert_eq!(parse_number("0").unwrap(), 0);
        assert_eq!(parse_number("256").unwrap(), 256);
        assert!(parse_number("0x").is_err());
        assert!(parse_number("09").is_err());
        assert!(parse_number("0x+5").is_err());
        assert!(parse_number("+5").is_err());
        assert!(parse_number("0-1").is_err());
        assert!(parse_byte("0x100").is_err());
        assert!(parse_address("0x80").is_err());
        assert_eq!(parse_address("0x5e").unwrap(), 0x5e);
    }

    #[test]
    fn help_is_not_an_error_exit() {
        for flag in ["--help", "-h"] {
            let err = Args::try_parse_from(["dptx", flag]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
            assert_eq!(err.exit_code(), 0);
        }
    }

    #[test]
    fn write_reports_ok_after_readback() {
        let mut chip = SimulatedChip::new(DP_I2C_ADDR);
        let text = run_with(&mut chip, &["dptx", "0x100", "0x55"]).unwrap();
        assert_eq!(text, "Setting 0x100 -> 0x55... Ok\n");
        assert_eq!(chip.dpcd(0x100), 0x55);
    }

    #[test]
    fn write_reports_fail_on_mismatch() {
        let mut chip = SimulatedChip::new(DP_I2C_ADDR);
        chip.make_read_only(0x100);
        let text = run_with(&mut chip, &["dptx", "0x100", "0x55"]).unwrap();
        assert_eq!(text, "Setting 0x100 -> 0x55... Fail\n");
    }

    #[test]
    fn write_as_json() {
        let mut chip = SimulatedChip::new(DP_I2C_ADDR);
        let text = run_with(&mut chip, &["dptx", "--json", "0x100", "0x55"]).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["offset"], 0x100);
        assert_eq!(json["value"], 0x55);
        assert_eq!(json["verified"], true);
    }

    #[test]
    fn read_prints_value() {
        let mut chip = SimulatedChip::new(DP_I2C_ADDR);
        chip.set_dpcd(0x0, 0x12);
        let text = run_with(&mut chip, &["dptx", "0"]).unwrap();
        assert_eq!(text, "Value at 0x0: 0x12\n");
    }

    #[test]
    fn transport_failure_is_an_error() {
        let mut chip = SimulatedChip::new(DP_I2C_ADDR);
        chip.fail_on(regs::AUX_CTRL);
        let err = run_with(&mut chip, &["dptx", "0x202"]).unwrap_err();
        assert!(err.to_string().contains("Unable to read DPCD 0x202"));
    }

    #[test]
    fn no_arguments_prints_status_and_edid() {
        let mut chip = SimulatedChip::new(DP_I2C_ADDR);
        chip.set_edid(&[0xaa; 256]);
        chip.set_register(regs::SYS_STATUS, 0x02);
        chip.set_register(regs::LINK_STATUS, 0x10);
        let text = run_with(&mut chip, &["dptx"]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2 + 16);
        assert_eq!(lines[0], "reg0E = 10, Link Rate = LBR");
        assert_eq!(lines[1], "reg0D = 02,  HPD Video Unstable");
        assert!(lines[2].starts_with("00000000 00 ff ff ff ff ff ff aa  aa"));
    }

    #[test]
    fn no_arguments_as_json() {
        let mut chip = SimulatedChip::new(DP_I2C_ADDR);
        chip.set_register(regs::SYS_STATUS, 0x02);
        let text = run_with(&mut chip, &["dptx", "--json"]).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        let edid = json["edid"].as_array().unwrap();
        assert_eq!(edid.len(), 256);
        let header: Vec<u64> = edid[..7].iter().map(|b| b.as_u64().unwrap()).collect();
        let expected: Vec<u64> = EDID_HEADER.iter().map(|b| *b as u64).collect();
        assert_eq!(header, expected);
        assert!(json["video"]["timing"].is_null());
        assert!(json["modeline"].is_null());
        assert!(json["modeline_error"].is_null());
    }

    #[test]
    fn glitched_timing_as_json_carries_decode_error() {
        let mut chip = SimulatedChip::new(DP_I2C_ADDR);
        chip.set_register(regs::SYS_STATUS, 0x06);
        chip.set_register(regs::LINK_STATUS, 0x10);
        chip.set_register(video::H_TOTAL.low, 100);
        chip.set_register(video::H_ACTIVE.low, 0x80);
        chip.set_register(video::H_ACTIVE.high, 0x07);
        chip.set_register(regs::CLOCK_LATCH, 0x40);
        let text = run_with(&mut chip, &["dptx", "--json"]).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["video"]["timing"]["htotal"], 100);
        assert_eq!(json["video"]["timing"]["hactive"], 1920);
        assert!(json["modeline"].is_null());
        let error = json["modeline_error"].as_str().unwrap();
        assert!(error.starts_with("horizontal timing does not add up"));
    }
}
