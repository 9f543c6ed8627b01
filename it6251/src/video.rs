//! Decoding of the video timing the transmitter is currently sending.
//!
//! The chip measures the incoming video and exposes each timing value split over
//! two registers: a full low byte and a few bits of a high byte. Back porches are
//! not measured; they fall out of the other values.

use std::fmt;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::regs::*;
use crate::{Axis, Error, RegisterBus};

/// One measured timing value: `low | (high & mask) << 8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingField {
    pub name: &'static str,
    pub low: u8,
    pub high: u8,
    pub mask: u8,
}

impl TimingField {
    const fn new(name: &'static str, low: u8, high: u8, mask: u8) -> Self {
        Self {
            name,
            low,
            high,
            mask,
        }
    }

    pub fn bits(&self) -> u32 {
        16 - self.mask.leading_zeros()
    }

    pub fn read<B: RegisterBus + ?Sized>(&self, bus: &mut B, address: u8) -> Result<u16, Error> {
        let low = bus.read_register(address, self.low)?;
        let high = bus.read_register(address, self.high)?;
        let value = assemble(low, high, self.mask);
        log::trace!("{} = {}", self.name, value);
        Ok(value)
    }
}

pub fn assemble(low: u8, high: u8, mask: u8) -> u16 {
    low as u16 | ((high & mask) as u16) << 8
}

pub const H_TOTAL: TimingField = TimingField::new("htotal", 0xa1, 0xa2, 0x1f);
pub const H_DE_START: TimingField = TimingField::new("hde_start", 0xa3, 0xa4, 0x03);
pub const H_ACTIVE: TimingField = TimingField::new("hactive", 0xa5, 0xa6, 0x1f);
pub const H_FRONT_PORCH: TimingField = TimingField::new("hfront_porch", 0xa7, 0xa8, 0x03);
pub const H_SYNC_LEN: TimingField = TimingField::new("hsync_len", 0xa9, 0xaa, 0x03);
pub const V_TOTAL: TimingField = TimingField::new("vtotal", 0xab, 0xac, 0x0f);
pub const V_DE_START: TimingField = TimingField::new("vde_start", 0xad, 0xae, 0x01);
pub const V_ACTIVE: TimingField = TimingField::new("vactive", 0xaf, 0xb0, 0x0f);
pub const V_FRONT_PORCH: TimingField = TimingField::new("vfront_porch", 0xb1, 0xb2, 0x01);
pub const V_SYNC_LEN: TimingField = TimingField::new("vsync_len", 0xb3, 0xb4, 0x01);

/// Timing fields in the order they are read from the chip.
pub const TIMING_FIELDS: [TimingField; 10] = [
    H_TOTAL,
    H_DE_START,
    H_ACTIVE,
    H_FRONT_PORCH,
    H_SYNC_LEN,
    V_TOTAL,
    V_DE_START,
    V_ACTIVE,
    V_FRONT_PORCH,
    V_SYNC_LEN,
];

/// Reference clock of the pixel clock counter, in kHz.
pub const CLOCK_REFERENCE_KHZ: u32 = 13500;

/// Which byte becomes the low half of the pixel clock count.
///
/// `LatchRegister` takes the latch value just written back to 0x12 and ignores
/// 0x13. It matches the readings this tool has always produced; switch to
/// `CounterRegister` once that has been checked against a scope.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClockCounterSource {
    #[default]
    LatchRegister,
    CounterRegister,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSettings {
    pub settle: Duration,
    pub counter_source: ClockCounterSource,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(1),
            counter_source: ClockCounterSource::default(),
        }
    }
}

/// Register 0x0d.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemStatus(pub u8);

impl SystemStatus {
    pub fn interrupt(&self) -> bool {
        self.0 & 0x01 != 0
    }
    pub fn hpd(&self) -> bool {
        self.0 & 0x02 != 0
    }
    pub fn video_stable(&self) -> bool {
        self.0 & 0x04 != 0
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRate {
    /// High bit rate, 2.7 Gbps per lane.
    Hbr,
    /// Low bit rate, 1.62 Gbps per lane.
    Lbr,
}

impl fmt::Display for LinkRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkRate::Hbr => f.write_str("HBR"),
            LinkRate::Lbr => f.write_str("LBR"),
        }
    }
}

/// Register 0x0e.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus(pub u8);

impl LinkStatus {
    pub fn trained(&self) -> bool {
        self.0 & 0x1f == 0x10
    }
    pub fn rate(&self) -> LinkRate {
        if self.0 & 0x80 != 0 {
            LinkRate::Hbr
        } else {
            LinkRate::Lbr
        }
    }
}

/// One direction of a mode, with the back porch worked out.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisTiming {
    pub active: u16,
    pub front_porch: u16,
    pub sync_len: u16,
    pub back_porch: u16,
    pub total: u16,
}

impl AxisTiming {
    /// Fails when the measured parts add up to more than the total, which happens
    /// when the registers are read while the mode is changing.
    pub fn new(
        axis: Axis,
        total: u16,
        active: u16,
        front_porch: u16,
        sync_len: u16,
    ) -> Result<Self, Error> {
        let back_porch = total
            .checked_sub(active)
            .and_then(|v| v.checked_sub(front_porch))
            .and_then(|v| v.checked_sub(sync_len))
            .ok_or(Error::ModeDecode {
                axis,
                total,
                active,
                front_porch,
                sync_len,
            })?;
        Ok(Self {
            active,
            front_porch,
            sync_len,
            back_porch,
            total,
        })
    }

    pub fn sync_start(&self) -> u16 {
        self.active + self.front_porch
    }

    pub fn sync_end(&self) -> u16 {
        self.sync_start() + self.sync_len
    }
}

/// Raw snapshot of the timing registers. Never cached; read again per query.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct VideoTiming {
    pub htotal: u16,
    pub hde_start: u16,
    pub hactive: u16,
    pub hfront_porch: u16,
    pub hsync_len: u16,
    pub vtotal: u16,
    pub vde_start: u16,
    pub vactive: u16,
    pub vfront_porch: u16,
    pub vsync_len: u16,
    pub hsync_negative: bool,
    pub vsync_negative: bool,
    pub interlaced: bool,
    pub clock_count: u16,
    pub pixel_clock_khz: Option<u32>,
}

impl VideoTiming {
    pub fn horizontal(&self) -> Result<AxisTiming, Error> {
        AxisTiming::new(
            Axis::Horizontal,
            self.htotal,
            self.hactive,
            self.hfront_porch,
            self.hsync_len,
        )
    }

    pub fn vertical(&self) -> Result<AxisTiming, Error> {
        AxisTiming::new(
            Axis::Vertical,
            self.vtotal,
            self.vactive,
            self.vfront_porch,
            self.vsync_len,
        )
    }

    pub fn modeline(&self) -> Result<Modeline, Error> {
        Ok(Modeline {
            pixel_clock_khz: self.pixel_clock_khz,
            h: self.horizontal()?,
            v: self.vertical()?,
            hsync_negative: self.hsync_negative,
            vsync_negative: self.vsync_negative,
            interlaced: self.interlaced,
        })
    }
}

/// An X11 style modeline.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Modeline {
    pub pixel_clock_khz: Option<u32>,
    pub h: AxisTiming,
    pub v: AxisTiming,
    pub hsync_negative: bool,
    pub vsync_negative: bool,
    pub interlaced: bool,
}

impl fmt::Display for Modeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Modeline \"{}x{}\"", self.h.active, self.v.active)?;
        match self.pixel_clock_khz {
            Some(khz) => write!(f, " {:.3}", khz as f64 / 1000.0)?,
            None => f.write_str(" unavailable")?,
        }
        for axis in [&self.h, &self.v] {
            write!(
                f,
                "  {} {} {} {}",
                axis.active,
                axis.sync_start(),
                axis.sync_end(),
                axis.total
            )?;
        }
        let sign = |negative: bool| if negative { '-' } else { '+' };
        write!(
            f,
            " {}HSync {}VSync",
            sign(self.hsync_negative),
            sign(self.vsync_negative)
        )?;
        if self.interlaced {
            f.write_str(" Interlace")?;
        }
        Ok(())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct VideoReport {
    pub system: SystemStatus,
    pub link: LinkStatus,
    /// `None` when the chip does not see stable video.
    pub timing: Option<VideoTiming>,
}

pub fn pixel_clock_khz(count: u16) -> Result<u32, Error> {
    if count == 0 {
        return Err(Error::Measurement);
    }
    Ok(CLOCK_REFERENCE_KHZ * 2048 / count as u32)
}

/// Triggers a pixel clock measurement and returns the raw 12-bit count.
pub fn measure_clock_count<B: RegisterBus + ?Sized>(
    bus: &mut B,
    address: u8,
    settings: &ClockSettings,
) -> Result<u16, Error> {
    let mut latch = bus.read_register(address, CLOCK_LATCH)?;
    latch |= CLOCK_LATCH_TRIGGER;
    bus.write_register(address, CLOCK_LATCH, latch)?;
    latch &= !CLOCK_LATCH_TRIGGER;
    thread::sleep(settings.settle);
    bus.write_register(address, CLOCK_LATCH, latch)?;

    let counter_low = bus.read_register(address, CLOCK_COUNT_LOW)?;
    let high = bus.read_register(address, CLOCK_COUNT_HIGH)?;
    let low = match settings.counter_source {
        ClockCounterSource::LatchRegister => latch,
        ClockCounterSource::CounterRegister => counter_low,
    };
    Ok(assemble(low, high, 0x0f))
}

/// Reads link and system status and, if video is stable, the full timing.
pub fn decode<B: RegisterBus + ?Sized>(
    bus: &mut B,
    address: u8,
    clock: &ClockSettings,
) -> Result<VideoReport, Error> {
    let system = SystemStatus(bus.read_register(address, SYS_STATUS)?);
    let link = LinkStatus(bus.read_register(address, LINK_STATUS)?);
    if !link.trained() {
        log::warn!("Link training incomplete, reg0E = {:02x}", link.0);
    }
    if !system.video_stable() {
        log::debug!("No stable video, skipping timing registers");
        return Ok(VideoReport {
            system,
            link,
            timing: None,
        });
    }

    let flags = bus.read_register(address, VIDEO_FLAGS)?;
    let mut values = [0u16; TIMING_FIELDS.len()];
    for (value, field) in values.iter_mut().zip(TIMING_FIELDS.iter()) {
        *value = field.read(bus, address)?;
    }
    let [
        htotal,
        hde_start,
        hactive,
        hfront_porch,
        hsync_len,
        vtotal,
        vde_start,
        vactive,
        vfront_porch,
        vsync_len,
    ] = values;

    let clock_count = measure_clock_count(bus, address, clock)?;
    let pixel_clock_khz = match pixel_clock_khz(clock_count) {
        Ok(khz) => Some(khz),
        Err(e) => {
            log::warn!("Pixel clock unavailable: {}", e);
            None
        }
    };

    Ok(VideoReport {
        system,
        link,
        timing: Some(VideoTiming {
            htotal,
            hde_start,
            hactive,
            hfront_porch,
            hsync_len,
            vtotal,
            vde_start,
            vactive,
            vfront_porch,
            vsync_len,
            hsync_negative: flags & 0x01 != 0,
            vsync_negative: flags & 0x04 != 0,
            interlaced: flags & 0x10 != 0,
            clock_count,
            pixel_clock_khz,
        }),
    })
}
