//! Register-level access to the ITE IT6251 DisplayPort transmitter.
//!
//! The chip is controlled over I2C. Its AUX channel, and through it the sink's
//! DPCD space and EDID, is only reachable by poking a small set of bridge
//! registers in a fixed order; [`AuxChannel`] owns that protocol. [`video`]
//! decodes the timing the transmitter is currently sending.

mod aux;
mod bus;
pub mod sim;
mod types;
pub mod video;

pub use aux::{wait_for_completion, AuxChannel, AuxTiming, EDID_HEADER, EDID_LEN};
pub use bus::{LinuxI2cBus, RegisterBus};
pub use types::*;
pub use video::{ClockCounterSource, ClockSettings, VideoReport, VideoTiming};

/// Default bus and device addresses of the IT6251 on the boards it ships on.
pub const DEFAULT_I2C_DEVICE: &str = "/dev/i2c-2";
pub const DP_I2C_ADDR: u8 = 0x5c;
pub const LVDS_I2C_ADDR: u8 = 0x5e;

/// DP bridge register map, the parts this crate touches.
pub mod regs {
    pub const SYS_STATUS: u8 = 0x0d;
    pub const LINK_STATUS: u8 = 0x0e;

    pub const CLOCK_LATCH: u8 = 0x12;
    pub const CLOCK_LATCH_TRIGGER: u8 = 0x80;
    pub const CLOCK_COUNT_LOW: u8 = 0x13;
    pub const CLOCK_COUNT_HIGH: u8 = 0x14;

    pub const AUX_CTRL: u8 = 0x23;
    pub const AUX_CTRL_PC_ACCESS: u8 = 0x02;
    /// EDID segment select, bits [7:6] of `AUX_CTRL`. Only segment 0 is used.
    pub const EDID_SEGMENT: u8 = 0 << 6;
    pub const AUX_ADDR_LOW: u8 = 0x24;
    pub const AUX_ADDR_MID: u8 = 0x25;
    pub const AUX_ADDR_HIGH: u8 = 0x26;
    pub const AUX_WRITE_DATA: u8 = 0x27;
    pub const AUX_FIRE: u8 = 0x2b;
    pub const AUX_FIRE_READ: u8 = 0x00;
    pub const AUX_FIRE_WRITE: u8 = 0x05;
    pub const AUX_FIRE_EDID_READ: u8 = 0x0b;
    pub const AUX_FIRE_BUSY: u8 = 0x20;
    pub const AUX_DATA: u8 = 0x2c;
    pub const AUX_STATUS: u8 = 0x9f;

    pub const VIDEO_FLAGS: u8 = 0xa0;
}
