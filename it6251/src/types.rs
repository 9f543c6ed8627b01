use serde::Serialize;
use std::{fmt, io};

/// Highest address reachable through the three AUX address registers.
pub const AUX_OFFSET_MAX: u32 = 0xf_ffff;

/// A 20-bit DPCD or EDID byte address.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxOffset(u32);

impl AuxOffset {
    /// Bits above 19 are dropped; the chip has nowhere to put them.
    pub fn new(offset: u32) -> Self {
        if offset > AUX_OFFSET_MAX {
            log::warn!(
                "AUX offset 0x{:x} exceeds 20 bits, using 0x{:05x}",
                offset,
                offset & AUX_OFFSET_MAX
            );
        }
        Self(offset & AUX_OFFSET_MAX)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Register bytes for 0x24, 0x25 and 0x26: address [7:0], [15:8] and [19:16].
    /// The upper nibble of the last byte is the write count, always left at zero.
    pub fn bytes(&self) -> [u8; 3] {
        [
            (self.0 & 0xff) as u8,
            ((self.0 >> 8) & 0xff) as u8,
            ((self.0 >> 16) & 0x0f) as u8,
        ]
    }
}

impl From<u32> for AuxOffset {
    fn from(offset: u32) -> Self {
        Self::new(offset)
    }
}

impl fmt::Display for AuxOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Why the AUX busy bit never cleared, from the low two bits of register 0x9f.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangStatus {
    /// The chip reports nothing wrong even though it stayed busy.
    NoError,
    DeferExceeded,
    NAck,
    Timeout,
}

impl HangStatus {
    pub fn from_status(status: u8) -> Self {
        match status & 0x03 {
            0 => HangStatus::NoError,
            1 => HangStatus::DeferExceeded,
            2 => HangStatus::NAck,
            _ => HangStatus::Timeout,
        }
    }
}

impl fmt::Display for HangStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HangStatus::NoError => "No Error",
            HangStatus::DeferExceeded => "Defer > 7 Times",
            HangStatus::NAck => "Receive NAck Response",
            HangStatus::Timeout => "TimeOut",
        };
        f.write_str(s)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxOutcome {
    Completed,
    Hung(HangStatus),
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Horizontal => f.write_str("horizontal"),
            Axis::Vertical => f.write_str("vertical"),
        }
    }
}

#[derive(Debug)]
pub enum Error {
    Transport {
        address: u8,
        register: u8,
        source: io::Error,
    },
    BusLocked,
    ModeDecode {
        axis: Axis,
        total: u16,
        active: u16,
        front_porch: u16,
        sync_len: u16,
    },
    Measurement,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport {
                address, register, ..
            } => write!(
                f,
                "i2c transfer to 0x{:02x} register 0x{:02x} failed",
                address, register
            ),
            Error::BusLocked => f.write_str("register bus lock poisoned"),
            Error::ModeDecode {
                axis,
                total,
                active,
                front_porch,
                sync_len,
            } => write!(
                f,
                "{} timing does not add up: total {} < active {} + front porch {} + sync {}",
                axis, total, active, front_porch, sync_len
            ),
            Error::Measurement => f.write_str("pixel clock counter read zero"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::BusLocked
    }
}
