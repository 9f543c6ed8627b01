use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::regs::*;
use crate::{AuxOffset, AuxOutcome, Error, HangStatus, RegisterBus};

pub const EDID_LEN: usize = 256;
/// Fixed EDID header. The chip is never asked for these bytes.
pub const EDID_HEADER: [u8; 7] = [0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];

/// Bounds for the AUX completion poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxTiming {
    pub poll_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for AuxTiming {
    fn default() -> Self {
        Self {
            poll_attempts: 200,
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Polls the busy bit of the fire register until it clears.
///
/// If it is still set after `poll_attempts` reads the hang is classified from the
/// AUX status register and logged. A hang is not an error: the caller carries on
/// and reads whatever the data register holds.
pub fn wait_for_completion<B: RegisterBus + ?Sized>(
    bus: &mut B,
    address: u8,
    timing: &AuxTiming,
) -> Result<AuxOutcome, Error> {
    for _ in 0..timing.poll_attempts {
        if bus.read_register(address, AUX_FIRE)? & AUX_FIRE_BUSY == 0 {
            return Ok(AuxOutcome::Completed);
        }
        thread::sleep(timing.poll_interval);
    }
    let status = HangStatus::from_status(bus.read_register(address, AUX_STATUS)?);
    log::error!("AUX channel hang => {}", status);
    Ok(AuxOutcome::Hung(status))
}

/// The bridge's AUX channel, driven from the host through bridge registers.
///
/// The chip can only run one AUX transaction at a time, so the bus sits behind a
/// mutex that each transaction holds from enabling host access until it has
/// disabled it again and collected its result.
pub struct AuxChannel<B> {
    bus: Mutex<B>,
    address: u8,
    timing: AuxTiming,
}

impl<B: RegisterBus> AuxChannel<B> {
    pub fn new(bus: B, address: u8, timing: AuxTiming) -> Self {
        Self {
            bus: Mutex::new(bus),
            address,
            timing,
        }
    }

    pub fn into_inner(self) -> Result<B, Error> {
        Ok(self.bus.into_inner()?)
    }

    /// Runs `f` with the bus locked, for register work outside the AUX protocol.
    pub fn with_bus<T>(&self, f: impl FnOnce(&mut B, u8) -> Result<T, Error>) -> Result<T, Error> {
        let mut bus = self.bus.lock()?;
        f(&mut *bus, self.address)
    }

    fn start(&self, bus: &mut B, offset: AuxOffset) -> Result<(), Error> {
        bus.write_register(self.address, AUX_CTRL, EDID_SEGMENT | AUX_CTRL_PC_ACCESS)?;
        let [low, mid, high] = offset.bytes();
        bus.write_register(self.address, AUX_ADDR_LOW, low)?;
        bus.write_register(self.address, AUX_ADDR_MID, mid)?;
        bus.write_register(self.address, AUX_ADDR_HIGH, high)
    }

    fn fire(&self, bus: &mut B, command: u8) -> Result<AuxOutcome, Error> {
        bus.write_register(self.address, AUX_FIRE, command)?;
        wait_for_completion(bus, self.address, &self.timing)
    }

    fn finish(&self, bus: &mut B) -> Result<u8, Error> {
        bus.write_register(self.address, AUX_CTRL, EDID_SEGMENT)?;
        bus.read_register(self.address, AUX_DATA)
    }

    pub fn read_edid_byte(&self, offset: AuxOffset) -> Result<u8, Error> {
        let mut bus = self.bus.lock()?;
        self.start(&mut bus, offset)?;
        self.fire(&mut bus, AUX_FIRE_EDID_READ)?;
        self.finish(&mut bus)
    }

    /// Reads a full 256 byte EDID.
    ///
    /// The header is filled in locally; byte `7 + n` comes from EDID offset `n`.
    /// The first transport error aborts the fetch.
    pub fn fetch_edid(&self) -> Result<[u8; EDID_LEN], Error> {
        let mut edid = [0u8; EDID_LEN];
        edid[..EDID_HEADER.len()].copy_from_slice(&EDID_HEADER);
        for (n, byte) in edid[EDID_HEADER.len()..].iter_mut().enumerate() {
            *byte = self.read_edid_byte(AuxOffset::new(n as u32))?;
        }
        log::debug!("Fetched {} EDID bytes", EDID_LEN);
        Ok(edid)
    }

    pub fn dpcd_read(&self, offset: AuxOffset) -> Result<u8, Error> {
        let mut bus = self.bus.lock()?;
        self.start(&mut bus, offset)?;
        self.fire(&mut bus, AUX_FIRE_READ)?;
        let value = self.finish(&mut bus)?;
        log::debug!("DPCD {} read 0x{:02x}", offset, value);
        Ok(value)
    }

    /// Writes `value` then reads the same offset back.
    ///
    /// Returns whether the read back byte matches what was written.
    pub fn dpcd_write(&self, offset: AuxOffset, value: u8) -> Result<bool, Error> {
        let mut bus = self.bus.lock()?;
        self.start(&mut bus, offset)?;
        bus.write_register(self.address, AUX_WRITE_DATA, value)?;
        self.fire(&mut bus, AUX_FIRE_WRITE)?;
        self.fire(&mut bus, AUX_FIRE_READ)?;
        let readback = self.finish(&mut bus)?;
        log::debug!(
            "DPCD {} wrote 0x{:02x}, read back 0x{:02x}",
            offset,
            value,
            readback
        );
        Ok(readback == value)
    }
}
