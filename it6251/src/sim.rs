//! Register-level stand-in for an IT6251 sitting on an I2C bus.
//!
//! Models just enough of the AUX block to run EDID and DPCD transactions: the
//! address/data registers, the fire register with its busy bit, and backing stores
//! for the sink's DPCD space and EDID. Every access is recorded so tests can check
//! the exact register sequence a transaction produced.

use std::collections::{HashMap, HashSet};
use std::io;

use crate::{regs, Error, RegisterBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Write { register: u8, value: u8 },
    Read { register: u8 },
}

pub struct SimulatedChip {
    address: u8,
    regs: [u8; 256],
    dpcd: HashMap<u32, u8>,
    read_only: HashSet<u32>,
    edid: [u8; 256],
    stuck_busy: bool,
    fail_register: Option<u8>,
    log: Vec<Access>,
}

impl SimulatedChip {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            regs: [0; 256],
            dpcd: HashMap::new(),
            read_only: HashSet::new(),
            edid: [0; 256],
            stuck_busy: false,
            fail_register: None,
            log: Vec::new(),
        }
    }

    pub fn set_register(&mut self, register: u8, value: u8) {
        self.regs[register as usize] = value;
    }

    pub fn register(&self, register: u8) -> u8 {
        self.regs[register as usize]
    }

    pub fn set_edid(&mut self, edid: &[u8]) {
        let len = edid.len().min(self.edid.len());
        self.edid[..len].copy_from_slice(&edid[..len]);
    }

    pub fn dpcd(&self, offset: u32) -> u8 {
        self.dpcd.get(&offset).copied().unwrap_or(0)
    }

    pub fn set_dpcd(&mut self, offset: u32, value: u8) {
        self.dpcd.insert(offset, value);
    }

    /// AUX writes to `offset` are acknowledged but dropped.
    pub fn make_read_only(&mut self, offset: u32) {
        self.read_only.insert(offset);
    }

    /// Keep the AUX busy bit set forever.
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    /// Any access to `register` fails as if the device stopped acknowledging.
    pub fn fail_on(&mut self, register: u8) {
        self.fail_register = Some(register);
    }

    pub fn accesses(&self) -> &[Access] {
        &self.log
    }

    pub fn reads_of(&self, register: u8) -> usize {
        self.log
            .iter()
            .filter(|a| matches!(a, Access::Read { register: r } if *r == register))
            .count()
    }

    fn aux_address(&self) -> u32 {
        self.regs[regs::AUX_ADDR_LOW as usize] as u32
            | (self.regs[regs::AUX_ADDR_MID as usize] as u32) << 8
            | ((self.regs[regs::AUX_ADDR_HIGH as usize] & 0x0f) as u32) << 16
    }

    fn fire(&mut self, command: u8) {
        if self.regs[regs::AUX_CTRL as usize] & regs::AUX_CTRL_PC_ACCESS == 0 {
            return;
        }
        let addr = self.aux_address();
        match command {
            regs::AUX_FIRE_EDID_READ => {
                self.regs[regs::AUX_DATA as usize] = self.edid[(addr & 0xff) as usize];
            }
            regs::AUX_FIRE_WRITE => {
                if !self.read_only.contains(&addr) {
                    let value = self.regs[regs::AUX_WRITE_DATA as usize];
                    self.dpcd.insert(addr, value);
                }
            }
            regs::AUX_FIRE_READ => {
                self.regs[regs::AUX_DATA as usize] = self.dpcd(addr);
            }
            _ => {}
        }
    }

    fn check(&self, address: u8, register: u8) -> Result<(), Error> {
        if address != self.address || self.fail_register == Some(register) {
            return Err(Error::Transport {
                address,
                register,
                source: io::Error::new(io::ErrorKind::Other, "no acknowledge"),
            });
        }
        Ok(())
    }
}

impl RegisterBus for SimulatedChip {
    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), Error> {
        self.check(address, register)?;
        self.log.push(Access::Write { register, value });
        self.regs[register as usize] = value;
        if register == regs::AUX_FIRE {
            self.fire(value);
        }
        Ok(())
    }

    fn read_register(&mut self, address: u8, register: u8) -> Result<u8, Error> {
        self.check(address, register)?;
        self.log.push(Access::Read { register });
        let mut value = self.regs[register as usize];
        if register == regs::AUX_FIRE {
            value &= !regs::AUX_FIRE_BUSY;
            if self.stuck_busy {
                value |= regs::AUX_FIRE_BUSY;
            }
        }
        Ok(value)
    }
}
