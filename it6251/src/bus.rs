use std::fs::File;
use std::path::Path;

use i2c_linux::{I2c, Message, ReadFlags, WriteFlags};

use crate::Error;

/// Byte-wide register access to devices on one I2C bus.
///
/// Every call is a single bus transaction; nothing is batched.
pub trait RegisterBus {
    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), Error>;
    fn read_register(&mut self, address: u8, register: u8) -> Result<u8, Error>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), Error> {
        (**self).write_register(address, register, value)
    }

    fn read_register(&mut self, address: u8, register: u8) -> Result<u8, Error> {
        (**self).read_register(address, register)
    }
}

/// A Linux `/dev/i2c-N` character device, held open for the life of the value.
pub struct LinuxI2cBus {
    i2c: I2c<File>,
}

impl LinuxI2cBus {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        log::debug!("Opening i2c bus {}", path.as_ref().display());
        let i2c = I2c::from_path(path)?;
        Ok(Self { i2c })
    }
}

impl RegisterBus for LinuxI2cBus {
    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), Error> {
        log::trace!("i2c 0x{:02x}: write 0x{:02x} <- 0x{:02x}", address, register, value);
        let data = [register, value];
        self.i2c
            .i2c_transfer(&mut [Message::Write {
                address: address.into(),
                data: &data,
                flags: WriteFlags::empty(),
            }])
            .map_err(|source| Error::Transport {
                address,
                register,
                source,
            })
    }

    fn read_register(&mut self, address: u8, register: u8) -> Result<u8, Error> {
        let reg = [register];
        let mut value = [0u8; 1];
        self.i2c
            .i2c_transfer(&mut [
                Message::Write {
                    address: address.into(),
                    data: &reg,
                    flags: WriteFlags::empty(),
                },
                Message::Read {
                    address: address.into(),
                    data: &mut value,
                    flags: ReadFlags::empty(),
                },
            ])
            .map_err(|source| Error::Transport {
                address,
                register,
                source,
            })?;
        log::trace!("i2c 0x{:02x}: read 0x{:02x} -> 0x{:02x}", address, register, value[0]);
        Ok(value[0])
    }
}
