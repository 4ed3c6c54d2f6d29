use std::time::Duration;

use eyre::Result;

use crate::{SerialCommand, units::Bits};

/// A bus adapter able to reach the FED over VME.
///
/// Serial reads append to `buf`. With `right_align` the adapter returns
/// `ceil(len / 32)` words holding the value right-justified across the
/// sequence. Without it the adapter returns the raw capture: `len + 1` bits,
/// left-aligned, the first of them being the extra clock the hardware needs
/// ahead of the data (see [`crate::bits::reassemble`]).
pub trait Backend {
    fn write_serial(&mut self, command: &SerialCommand) -> Result<()>;

    fn read_serial(
        &mut self,
        buf: &mut Vec<u32>,
        first_word: u32,
        len: Bits<u32>,
        right_align: bool,
    ) -> Result<()>;

    fn write_register(&mut self, reg: Register, value: u32, offset: u32) -> Result<()>;

    fn read_register(&mut self, reg: Register) -> Result<u32>;

    /// Block for a fixed settling time.
    fn wait(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Memory-mapped registers of the VME FPGA, reached without going through
/// the serial command interface.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::VariantArray)]
#[strum(serialize_all = "kebab-case")]
pub enum Register {
    BoardReset = 0x08,
    BeStatus = 0x0c,
    SystemAceStatus = 0x24,
}

impl Register {
    /// Offset from the board's VME base address.
    pub const fn address(self) -> u32 {
        self as u32
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn write_serial(&mut self, command: &SerialCommand) -> Result<()> {
        B::write_serial(&mut **self, command)
    }

    fn read_serial(
        &mut self,
        buf: &mut Vec<u32>,
        first_word: u32,
        len: Bits<u32>,
        right_align: bool,
    ) -> Result<()> {
        B::read_serial(&mut **self, buf, first_word, len, right_align)
    }

    fn write_register(&mut self, reg: Register, value: u32, offset: u32) -> Result<()> {
        B::write_register(&mut **self, reg, value, offset)
    }

    fn read_register(&mut self, reg: Register) -> Result<u32> {
        B::read_register(&mut **self, reg)
    }

    fn wait(&mut self, duration: Duration) {
        B::wait(&mut **self, duration)
    }
}
