//! VME FPGA: board clock, board reset, and the voltage monitor behind it.

use std::time::Duration;

use fed9u_io::{Backend, Controller, Error, Register, Result, Target};
use tracing::info;

use crate::{
    array,
    i2c::{self, RetryPolicy},
    opcodes::vme,
};

#[repr(u32)]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString, strum::FromRepr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum ClockSource {
    Internal = 1,
    Ttc = 2,
    Backplane = 4,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SystemAceStatus: u32 {
        const CF_DETECTED = 1 << 0;
        const CF_ERROR = 1 << 1;
        const CONFIG_DONE = 1 << 2;
        const CONFIG_ERROR = 1 << 3;
        const READY = 1 << 4;
    }
}

pub const RESET_SETTLE: Duration = Duration::from_millis(10);

pub fn set_clock_source<B: Backend>(cont: &mut Controller<B>, source: ClockSource) -> Result<()> {
    cont.write(&vme::CLOCK_SOURCE, Target::Vme, &[source as u32])
}

pub fn clock_source<B: Backend>(cont: &mut Controller<B>) -> Result<ClockSource> {
    let [value] = array(cont.read(&vme::CLOCK_SOURCE, Target::Vme)?);
    ClockSource::from_repr(value).ok_or(Error::Unrecognized {
        name: vme::CLOCK_SOURCE.name,
        value,
    })
}

pub fn firmware_id<B: Backend>(cont: &mut Controller<B>) -> Result<u32> {
    let [id] = array(cont.read(&vme::FIRMWARE_ID, Target::Vme)?);
    Ok(id)
}

/// Pass a raw request to the voltage monitor chip and return its reply.
pub fn voltage_monitor<B: Backend>(cont: &mut Controller<B>, request: u16) -> Result<u16> {
    i2c::transaction(
        cont,
        &vme::VOLTAGE_MONITOR,
        Target::Vme,
        request,
        RetryPolicy::VOLTAGE_MONITOR,
    )
}

/// Reset every FPGA on the board. Settings written before the reset are lost.
pub fn soft_reset<B: Backend>(cont: &mut Controller<B>) -> Result<()> {
    info!("resetting board");
    cont.write_register(Register::BoardReset, 1, 0)?;
    cont.wait(RESET_SETTLE);
    Ok(())
}

pub fn system_ace_status<B: Backend>(cont: &mut Controller<B>) -> Result<SystemAceStatus> {
    let raw = cont.read_register(Register::SystemAceStatus)?;
    Ok(SystemAceStatus::from_bits_truncate(raw))
}

#[cfg(test)]
mod tests {
    use fed9u_io::{
        fake_backend::{FakeFed, Transaction},
        units::Bits,
    };

    use super::*;
    use crate::opcodes::I2C_BITS;

    #[test]
    fn test_clock_source() {
        let mut cont = Controller::new(FakeFed::new());
        set_clock_source(&mut cont, ClockSource::Ttc).unwrap();
        assert_eq!(clock_source(&mut cont).unwrap(), ClockSource::Ttc);
        assert!(matches!(
            clock_source(&mut Controller::new(FakeFed::new())),
            Err(Error::Unrecognized { value: 0, .. })
        ));
    }

    #[test]
    fn test_voltage_monitor() {
        let mut fed = FakeFed::new();
        let d = vme::VOLTAGE_MONITOR.designator;
        fed.respond_value(Target::Vme, d, Bits(I2C_BITS), 0xc0);
        fed.set_status(Target::Vme, d, 1, 0b01);
        let mut cont = Controller::new(fed);
        assert_eq!(voltage_monitor(&mut cont, 0xa000).unwrap(), 0xc0);
        let writes = cont
            .backend()
            .transactions()
            .iter()
            .filter(|t| matches!(t, Transaction::Write { .. }))
            .count();
        assert_eq!(writes, 2, "error status resends the request");
    }

    #[test]
    fn test_soft_reset() {
        let mut cont = Controller::new(FakeFed::new());
        soft_reset(&mut cont).unwrap();
        let fed = cont.backend();
        assert_eq!(fed.register(Register::BoardReset, 0), Some(1));
        assert_eq!(
            fed.transactions().last(),
            Some(&Transaction::Wait(RESET_SETTLE))
        );
    }

    #[test]
    fn test_system_ace_status() {
        let mut fed = FakeFed::new();
        fed.set_register(Register::SystemAceStatus, 0b1_0101);
        let mut cont = Controller::new(fed);
        assert_eq!(
            system_ace_status(&mut cont).unwrap(),
            SystemAceStatus::CF_DETECTED | SystemAceStatus::CONFIG_DONE | SystemAceStatus::READY
        );
    }
}
